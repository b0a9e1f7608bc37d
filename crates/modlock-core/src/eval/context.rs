use super::download::{Downloader, OfflineDownloader};
use super::environment::{Environment, ModuleExtension};
use super::error::ExtensionError;
use super::implementation::{Interrupt, ScriptError};
use super::step::Step;
use super::workdir::WorkingDirectory;
use crate::diagnostics::{Diagnostic, DiagnosticHandler};
use crate::model::{
    validate_repo_name, AbridgedModule, Label, ModuleExtensionId, ModuleExtensionUsage, ModuleKey,
    RepoMapping, RepoSpec, Tag, Version,
};
use crate::spelling::did_you_mean;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Host capabilities exposed to extension implementations
#[derive(Clone)]
pub struct Capabilities {
    /// Snapshot of the client environment taken when the build started
    pub client_env: Arc<BTreeMap<String, String>>,
    pub downloader: Arc<dyn Downloader>,
    pub timeout_scaling: f64,
}

impl Capabilities {
    /// No environment variables and no network access
    pub fn offline() -> Self {
        Self {
            client_env: Arc::new(BTreeMap::new()),
            downloader: Arc::new(OfflineDownloader),
            timeout_scaling: 1.0,
        }
    }
}

/// One using module as seen by an extension implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionModule {
    name: String,
    version: Version,
    key: ModuleKey,
    tags: BTreeMap<String, Vec<Tag>>,
    repo_mapping: RepoMapping,
}

impl ExtensionModule {
    /// Group the usage's tags by tag class, rejecting tags the extension does not declare
    pub(crate) fn create(
        module: &AbridgedModule,
        extension_id: &ModuleExtensionId,
        extension: &ModuleExtension,
        usage: &ModuleExtensionUsage,
        repo_mapping: RepoMapping,
    ) -> Result<Self, ExtensionError> {
        let mut tags: BTreeMap<String, Vec<Tag>> = extension
            .tag_classes()
            .iter()
            .map(|class| (class.clone(), Vec::new()))
            .collect();

        for tag in &usage.tags {
            match tags.get_mut(&tag.tag_name) {
                Some(list) => list.push(tag.clone()),
                None => {
                    return Err(ExtensionError::UnknownTagClass {
                        label: extension_id.bzl_file_label().clone(),
                        name: extension_id.extension_name().to_string(),
                        tag_name: tag.tag_name.clone(),
                        location: tag.location.clone(),
                        suggestion: did_you_mean(
                            &tag.tag_name,
                            extension.tag_classes().iter().map(String::as_str),
                        ),
                    })
                }
            }
        }

        Ok(Self {
            name: module.name.clone(),
            version: module.version.clone(),
            key: module.key.clone(),
            tags,
            repo_mapping,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn key(&self) -> &ModuleKey {
        &self.key
    }

    pub fn is_root(&self) -> bool {
        self.key.is_root()
    }

    /// Tags of one class in declaration order; empty for a declared class with no tags
    pub fn tags(&self, tag_class: &str) -> &[Tag] {
        self.tags.get(tag_class).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tag_classes(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    /// Canonical name of a repository visible to this module under `apparent_name`
    pub fn resolve_repo(&self, apparent_name: &str) -> Option<&str> {
        self.repo_mapping.get(apparent_name).map(String::as_str)
    }
}

/// The single object an extension implementation interacts with
pub struct ModuleExtensionContext<'a> {
    extension_id: &'a ModuleExtensionId,
    modules: Vec<ExtensionModule>,
    working_directory: WorkingDirectory,
    capabilities: &'a Capabilities,
    environment: &'a dyn Environment,
    diagnostics: &'a dyn DiagnosticHandler,
    generated: BTreeMap<String, RepoSpec>,
}

impl<'a> ModuleExtensionContext<'a> {
    pub(crate) fn new(
        extension_id: &'a ModuleExtensionId,
        modules: Vec<ExtensionModule>,
        working_directory: WorkingDirectory,
        capabilities: &'a Capabilities,
        environment: &'a dyn Environment,
        diagnostics: &'a dyn DiagnosticHandler,
    ) -> Self {
        Self {
            extension_id,
            modules,
            working_directory,
            capabilities,
            environment,
            diagnostics,
            generated: BTreeMap::new(),
        }
    }

    pub fn extension_id(&self) -> &ModuleExtensionId {
        self.extension_id
    }

    /// Every module using the extension, root module first
    pub fn modules(&self) -> &[ExtensionModule] {
        &self.modules
    }

    pub fn root_module(&self) -> Option<&ExtensionModule> {
        self.modules.iter().find(|module| module.is_root())
    }

    pub fn getenv(&self, name: &str) -> Option<&str> {
        self.capabilities.client_env.get(name).map(String::as_str)
    }

    /// Apply the configured timeout scaling to a timeout requested by the extension
    pub fn timeout(&self, requested: Duration) -> Duration {
        requested.mul_f64(self.capabilities.timeout_scaling)
    }

    pub fn working_directory(&self) -> &Path {
        self.working_directory.path()
    }

    /// Absolute path of `relative` inside the working directory
    pub fn path(&self, relative: impl AsRef<Path>) -> Result<PathBuf, ScriptError> {
        let relative = relative.as_ref();
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(ScriptError::new(format!(
                "path '{}' must be relative and stay inside the working directory",
                relative.display()
            )));
        }
        Ok(self.working_directory.path().join(relative))
    }

    pub fn write_file(&self, relative: impl AsRef<Path>, content: impl AsRef<[u8]>) -> Result<PathBuf, ScriptError> {
        let path = self.prepare_output(relative.as_ref())?;
        std::fs::write(&path, content).map_err(|e| io_script_error("write", &path, e))?;
        Ok(path)
    }

    pub fn read_file(&self, relative: impl AsRef<Path>) -> Result<Vec<u8>, ScriptError> {
        let path = self.path(relative)?;
        std::fs::read(&path).map_err(|e| io_script_error("read", &path, e))
    }

    /// Download the first reachable URL into the working directory
    pub fn download(&self, urls: &[String], output: impl AsRef<Path>) -> Result<PathBuf, ScriptError> {
        let path = self.prepare_output(output.as_ref())?;
        self.capabilities
            .downloader
            .download(urls, &path)
            .map_err(|e| ScriptError::new(e.to_string()))?;
        Ok(path)
    }

    /// Contents of a file tracked by the build engine
    ///
    /// Interrupts the implementation with a restart when the engine has not
    /// produced the file yet.
    pub fn read_input(&self, label: &Label) -> Result<Arc<[u8]>, Interrupt> {
        match self.environment.input(label)? {
            Step::Ready(content) => Ok(content),
            Step::NotReady => Err(Interrupt::Restart),
        }
    }

    pub fn print(&self, message: impl AsRef<str>) {
        self.diagnostics.report(Diagnostic::info(format!(
            "{}: {}",
            self.extension_id.extension_name(),
            message.as_ref()
        )));
    }

    /// Declare a repository generated by this extension
    pub fn create_repo(&mut self, name: &str, spec: RepoSpec) -> Result<(), ScriptError> {
        validate_repo_name(name).map_err(ScriptError::new)?;
        if self.generated.contains_key(name) {
            return Err(ScriptError::new(format!(
                "A repo named {} is already generated by this module extension",
                name
            )));
        }
        self.generated.insert(name.to_string(), spec);
        Ok(())
    }

    pub fn generated_repo_names(&self) -> impl Iterator<Item = &str> {
        self.generated.keys().map(String::as_str)
    }

    pub(crate) fn into_parts(self) -> (BTreeMap<String, RepoSpec>, WorkingDirectory) {
        (self.generated, self.working_directory)
    }

    fn prepare_output(&self, relative: &Path) -> Result<PathBuf, ScriptError> {
        let path = self.path(relative)?;
        let parent = path.parent().unwrap_or(self.working_directory.path());
        std::fs::create_dir_all(parent).map_err(|e| io_script_error("create", parent, e))?;
        Ok(path)
    }
}

fn io_script_error(action: &str, path: &Path, error: std::io::Error) -> ScriptError {
    ScriptError::new(format!("failed to {} {}: {}", action, path.display(), error))
}
