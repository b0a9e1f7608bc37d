use super::context::{Capabilities, ExtensionModule, ModuleExtensionContext};
use super::environment::{Environment, Exported, ModuleExtension};
use super::error::ExtensionError;
use super::implementation::{ExtensionReturn, Interrupt};
use super::step::Step;
use super::workdir::{InFlightDirectories, WorkingDirectory, WORKING_DIRECTORY_ROOT};
use crate::config::LockfileMode;
use crate::diagnostics::{Diagnostic, DiagnosticHandler};
use crate::location::Location;
use crate::lockfile::{ExtensionResolution, LockFileModuleExtension};
use crate::model::{ModuleExtensionId, RepoSpec, SingleExtensionUsages};
use crate::policy::{CacheDecision, ConsistencyPolicy};
use crate::ready;
use crate::spelling::did_you_mean;
use crate::validate::validate_imports;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Repositories produced by one extension, addressable by exported or canonical name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleExtensionEvalValue {
    generated_repo_specs: BTreeMap<String, RepoSpec>,
    /// Canonical repository name to exported name
    canonical_repo_names: BTreeMap<String, String>,
}

impl SingleExtensionEvalValue {
    pub fn new(unique_name: &str, generated_repo_specs: BTreeMap<String, RepoSpec>) -> Self {
        let canonical_repo_names = generated_repo_specs
            .keys()
            .map(|exported| (format!("{}~{}", unique_name, exported), exported.clone()))
            .collect();
        Self {
            generated_repo_specs,
            canonical_repo_names,
        }
    }

    pub fn generated_repo_specs(&self) -> &BTreeMap<String, RepoSpec> {
        &self.generated_repo_specs
    }

    pub fn canonical_repo_names(&self) -> &BTreeMap<String, String> {
        &self.canonical_repo_names
    }

    pub fn exported_name(&self, canonical_name: &str) -> Option<&str> {
        self.canonical_repo_names.get(canonical_name).map(String::as_str)
    }

    pub fn canonical_name(&self, exported_name: &str) -> Option<&str> {
        self.canonical_repo_names
            .iter()
            .find(|(_, exported)| exported.as_str() == exported_name)
            .map(|(canonical, _)| canonical.as_str())
    }
}

/// Result of a settled evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationOutput {
    pub value: SingleExtensionEvalValue,
    /// Entry to record in the lockfile, present only in update mode after a fresh run
    pub resolution: Option<ExtensionResolution>,
    pub from_lockfile: bool,
}

/// Evaluates one module extension at a time, consulting the lockfile first
pub struct SingleExtensionEvaluator {
    output_base: PathBuf,
    policy: ConsistencyPolicy,
    capabilities: Capabilities,
    diagnostics: Arc<dyn DiagnosticHandler>,
    in_flight: InFlightDirectories,
}

impl SingleExtensionEvaluator {
    pub fn new(
        output_base: impl Into<PathBuf>,
        mode: LockfileMode,
        capabilities: Capabilities,
        diagnostics: Arc<dyn DiagnosticHandler>,
    ) -> Self {
        Self {
            output_base: output_base.into(),
            policy: ConsistencyPolicy::new(mode),
            capabilities,
            diagnostics,
            in_flight: InFlightDirectories::new(),
        }
    }

    pub fn mode(&self) -> LockfileMode {
        self.policy.mode()
    }

    pub fn output_base(&self) -> &Path {
        &self.output_base
    }

    /// Remove the working directories of evaluations still running; returns how many were removed
    pub fn abort_in_flight(&self) -> usize {
        self.in_flight.remove_all()
    }

    /// Produce the repositories of `id`, from the lockfile when possible
    ///
    /// Returns `NotReady` when an input is missing; nothing observable is left
    /// behind in that case and the call can simply be repeated later.
    pub fn evaluate(
        &self,
        id: &ModuleExtensionId,
        env: &dyn Environment,
    ) -> Result<Step<EvaluationOutput>, ExtensionError> {
        let usages = ready!(env.extension_usages(id));
        let location = usages
            .sample_location()
            .cloned()
            .ok_or_else(|| ExtensionError::NoUsages(id.clone()))?;

        let label = id.bzl_file_label();
        label.check_loadable()?;

        let script = match env.load_script(label) {
            Ok(step) => ready!(step),
            Err(error) => {
                return Err(ExtensionError::LoadFailed {
                    label: label.clone(),
                    location,
                    message: error.message().to_string(),
                })
            }
        };

        let extension = match script.get(id.extension_name()) {
            Some(Exported::Extension(extension)) => extension.clone(),
            _ => {
                return Err(ExtensionError::MissingExport {
                    label: label.clone(),
                    name: id.extension_name().to_string(),
                    location,
                    suggestion: did_you_mean(id.extension_name(), script.extension_names()),
                })
            }
        };
        let digest = script.transitive_digest();

        let decision = if self.mode() == LockfileMode::Off {
            CacheDecision::Evaluate { record: false }
        } else {
            let lockfile = ready!(env.lockfile());
            self.policy
                .decide(id, digest, &usages.extension_usages, Some(lockfile.as_ref()))?
        };

        let record = match decision {
            CacheDecision::Reuse(entry) => {
                validate_imports(id, &entry.generated_repo_specs, usages.usages())?;
                return Ok(Step::Ready(EvaluationOutput {
                    value: SingleExtensionEvalValue::new(
                        &usages.extension_unique_name,
                        entry.generated_repo_specs,
                    ),
                    resolution: None,
                    from_lockfile: true,
                }));
            }
            CacheDecision::Evaluate { record } => record,
        };

        let generated = ready!(self.run(id, &extension, &usages, &location, env)?);
        validate_imports(id, &generated, usages.usages())?;

        let resolution = record.then(|| ExtensionResolution {
            extension_id: id.clone(),
            entry: LockFileModuleExtension::new(digest.clone(), generated.clone()),
        });

        Ok(Step::Ready(EvaluationOutput {
            value: SingleExtensionEvalValue::new(&usages.extension_unique_name, generated),
            resolution,
            from_lockfile: false,
        }))
    }

    fn run(
        &self,
        id: &ModuleExtensionId,
        extension: &ModuleExtension,
        usages: &SingleExtensionUsages,
        location: &Location,
        env: &dyn Environment,
    ) -> Result<Step<BTreeMap<String, RepoSpec>>, ExtensionError> {
        let mut modules = Vec::with_capacity(usages.abridged_modules.len());
        for module in &usages.abridged_modules {
            let Some(usage) = usages.usage(&module.key) else {
                continue;
            };
            let repo_mapping = usages.repo_mappings.get(&module.key).cloned().unwrap_or_default();
            modules.push(ExtensionModule::create(module, id, extension, usage, repo_mapping)?);
        }

        let working_directory = WorkingDirectory::fresh(&self.output_base, &usages.extension_unique_name)
            .map_err(|source| ExtensionError::Cleanup {
                path: self
                    .output_base
                    .join(WORKING_DIRECTORY_ROOT)
                    .join(&usages.extension_unique_name),
                source,
            })?;
        let _in_flight = self.in_flight.register(working_directory.path());

        info!("Evaluating module extension {}", id);
        let mut ctx = ModuleExtensionContext::new(
            id,
            modules,
            working_directory,
            &self.capabilities,
            env,
            self.diagnostics.as_ref(),
        );
        let outcome = extension.implementation().call(&mut ctx);
        let (generated, working_directory) = ctx.into_parts();

        match outcome {
            Ok(ExtensionReturn::None) => {}
            Ok(ExtensionReturn::Metadata(metadata)) => {
                metadata.evaluate(usages, &generated, self.diagnostics.as_ref())?;
            }
            Ok(ExtensionReturn::Invalid { type_name }) => {
                return Err(ExtensionError::InvalidReturn {
                    name: id.extension_name().to_string(),
                    label: id.bzl_file_label().clone(),
                    type_name,
                });
            }
            Err(Interrupt::Restart) => {
                let removed = working_directory
                    .remove()
                    .map_err(|source| ExtensionError::Cleanup {
                        path: working_directory.path().to_path_buf(),
                        source,
                    })?;
                if removed {
                    debug!("Removed working directory {}", working_directory.path().display());
                }
                info!("Module extension {} is waiting for inputs and will be restarted", id);
                return Ok(Step::NotReady);
            }
            Err(Interrupt::Error(error)) => {
                self.diagnostics
                    .report(Diagnostic::error(error.message_with_stack()).at(location.clone()));
                return Err(ExtensionError::EvaluationFailed {
                    name: id.extension_name().to_string(),
                    label: id.bzl_file_label().clone(),
                    error,
                });
            }
        }

        debug!("Module extension {} generated {} repositories", id, generated.len());
        Ok(Step::Ready(generated))
    }
}
