#![allow(dead_code)]

use modlock_core::diagnostics::CollectingDiagnosticHandler;
use modlock_core::digest::ScriptGraph;
use modlock_core::eval::{
    Capabilities, Environment, ExtensionImplementation, ExtensionReturn, Interrupt, LoadedScript,
    ModuleExtension, ModuleExtensionContext, ScriptError, SingleExtensionEvaluator, Step,
};
use modlock_core::lockfile::{Lockfile, ResolutionInputs};
use modlock_core::model::{
    ExtensionUsageIndex, Label, Module, ModuleExtensionId, ModuleExtensionUsage, ModuleKey, RepoSpec,
    SingleExtensionUsages, Version,
};
use modlock_core::{LockfileMode, Location};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const EXT_BZL: &str = "//:ext.bzl";
pub const EXT_BZL_CONTENT: &str = "def _impl(ctx):\n    pass\n\ndeps = module_extension(_impl)\n";

pub fn label(s: &str) -> Label {
    Label::parse_canonical(s).unwrap()
}

pub fn ext_id(name: &str) -> ModuleExtensionId {
    ModuleExtensionId::new(label(EXT_BZL), name)
}

pub fn module_file_location(line: u32) -> Location {
    Location::new("/ws/MODULE.bazel", line, 1)
}

/// Root-module usage of `id` importing each name under itself
pub fn usage_importing(id: &ModuleExtensionId, names: &[&str]) -> ModuleExtensionUsage {
    names.iter().fold(
        ModuleExtensionUsage::new(id.clone(), module_file_location(3)),
        |usage, name| usage.with_import(*name, *name),
    )
}

/// Dependency graph with a root module carrying the given usages
pub fn root_graph(usages: Vec<ModuleExtensionUsage>) -> BTreeMap<ModuleKey, Module> {
    let root = usages
        .into_iter()
        .fold(Module::root("root", Version::parse("1.0").unwrap()), Module::with_usage);
    BTreeMap::from([(ModuleKey::ROOT, root)])
}

pub fn inputs_for(graph: &BTreeMap<ModuleKey, Module>) -> ResolutionInputs {
    ResolutionInputs {
        module_file_hash: "module-file-hash".to_string(),
        module_dep_graph: graph.clone(),
        ..ResolutionInputs::default()
    }
}

/// Script at `//:ext.bzl` exporting `extensions`, digested from `content`
pub fn script(content: &str, extensions: Vec<(&str, ModuleExtension)>) -> LoadedScript {
    let label = label(EXT_BZL);
    let mut graph = ScriptGraph::new();
    graph.insert(label.clone(), content.as_bytes().to_vec(), Vec::<Label>::new());
    let digest = graph.transitive_digest(&label).unwrap();
    extensions
        .into_iter()
        .fold(LoadedScript::new(label, digest), |script, (name, extension)| {
            script.with_extension(name, extension)
        })
}

pub fn evaluator(output_base: &Path, mode: LockfileMode) -> (SingleExtensionEvaluator, Arc<CollectingDiagnosticHandler>) {
    let diagnostics = Arc::new(CollectingDiagnosticHandler::new());
    let evaluator = SingleExtensionEvaluator::new(output_base, mode, Capabilities::offline(), diagnostics.clone());
    (evaluator, diagnostics)
}

/// Generates a fixed set of `local_repository` repos and counts its runs
#[derive(Default)]
pub struct RepoGenerator {
    repos: Vec<String>,
    calls: AtomicUsize,
}

impl RepoGenerator {
    pub fn new(repos: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            repos: repos.iter().map(|r| r.to_string()).collect(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ExtensionImplementation for RepoGenerator {
    fn call(&self, ctx: &mut ModuleExtensionContext<'_>) -> Result<ExtensionReturn, Interrupt> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for name in &self.repos {
            ctx.create_repo(name, expected_spec(name))?;
        }
        Ok(ExtensionReturn::None)
    }
}

pub fn expected_spec(name: &str) -> RepoSpec {
    RepoSpec::new("local_repository").with_attr("path", format!("/repos/{}", name))
}

pub fn expected_specs(names: &[&str]) -> BTreeMap<String, RepoSpec> {
    names.iter().map(|n| (n.to_string(), expected_spec(n))).collect()
}

struct PendingInput {
    content: Arc<[u8]>,
    misses_left: usize,
}

/// In-memory stand-in for the build engine
pub struct TestEnvironment {
    index: ExtensionUsageIndex,
    scripts: BTreeMap<Label, Arc<LoadedScript>>,
    lockfile: Arc<Lockfile>,
    inputs: Mutex<BTreeMap<Label, PendingInput>>,
    input_requests: AtomicUsize,
}

impl TestEnvironment {
    pub fn new(graph: &BTreeMap<ModuleKey, Module>) -> Self {
        Self {
            index: ExtensionUsageIndex::from_dep_graph(graph).unwrap(),
            scripts: BTreeMap::new(),
            lockfile: Arc::new(Lockfile::default()),
            inputs: Mutex::new(BTreeMap::new()),
            input_requests: AtomicUsize::new(0),
        }
    }

    pub fn with_script(mut self, script: LoadedScript) -> Self {
        self.scripts.insert(script.label().clone(), Arc::new(script));
        self
    }

    pub fn with_lockfile(mut self, lockfile: Lockfile) -> Self {
        self.lockfile = Arc::new(lockfile);
        self
    }

    /// Make an input available immediately
    pub fn provide_input(&self, label: &Label, content: &str) {
        self.provide_input_after(label, content, 0);
    }

    /// Make an input available after it has been requested `misses` times
    pub fn provide_input_after(&self, label: &Label, content: &str, misses: usize) {
        self.inputs.lock().unwrap().insert(
            label.clone(),
            PendingInput {
                content: Arc::from(content.as_bytes()),
                misses_left: misses,
            },
        );
    }

    pub fn input_requests(&self) -> usize {
        self.input_requests.load(Ordering::SeqCst)
    }
}

impl Environment for TestEnvironment {
    fn extension_usages(&self, id: &ModuleExtensionId) -> Step<Arc<SingleExtensionUsages>> {
        self.index.single(id).map(Arc::new).into()
    }

    fn load_script(&self, label: &Label) -> Result<Step<Arc<LoadedScript>>, ScriptError> {
        self.scripts
            .get(label)
            .cloned()
            .map(Step::Ready)
            .ok_or_else(|| ScriptError::new(format!("cannot load '{}': no such file", label)))
    }

    fn lockfile(&self) -> Step<Arc<Lockfile>> {
        Step::Ready(Arc::clone(&self.lockfile))
    }

    fn input(&self, label: &Label) -> Result<Step<Arc<[u8]>>, ScriptError> {
        self.input_requests.fetch_add(1, Ordering::SeqCst);
        let mut inputs = self.inputs.lock().unwrap();
        match inputs.get_mut(label) {
            Some(pending) if pending.misses_left == 0 => Ok(Step::Ready(Arc::clone(&pending.content))),
            Some(pending) => {
                pending.misses_left -= 1;
                Ok(Step::NotReady)
            }
            None => Ok(Step::NotReady),
        }
    }
}
