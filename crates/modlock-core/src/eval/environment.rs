use super::implementation::{ExtensionImplementation, FnImplementation, Interrupt, ScriptError};
use super::step::Step;
use super::{context::ModuleExtensionContext, ExtensionReturn};
use crate::digest::TransitiveDigest;
use crate::lockfile::Lockfile;
use crate::model::{Label, ModuleExtensionId, SingleExtensionUsages};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Inputs the evaluator pulls from the surrounding build engine
///
/// Every method may answer `NotReady` when the value has not been computed
/// yet; the evaluator then gives up the current attempt without side effects.
pub trait Environment: Send + Sync {
    /// Aggregated usages of one extension across the dependency graph
    fn extension_usages(&self, id: &ModuleExtensionId) -> Step<Arc<SingleExtensionUsages>>;

    /// Load a script and report what it exports
    fn load_script(&self, label: &Label) -> Result<Step<Arc<LoadedScript>>, ScriptError>;

    /// The lockfile as loaded at the start of the build
    fn lockfile(&self) -> Step<Arc<Lockfile>>;

    /// File contents requested by an implementation while it runs
    fn input(&self, label: &Label) -> Result<Step<Arc<[u8]>>, ScriptError>;
}

/// A module extension as exported by a script
#[derive(Clone)]
pub struct ModuleExtension {
    implementation: Arc<dyn ExtensionImplementation>,
    tag_classes: BTreeSet<String>,
}

impl ModuleExtension {
    pub fn new(implementation: Arc<dyn ExtensionImplementation>) -> Self {
        Self {
            implementation,
            tag_classes: BTreeSet::new(),
        }
    }

    /// Extension whose implementation is a closure
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&mut ModuleExtensionContext<'_>) -> Result<ExtensionReturn, Interrupt> + Send + Sync + 'static,
    {
        Self::new(Arc::new(FnImplementation(f)))
    }

    pub fn with_tag_class(mut self, name: impl Into<String>) -> Self {
        self.tag_classes.insert(name.into());
        self
    }

    pub fn tag_classes(&self) -> &BTreeSet<String> {
        &self.tag_classes
    }

    pub fn implementation(&self) -> &Arc<dyn ExtensionImplementation> {
        &self.implementation
    }
}

impl fmt::Debug for ModuleExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleExtension")
            .field("tag_classes", &self.tag_classes)
            .finish_non_exhaustive()
    }
}

/// A top-level value exported by a script
#[derive(Debug, Clone)]
pub enum Exported {
    Extension(ModuleExtension),
    /// Any other value; only the type name is kept for error messages
    Value { type_name: String },
}

/// A loaded script: its exports and the digest of its transitive load closure
#[derive(Debug, Clone)]
pub struct LoadedScript {
    label: Label,
    exports: BTreeMap<String, Exported>,
    transitive_digest: TransitiveDigest,
}

impl LoadedScript {
    pub fn new(label: Label, transitive_digest: TransitiveDigest) -> Self {
        Self {
            label,
            exports: BTreeMap::new(),
            transitive_digest,
        }
    }

    pub fn with_extension(mut self, name: impl Into<String>, extension: ModuleExtension) -> Self {
        self.exports.insert(name.into(), Exported::Extension(extension));
        self
    }

    pub fn with_value(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.exports.insert(
            name.into(),
            Exported::Value {
                type_name: type_name.into(),
            },
        );
        self
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    pub fn transitive_digest(&self) -> &TransitiveDigest {
        &self.transitive_digest
    }

    pub fn get(&self, name: &str) -> Option<&Exported> {
        self.exports.get(name)
    }

    pub fn extension(&self, name: &str) -> Option<&ModuleExtension> {
        match self.exports.get(name) {
            Some(Exported::Extension(extension)) => Some(extension),
            _ => None,
        }
    }

    /// Names of the exports that are module extensions
    pub fn extension_names(&self) -> impl Iterator<Item = &str> {
        self.exports.iter().filter_map(|(name, exported)| match exported {
            Exported::Extension(_) => Some(name.as_str()),
            Exported::Value { .. } => None,
        })
    }
}
