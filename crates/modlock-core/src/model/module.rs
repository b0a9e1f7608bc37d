use super::module_key::ModuleKey;
use super::usage::ModuleExtensionUsage;
use super::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Apparent repository name to canonical repository name, as seen from one module
pub type RepoMapping = BTreeMap<String, String>;

/// A resolved module in the dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub name: String,
    pub version: Version,
    pub key: ModuleKey,
    /// Name the module uses for its own repository
    pub repo_name: String,
    /// Apparent repository name to the key of the module it refers to
    #[serde(default)]
    pub deps: BTreeMap<String, ModuleKey>,
    #[serde(default)]
    pub extension_usages: Vec<ModuleExtensionUsage>,
}

impl Module {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        let name = name.into();
        Self {
            key: ModuleKey::new(name.clone(), version.clone()),
            repo_name: name.clone(),
            name,
            version,
            deps: BTreeMap::new(),
            extension_usages: Vec::new(),
        }
    }

    /// The workspace's own module
    pub fn root(name: impl Into<String>, version: Version) -> Self {
        Self {
            key: ModuleKey::ROOT,
            ..Self::new(name, version)
        }
    }

    pub fn with_repo_name(mut self, repo_name: impl Into<String>) -> Self {
        self.repo_name = repo_name.into();
        self
    }

    pub fn with_dep(mut self, apparent_name: impl Into<String>, key: ModuleKey) -> Self {
        self.deps.insert(apparent_name.into(), key);
        self
    }

    pub fn with_usage(mut self, usage: ModuleExtensionUsage) -> Self {
        self.extension_usages.push(usage);
        self
    }

    pub fn canonical_repo_name(&self) -> String {
        self.key.canonical_repo_name()
    }

    pub fn abridged(&self) -> AbridgedModule {
        AbridgedModule {
            name: self.name.clone(),
            version: self.version.clone(),
            key: self.key.clone(),
        }
    }

    /// Repository names visible from this module's own module file
    pub fn repo_mapping(&self) -> RepoMapping {
        let mut mapping: RepoMapping = self
            .deps
            .iter()
            .map(|(apparent, key)| (apparent.clone(), key.canonical_repo_name()))
            .collect();
        mapping.insert(self.repo_name.clone(), self.canonical_repo_name());
        mapping
    }
}

/// Identity-only view of a module handed to extension implementations
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AbridgedModule {
    pub name: String,
    pub version: Version,
    pub key: ModuleKey,
}
