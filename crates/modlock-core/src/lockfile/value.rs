use super::error::{LockfileError, Result};
use super::flags::ResolutionFlags;
use super::LOCK_FILE_VERSION;
use crate::digest::TransitiveDigest;
use crate::model::{extension_usages_by_id, Module, ModuleExtensionId, ModuleKey, RepoSpec, UsagesById};
use crate::validate::validate_imports;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Cached result of evaluating one module extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockFileModuleExtension {
    /// Fingerprint of the defining script and its transitive loads
    pub transitive_digest: TransitiveDigest,

    /// Repository name to the spec the extension produced for it
    #[serde(default)]
    pub generated_repo_specs: BTreeMap<String, RepoSpec>,
}

impl LockFileModuleExtension {
    pub fn new(transitive_digest: TransitiveDigest, generated_repo_specs: BTreeMap<String, RepoSpec>) -> Self {
        Self {
            transitive_digest,
            generated_repo_specs,
        }
    }
}

/// Inputs of dependency resolution that the lockfile records alongside extension results
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolutionInputs {
    pub module_file_hash: String,
    pub flags: ResolutionFlags,
    pub local_override_hashes: BTreeMap<String, String>,
    pub module_dep_graph: BTreeMap<ModuleKey, Module>,
}

/// The on-disk lockfile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    /// Schema version for the lockfile format
    pub lock_file_version: u32,

    /// Hash of the root module file
    #[serde(default)]
    pub module_file_hash: String,

    #[serde(default)]
    pub flags: ResolutionFlags,

    /// Module name to the hash of its locally overridden module file
    #[serde(default)]
    pub local_override_hashes: BTreeMap<String, String>,

    #[serde(default)]
    pub module_dep_graph: BTreeMap<ModuleKey, Module>,

    #[serde(default)]
    pub module_extensions: BTreeMap<ModuleExtensionId, LockFileModuleExtension>,
}

impl Default for Lockfile {
    fn default() -> Self {
        Self::new(ResolutionInputs::default())
    }
}

impl Lockfile {
    /// Create a lockfile for the given inputs with no extension entries
    pub fn new(inputs: ResolutionInputs) -> Self {
        Self {
            lock_file_version: LOCK_FILE_VERSION,
            module_file_hash: inputs.module_file_hash,
            flags: inputs.flags,
            local_override_hashes: inputs.local_override_hashes,
            module_dep_graph: inputs.module_dep_graph,
            module_extensions: BTreeMap::new(),
        }
    }

    /// The resolution inputs this lockfile was written for
    pub fn inputs(&self) -> ResolutionInputs {
        ResolutionInputs {
            module_file_hash: self.module_file_hash.clone(),
            flags: self.flags.clone(),
            local_override_hashes: self.local_override_hashes.clone(),
            module_dep_graph: self.module_dep_graph.clone(),
        }
    }

    /// Usages recorded in the locked dependency graph, grouped by extension
    pub fn extension_usages_by_id(&self) -> Result<UsagesById> {
        Ok(extension_usages_by_id(&self.module_dep_graph)?)
    }

    /// Extensions used anywhere in the locked dependency graph
    pub fn used_extension_ids(&self) -> Result<BTreeSet<ModuleExtensionId>> {
        Ok(self.extension_usages_by_id()?.into_keys().collect())
    }

    /// Check every extension entry against the imports of the locked usages
    pub fn validate(&self) -> Result<()> {
        let usages = self.extension_usages_by_id()?;
        for (id, entry) in &self.module_extensions {
            let Some(per_module) = usages.get(id) else {
                continue;
            };
            validate_imports(id, &entry.generated_repo_specs, per_module.values()).map_err(|source| {
                LockfileError::UnresolvedImports {
                    extension_id: id.clone(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    /// Drop entries for extensions no module uses anymore, returning their ids
    pub fn retain_used_extensions(&mut self) -> Result<Vec<ModuleExtensionId>> {
        let used = self.used_extension_ids()?;
        let unused: Vec<ModuleExtensionId> = self
            .module_extensions
            .keys()
            .filter(|id| !used.contains(*id))
            .cloned()
            .collect();
        for id in &unused {
            self.module_extensions.remove(id);
        }
        Ok(unused)
    }

    /// Serialize to the pretty-printed JSON stored on disk
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Parse lockfile text read from `path`
    ///
    /// The format version is checked before the rest of the document so an
    /// incompatible file reports a version mismatch rather than a parse error.
    pub fn from_json(text: &str, path: &Path) -> Result<Self> {
        let document: serde_json::Value = serde_json::from_str(text).map_err(|e| LockfileError::Corrupted {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let found = document
            .get("lockFileVersion")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| LockfileError::Corrupted {
                path: path.to_path_buf(),
                reason: "missing or non-numeric lockFileVersion".to_string(),
            })?;
        if found != u64::from(LOCK_FILE_VERSION) {
            return Err(LockfileError::VersionMismatch {
                path: path.to_path_buf(),
                expected: LOCK_FILE_VERSION,
                found,
            });
        }

        serde_json::from_value(document).map_err(|e| LockfileError::Corrupted {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
