//! Decides whether a locked extension result can be reused.

use crate::config::LockfileMode;
use crate::diff::module_extension_diff;
use crate::digest::TransitiveDigest;
use crate::eval::ExtensionError;
use crate::lockfile::{LockFileModuleExtension, Lockfile};
use crate::model::{ModuleExtensionId, ModuleExtensionUsage, ModuleKey};
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDecision {
    /// The locked entry still matches; use its repositories as-is
    Reuse(LockFileModuleExtension),
    /// Run the extension; `record` says whether the result goes back into the lockfile
    Evaluate { record: bool },
}

impl CacheDecision {
    pub fn is_reuse(&self) -> bool {
        matches!(self, CacheDecision::Reuse(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsistencyPolicy {
    mode: LockfileMode,
}

impl ConsistencyPolicy {
    pub fn new(mode: LockfileMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> LockfileMode {
        self.mode
    }

    /// Compare the current digest and usages with the lockfile entry for `id`
    ///
    /// An entry matches only when the digest is identical and every module's
    /// usage is structurally equal to the usage recorded in the lockfile's own
    /// dependency graph. In error mode a mismatch fails with the list of reasons.
    pub fn decide(
        &self,
        id: &ModuleExtensionId,
        digest: &TransitiveDigest,
        usages: &BTreeMap<ModuleKey, ModuleExtensionUsage>,
        lockfile: Option<&Lockfile>,
    ) -> Result<CacheDecision, ExtensionError> {
        let record = match self.mode {
            LockfileMode::Off => {
                debug!("Lockfile disabled; evaluating {}", id);
                return Ok(CacheDecision::Evaluate { record: false });
            }
            LockfileMode::Update => true,
            LockfileMode::Error => false,
        };

        let (locked, locked_usages) = match lockfile {
            Some(lockfile) => (
                lockfile.module_extensions.get(id),
                lockfile
                    .extension_usages_by_id()?
                    .remove(id)
                    .unwrap_or_default(),
            ),
            None => (None, BTreeMap::new()),
        };

        if let Some(entry) = locked {
            if entry.transitive_digest == *digest && locked_usages == *usages {
                info!("Reusing locked result for module extension {}", id);
                return Ok(CacheDecision::Reuse(entry.clone()));
            }
        }

        if self.mode == LockfileMode::Error {
            let reasons = module_extension_diff(id, locked, &locked_usages, digest, usages);
            return Err(ExtensionError::StaleLockfile { reasons });
        }

        debug!("Lockfile entry for {} is missing or stale", id);
        Ok(CacheDecision::Evaluate { record })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Location;
    use crate::lockfile::ResolutionInputs;
    use crate::model::{Label, Module, RepoSpec, Tag, Version};

    fn id() -> ModuleExtensionId {
        ModuleExtensionId::new(Label::parse_canonical("//:ext.bzl").unwrap(), "ext")
    }

    fn usage() -> ModuleExtensionUsage {
        ModuleExtensionUsage::new(id(), Location::new("MODULE.bazel", 1, 1)).with_import("a", "a")
    }

    fn usages(usage: ModuleExtensionUsage) -> BTreeMap<ModuleKey, ModuleExtensionUsage> {
        BTreeMap::from([(ModuleKey::ROOT, usage)])
    }

    fn lockfile(digest: &TransitiveDigest) -> Lockfile {
        let mut graph = BTreeMap::new();
        graph.insert(ModuleKey::ROOT, Module::root("root", Version::EMPTY).with_usage(usage()));
        let mut lockfile = Lockfile::new(ResolutionInputs {
            module_dep_graph: graph,
            ..ResolutionInputs::default()
        });
        lockfile.module_extensions.insert(
            id(),
            LockFileModuleExtension::new(
                digest.clone(),
                BTreeMap::from([("a".to_string(), RepoSpec::new("local_repository"))]),
            ),
        );
        lockfile
    }

    #[test]
    fn test_update_mode_hit_and_miss() {
        let policy = ConsistencyPolicy::new(LockfileMode::Update);
        let digest = TransitiveDigest::of_content(b"v1");
        let lockfile = lockfile(&digest);

        let hit = policy.decide(&id(), &digest, &usages(usage()), Some(&lockfile)).unwrap();
        assert!(hit.is_reuse());

        let changed = TransitiveDigest::of_content(b"v2");
        let miss = policy.decide(&id(), &changed, &usages(usage()), Some(&lockfile)).unwrap();
        assert_eq!(miss, CacheDecision::Evaluate { record: true });

        let none = policy.decide(&id(), &digest, &usages(usage()), None).unwrap();
        assert_eq!(none, CacheDecision::Evaluate { record: true });
    }

    #[test]
    fn test_tag_change_invalidates_entry() {
        let policy = ConsistencyPolicy::new(LockfileMode::Update);
        let digest = TransitiveDigest::of_content(b"v1");
        let changed = usage().with_tag(Tag::new("install", Location::new("MODULE.bazel", 2, 1)));

        let decision = policy
            .decide(&id(), &digest, &usages(changed), Some(&lockfile(&digest)))
            .unwrap();
        assert!(!decision.is_reuse());
    }

    #[test]
    fn test_error_mode_fails_with_reasons() {
        let policy = ConsistencyPolicy::new(LockfileMode::Error);
        let digest = TransitiveDigest::of_content(b"v1");
        let changed = usage().with_import("b", "b");

        let err = policy
            .decide(&id(), &digest, &usages(changed), Some(&lockfile(&digest)))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Lock file is no longer up-to-date because: module <root> now imports the repository 'b' as 'b'"
        );
    }

    #[test]
    fn test_error_mode_without_lockfile() {
        let policy = ConsistencyPolicy::new(LockfileMode::Error);
        let digest = TransitiveDigest::of_content(b"v1");
        let err = policy.decide(&id(), &digest, &usages(usage()), None).unwrap_err();
        assert!(err.to_string().contains("does not exist in the lockfile"));
    }

    #[test]
    fn test_off_mode_never_reuses() {
        let policy = ConsistencyPolicy::new(LockfileMode::Off);
        let digest = TransitiveDigest::of_content(b"v1");
        let decision = policy
            .decide(&id(), &digest, &usages(usage()), Some(&lockfile(&digest)))
            .unwrap();
        assert_eq!(decision, CacheDecision::Evaluate { record: false });
    }
}
