use super::error::Result;
use super::value::{LockFileModuleExtension, Lockfile, ResolutionInputs};
use crate::model::ModuleExtensionId;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Fresh evaluation result of one extension, to be written to the lockfile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionResolution {
    pub extension_id: ModuleExtensionId,
    pub entry: LockFileModuleExtension,
}

/// Collects extension results during a resolution and merges them into the next lockfile
///
/// Results may be recorded from several threads; nothing touches the disk
/// until the caller writes the built lockfile once at the end.
#[derive(Debug, Default)]
pub struct LockfileUpdater {
    resolved: Mutex<BTreeMap<ModuleExtensionId, LockFileModuleExtension>>,
}

impl LockfileUpdater {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result; a later result for the same extension replaces an earlier one
    pub fn record(&self, resolution: ExtensionResolution) {
        let mut resolved = self.resolved.lock().unwrap_or_else(PoisonError::into_inner);
        resolved.insert(resolution.extension_id, resolution.entry);
    }

    pub fn len(&self) -> usize {
        self.resolved.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the next lockfile from the current inputs
    ///
    /// Entries from `previous` survive only while every module uses their
    /// extension exactly as the previous dependency graph recorded; recorded
    /// results override them.
    pub fn build(self, previous: &Lockfile, inputs: ResolutionInputs) -> Result<Lockfile> {
        let mut next = Lockfile::new(inputs);
        let current_usages = next.extension_usages_by_id()?;
        let previous_usages = previous.extension_usages_by_id()?;

        for (id, entry) in &previous.module_extensions {
            match (current_usages.get(id), previous_usages.get(id)) {
                (Some(current), Some(locked)) if current == locked => {
                    next.module_extensions.insert(id.clone(), entry.clone());
                }
                (Some(_), _) => debug!("Dropping lockfile entry for extension {} with changed usages", id),
                (None, _) => debug!("Dropping lockfile entry for unused extension {}", id),
            }
        }

        let resolved = self.resolved.into_inner().unwrap_or_else(PoisonError::into_inner);
        for (id, entry) in resolved {
            if current_usages.contains_key(&id) {
                next.module_extensions.insert(id, entry);
            }
        }

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::TransitiveDigest;
    use crate::location::Location;
    use crate::model::{Label, Module, ModuleExtensionUsage, ModuleKey, Tag, Version};

    fn id(name: &str) -> ModuleExtensionId {
        ModuleExtensionId::new(Label::parse_canonical("//:ext.bzl").unwrap(), name)
    }

    fn inputs_using(ids: &[&ModuleExtensionId]) -> ResolutionInputs {
        let mut root = Module::root("root", Version::EMPTY);
        for (line, id) in ids.iter().enumerate() {
            root = root.with_usage(ModuleExtensionUsage::new(
                (*id).clone(),
                Location::new("MODULE.bazel", line as u32 + 1, 1),
            ));
        }
        let mut graph = BTreeMap::new();
        graph.insert(ModuleKey::ROOT, root);
        ResolutionInputs {
            module_dep_graph: graph,
            ..ResolutionInputs::default()
        }
    }

    fn entry(content: &[u8]) -> LockFileModuleExtension {
        LockFileModuleExtension::new(TransitiveDigest::of_content(content), BTreeMap::new())
    }

    #[test]
    fn test_build_merges_and_prunes() {
        let kept = id("kept");
        let refreshed = id("refreshed");
        let removed = id("removed");

        let mut previous = Lockfile::new(inputs_using(&[&kept, &refreshed, &removed]));
        previous.module_extensions.insert(kept.clone(), entry(b"kept"));
        previous.module_extensions.insert(refreshed.clone(), entry(b"old"));
        previous.module_extensions.insert(removed.clone(), entry(b"removed"));

        let updater = LockfileUpdater::new();
        updater.record(ExtensionResolution {
            extension_id: refreshed.clone(),
            entry: entry(b"new"),
        });

        let next = updater.build(&previous, inputs_using(&[&kept, &refreshed])).unwrap();
        assert_eq!(next.module_extensions.len(), 2);
        assert_eq!(next.module_extensions[&kept], entry(b"kept"));
        assert_eq!(next.module_extensions[&refreshed], entry(b"new"));
        assert!(!next.module_extensions.contains_key(&removed));
    }

    #[test]
    fn test_later_record_wins() {
        let ext = id("ext");
        let updater = LockfileUpdater::new();
        updater.record(ExtensionResolution {
            extension_id: ext.clone(),
            entry: entry(b"first"),
        });
        updater.record(ExtensionResolution {
            extension_id: ext.clone(),
            entry: entry(b"second"),
        });
        assert_eq!(updater.len(), 1);

        let next = updater.build(&Lockfile::default(), inputs_using(&[&ext])).unwrap();
        assert_eq!(next.module_extensions[&ext], entry(b"second"));
    }

    #[test]
    fn test_build_drops_entry_whose_usages_changed() {
        let ext = id("ext");
        let mut previous = Lockfile::new(inputs_using(&[&ext]));
        previous.module_extensions.insert(ext.clone(), entry(b"ext"));

        let mut inputs = inputs_using(&[]);
        let tagged = ModuleExtensionUsage::new(ext.clone(), Location::new("MODULE.bazel", 1, 1))
            .with_tag(Tag::new("install", Location::new("MODULE.bazel", 2, 1)));
        inputs.module_dep_graph.insert(
            ModuleKey::ROOT,
            Module::root("root", Version::EMPTY).with_usage(tagged),
        );

        let next = LockfileUpdater::new().build(&previous, inputs).unwrap();
        assert!(next.module_extensions.is_empty());
        assert!(next.validate().is_ok());
    }

    #[test]
    fn test_build_drops_entry_when_import_added() {
        let ext = id("ext");
        let mut previous = Lockfile::new(inputs_using(&[&ext]));
        previous.module_extensions.insert(ext.clone(), entry(b"ext"));

        let mut inputs = inputs_using(&[]);
        let importing = ModuleExtensionUsage::new(ext.clone(), Location::new("MODULE.bazel", 1, 1)).with_import("c", "c");
        inputs.module_dep_graph.insert(
            ModuleKey::ROOT,
            Module::root("root", Version::EMPTY).with_usage(importing),
        );

        let next = LockfileUpdater::new().build(&previous, inputs).unwrap();
        assert!(!next.module_extensions.contains_key(&ext));
        assert!(next.validate().is_ok());
    }
}
