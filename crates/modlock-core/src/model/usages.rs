use super::extension_id::ModuleExtensionId;
use super::module::{AbridgedModule, Module, RepoMapping};
use super::module_key::ModuleKey;
use super::usage::ModuleExtensionUsage;
use crate::location::Location;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("module {module} uses the module extension '{extension_id}' more than once: at {first} and at {second}")]
    DuplicateUsage {
        module: ModuleKey,
        extension_id: ModuleExtensionId,
        first: Location,
        second: Location,
    },
}

/// Usages of every extension, grouped by extension and then by using module
pub type UsagesById = BTreeMap<ModuleExtensionId, BTreeMap<ModuleKey, ModuleExtensionUsage>>;

/// Group the usages declared across a dependency graph by extension
pub fn extension_usages_by_id(dep_graph: &BTreeMap<ModuleKey, Module>) -> Result<UsagesById, UsageError> {
    let mut by_id = UsagesById::new();
    for (key, module) in dep_graph {
        for usage in &module.extension_usages {
            let per_module = by_id.entry(usage.extension_id.clone()).or_default();
            if let Some(existing) = per_module.get(key) {
                return Err(UsageError::DuplicateUsage {
                    module: key.clone(),
                    extension_id: usage.extension_id.clone(),
                    first: existing.location.clone(),
                    second: usage.location.clone(),
                });
            }
            per_module.insert(key.clone(), usage.clone());
        }
    }
    Ok(by_id)
}

/// Assign every extension a unique name usable as a repository-name prefix
///
/// Names are `<repo>~<extension>[~<isolation key>]`; collisions get a numeric
/// suffix in id order, so the assignment is stable for a given set of ids.
pub fn unique_extension_names<'a>(
    ids: impl IntoIterator<Item = &'a ModuleExtensionId>,
) -> BTreeMap<ModuleExtensionId, String> {
    let mut ids: Vec<&ModuleExtensionId> = ids.into_iter().collect();
    ids.sort();
    ids.dedup();

    let mut taken = FxHashSet::default();
    let mut names = BTreeMap::new();
    for id in ids {
        let mut base = format!(
            "{}~{}",
            id.bzl_file_label().repo_display_name(),
            id.extension_name()
        );
        if let Some(key) = id.isolation_key() {
            base.push('~');
            base.push_str(key);
        }

        let mut candidate = base.clone();
        let mut suffix = 2;
        while !taken.insert(candidate.clone()) {
            candidate = format!("{}{}", base, suffix);
            suffix += 1;
        }
        names.insert(id.clone(), candidate);
    }
    names
}

/// All usages of one extension across the dependency graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleExtensionUsages {
    pub extension_id: ModuleExtensionId,
    pub extension_unique_name: String,
    pub extension_usages: BTreeMap<ModuleKey, ModuleExtensionUsage>,
    pub abridged_modules: Vec<AbridgedModule>,
    pub repo_mappings: BTreeMap<ModuleKey, RepoMapping>,
}

impl SingleExtensionUsages {
    /// Location reported for errors about the extension as a whole
    pub fn sample_location(&self) -> Option<&Location> {
        self.extension_usages.values().next().map(|usage| &usage.location)
    }

    pub fn usage(&self, module: &ModuleKey) -> Option<&ModuleExtensionUsage> {
        self.extension_usages.get(module)
    }

    pub fn usages(&self) -> impl Iterator<Item = &ModuleExtensionUsage> {
        self.extension_usages.values()
    }
}

/// Per-extension view of a resolved dependency graph
#[derive(Debug, Clone, Default)]
pub struct ExtensionUsageIndex {
    usages_by_id: UsagesById,
    unique_names: BTreeMap<ModuleExtensionId, String>,
    modules: BTreeMap<ModuleKey, (AbridgedModule, RepoMapping)>,
}

impl ExtensionUsageIndex {
    pub fn from_dep_graph(dep_graph: &BTreeMap<ModuleKey, Module>) -> Result<Self, UsageError> {
        let usages_by_id = extension_usages_by_id(dep_graph)?;
        let unique_names = unique_extension_names(usages_by_id.keys());
        let modules = dep_graph
            .iter()
            .map(|(key, module)| (key.clone(), (module.abridged(), module.repo_mapping())))
            .collect();
        Ok(Self {
            usages_by_id,
            unique_names,
            modules,
        })
    }

    pub fn extension_ids(&self) -> impl Iterator<Item = &ModuleExtensionId> {
        self.usages_by_id.keys()
    }

    pub fn usages(&self, id: &ModuleExtensionId) -> Option<&BTreeMap<ModuleKey, ModuleExtensionUsage>> {
        self.usages_by_id.get(id)
    }

    pub fn unique_name(&self, id: &ModuleExtensionId) -> Option<&str> {
        self.unique_names.get(id).map(String::as_str)
    }

    pub fn single(&self, id: &ModuleExtensionId) -> Option<SingleExtensionUsages> {
        let usages = self.usages_by_id.get(id)?;
        let unique_name = self.unique_names.get(id)?;

        let mut abridged_modules = Vec::with_capacity(usages.len());
        let mut repo_mappings = BTreeMap::new();
        for key in usages.keys() {
            if let Some((abridged, mapping)) = self.modules.get(key) {
                abridged_modules.push(abridged.clone());
                repo_mappings.insert(key.clone(), mapping.clone());
            }
        }

        Some(SingleExtensionUsages {
            extension_id: id.clone(),
            extension_unique_name: unique_name.clone(),
            extension_usages: usages.clone(),
            abridged_modules,
            repo_mappings,
        })
    }

    pub fn len(&self) -> usize {
        self.usages_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.usages_by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Label, Version};

    fn ext(label: &str, name: &str) -> ModuleExtensionId {
        ModuleExtensionId::new(Label::parse_canonical(label).unwrap(), name)
    }

    fn usage(id: &ModuleExtensionId, line: u32) -> ModuleExtensionUsage {
        ModuleExtensionUsage::new(id.clone(), Location::new("MODULE.bazel", line, 1))
    }

    #[test]
    fn test_unique_names() {
        let a = ext("@rules_foo~1.0//:ext.bzl", "maven");
        let b = ext("//:ext.bzl", "maven");
        let c = ext("//:ext.bzl", "maven").with_isolation_key("0");
        let names = unique_extension_names([&a, &b, &c]);

        assert_eq!(names[&a], "rules_foo~1.0~maven");
        assert_eq!(names[&b], "_main~maven");
        assert_eq!(names[&c], "_main~maven~0");
    }

    #[test]
    fn test_unique_names_deduplicate_collisions() {
        let a = ext("//a:ext.bzl", "maven");
        let b = ext("//b:ext.bzl", "maven");
        let names = unique_extension_names([&b, &a]);

        assert_eq!(names[&a], "_main~maven");
        assert_eq!(names[&b], "_main~maven2");
    }

    #[test]
    fn test_index_groups_usages() {
        let id = ext("//:ext.bzl", "maven");
        let dep_key = ModuleKey::new("bar", Version::parse("1.0").unwrap());
        let mut graph = BTreeMap::new();
        graph.insert(
            ModuleKey::ROOT,
            Module::root("foo", Version::EMPTY)
                .with_dep("bar", dep_key.clone())
                .with_usage(usage(&id, 3)),
        );
        graph.insert(
            dep_key.clone(),
            Module::new("bar", Version::parse("1.0").unwrap()).with_usage(usage(&id, 7)),
        );

        let index = ExtensionUsageIndex::from_dep_graph(&graph).unwrap();
        let single = index.single(&id).unwrap();
        assert_eq!(single.extension_usages.len(), 2);
        assert_eq!(single.abridged_modules[0].key, ModuleKey::ROOT);
        assert_eq!(single.repo_mappings[&ModuleKey::ROOT]["bar"], "bar~1.0");
        assert_eq!(single.sample_location().map(|l| l.line), Some(3));
        assert_eq!(index.unique_name(&id), Some("_main~maven"));
    }

    #[test]
    fn test_duplicate_usage_is_rejected() {
        let id = ext("//:ext.bzl", "maven");
        let mut graph = BTreeMap::new();
        graph.insert(
            ModuleKey::ROOT,
            Module::root("foo", Version::EMPTY)
                .with_usage(usage(&id, 1))
                .with_usage(usage(&id, 2)),
        );

        let err = ExtensionUsageIndex::from_dep_graph(&graph).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }
}
