use super::extension_id::ModuleExtensionId;
use crate::location::Location;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Attribute values of a tag or repository rule invocation
pub type AttributeValues = BTreeMap<String, serde_json::Value>;

/// One tag invocation on an extension proxy, e.g. `maven.artifact(...)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub tag_name: String,
    #[serde(default)]
    pub attribute_values: AttributeValues,
    #[serde(default)]
    pub dev_dependency: bool,
    pub location: Location,
}

impl Tag {
    pub fn new(tag_name: impl Into<String>, location: Location) -> Self {
        Self {
            tag_name: tag_name.into(),
            attribute_values: AttributeValues::new(),
            dev_dependency: false,
            location,
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attribute_values.insert(name.into(), value.into());
        self
    }

    pub fn dev(mut self) -> Self {
        self.dev_dependency = true;
        self
    }
}

/// Everything a single module declares about one extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleExtensionUsage {
    pub extension_id: ModuleExtensionId,
    pub location: Location,
    /// Local repository name to the name the extension exports
    #[serde(default)]
    pub imports: BTreeMap<String, String>,
    /// Local names imported only as dev dependencies
    #[serde(default)]
    pub dev_imports: BTreeSet<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl ModuleExtensionUsage {
    pub fn new(extension_id: ModuleExtensionId, location: Location) -> Self {
        Self {
            extension_id,
            location,
            imports: BTreeMap::new(),
            dev_imports: BTreeSet::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_import(mut self, local: impl Into<String>, exported: impl Into<String>) -> Self {
        self.imports.insert(local.into(), exported.into());
        self
    }

    pub fn with_dev_import(mut self, local: impl Into<String>, exported: impl Into<String>) -> Self {
        let local = local.into();
        self.dev_imports.insert(local.clone());
        self.imports.insert(local, exported.into());
        self
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// Exported names imported as regular dependencies
    pub fn non_dev_exports(&self) -> BTreeSet<&str> {
        self.imports
            .iter()
            .filter(|(local, _)| !self.dev_imports.contains(*local))
            .map(|(_, exported)| exported.as_str())
            .collect()
    }

    /// Exported names imported as dev dependencies
    pub fn dev_exports(&self) -> BTreeSet<&str> {
        self.imports
            .iter()
            .filter(|(local, _)| self.dev_imports.contains(*local))
            .map(|(_, exported)| exported.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Label;

    #[test]
    fn test_dev_and_non_dev_exports() {
        let id = ModuleExtensionId::new(Label::parse_canonical("//:ext.bzl").unwrap(), "ext");
        let usage = ModuleExtensionUsage::new(id, Location::new("MODULE.bazel", 1, 1))
            .with_import("a", "repo_a")
            .with_dev_import("b", "repo_b");

        assert_eq!(usage.non_dev_exports().into_iter().collect::<Vec<_>>(), vec!["repo_a"]);
        assert_eq!(usage.dev_exports().into_iter().collect::<Vec<_>>(), vec!["repo_b"]);
    }
}
