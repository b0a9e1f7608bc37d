//! Checks that every repository imported from an extension is actually generated by it.

use crate::location::Location;
use crate::model::{ModuleExtensionId, ModuleExtensionUsage};
use crate::spelling::did_you_mean;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// A usage imports a repository the extension did not generate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("module extension \"{extension_name}\" from \"{bzl_file}\" does not generate repository \"{exported_name}\", yet it is imported as \"{local_name}\" in the usage at {location}{suggestion}")]
pub struct UnresolvedImport {
    pub extension_name: String,
    pub bzl_file: String,
    pub exported_name: String,
    pub local_name: String,
    pub location: Location,
    pub suggestion: String,
}

/// Every unresolved import found for one extension, in usage order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedImports(pub Vec<UnresolvedImport>);

impl UnresolvedImports {
    pub fn first(&self) -> Option<&UnresolvedImport> {
        self.0.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnresolvedImport> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for UnresolvedImports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, import) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", import)?;
        }
        Ok(())
    }
}

impl std::error::Error for UnresolvedImports {}

/// Check the imports of every usage against the names an extension generated
pub fn validate_imports<'a, V>(
    extension_id: &ModuleExtensionId,
    generated: &BTreeMap<String, V>,
    usages: impl IntoIterator<Item = &'a ModuleExtensionUsage>,
) -> Result<(), UnresolvedImports> {
    let mut failures = Vec::new();
    for usage in usages {
        for (local_name, exported_name) in &usage.imports {
            if generated.contains_key(exported_name) {
                continue;
            }
            failures.push(UnresolvedImport {
                extension_name: extension_id.extension_name().to_string(),
                bzl_file: extension_id.bzl_file_label().to_string(),
                exported_name: exported_name.clone(),
                local_name: local_name.clone(),
                location: usage.location.clone(),
                suggestion: did_you_mean(exported_name, generated.keys().map(String::as_str)),
            });
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(UnresolvedImports(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Label, RepoSpec};

    fn id() -> ModuleExtensionId {
        ModuleExtensionId::new(Label::parse_canonical("//:ext.bzl").unwrap(), "ext")
    }

    fn generated(names: &[&str]) -> BTreeMap<String, RepoSpec> {
        names
            .iter()
            .map(|name| (name.to_string(), RepoSpec::new("local_repository")))
            .collect()
    }

    #[test]
    fn test_all_imports_resolved() {
        let usage = ModuleExtensionUsage::new(id(), Location::new("MODULE.bazel", 1, 1))
            .with_import("a", "repo_a");
        assert!(validate_imports(&id(), &generated(&["repo_a", "repo_b"]), [&usage]).is_ok());
    }

    #[test]
    fn test_missing_import_with_suggestion() {
        let usage = ModuleExtensionUsage::new(id(), Location::new("/ws/MODULE.bazel", 4, 5))
            .with_import("x", "repo_x")
            .with_import("b", "repo_b");
        let err = validate_imports(&id(), &generated(&["repo_a", "repo_b"]), [&usage]).unwrap_err();

        assert_eq!(err.len(), 1);
        assert_eq!(
            err.to_string(),
            "module extension \"ext\" from \"//:ext.bzl\" does not generate repository \"repo_x\", yet it is imported as \"x\" in the usage at /ws/MODULE.bazel:4:5 (did you mean 'repo_a'?)"
        );
    }

    #[test]
    fn test_all_failures_are_collected() {
        let first = ModuleExtensionUsage::new(id(), Location::new("a/MODULE.bazel", 1, 1))
            .with_import("x", "nope");
        let second = ModuleExtensionUsage::new(id(), Location::new("b/MODULE.bazel", 1, 1))
            .with_dev_import("y", "also_nope");
        let err = validate_imports(&id(), &generated(&[]), [&first, &second]).unwrap_err();

        assert_eq!(err.len(), 2);
        assert_eq!(err.first().map(|f| f.local_name.as_str()), Some("x"));
    }
}
