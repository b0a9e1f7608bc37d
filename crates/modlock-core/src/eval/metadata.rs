use super::error::ExtensionError;
use super::implementation::ScriptError;
use crate::diagnostics::{Diagnostic, DiagnosticHandler};
use crate::model::{ModuleKey, RepoSpec, SingleExtensionUsages};
use std::collections::{BTreeMap, BTreeSet};

/// Which repositories the root module is expected to import
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DirectDeps {
    #[default]
    Unspecified,
    /// Every generated repository not claimed by the other list
    All,
    Names(BTreeSet<String>),
}

/// Metadata an extension may return about the repositories it generated
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtensionMetadata {
    root_module_direct_deps: DirectDeps,
    root_module_direct_dev_deps: DirectDeps,
}

impl ExtensionMetadata {
    pub fn new(direct_deps: DirectDeps, direct_dev_deps: DirectDeps) -> Result<Self, ScriptError> {
        match (&direct_deps, &direct_dev_deps) {
            (DirectDeps::Unspecified, DirectDeps::Unspecified) => {}
            (DirectDeps::Unspecified, _) | (_, DirectDeps::Unspecified) => {
                return Err(ScriptError::new(
                    "root_module_direct_deps and root_module_direct_dev_deps must both be specified or both be unspecified",
                ))
            }
            (DirectDeps::All, DirectDeps::All) => {
                return Err(ScriptError::new(
                    "at most one of root_module_direct_deps and root_module_direct_dev_deps can be set to \"all\"",
                ))
            }
            (DirectDeps::Names(direct), DirectDeps::Names(dev)) => {
                let overlap: Vec<&str> = direct.intersection(dev).map(String::as_str).collect();
                if !overlap.is_empty() {
                    return Err(ScriptError::new(format!(
                        "root_module_direct_deps and root_module_direct_dev_deps must be disjoint, but both contain: {}",
                        overlap.join(", ")
                    )));
                }
            }
            _ => {}
        }

        Ok(Self {
            root_module_direct_deps: direct_deps,
            root_module_direct_dev_deps: direct_dev_deps,
        })
    }

    pub fn is_specified(&self) -> bool {
        self.root_module_direct_deps != DirectDeps::Unspecified
    }

    /// Check the metadata against the generated repositories and the root module's imports
    ///
    /// Naming a repository that was not generated is an error. Mismatches with
    /// the root module's imports are only reported as warnings.
    pub fn evaluate(
        &self,
        usages: &SingleExtensionUsages,
        generated: &BTreeMap<String, RepoSpec>,
        handler: &dyn DiagnosticHandler,
    ) -> Result<(), ExtensionError> {
        if !self.is_specified() {
            return Ok(());
        }

        let direct = resolve(&self.root_module_direct_deps, &self.root_module_direct_dev_deps, generated);
        let dev = resolve(&self.root_module_direct_dev_deps, &self.root_module_direct_deps, generated);

        let unknown: Vec<&str> = direct
            .union(&dev)
            .filter(|name| !generated.contains_key(**name))
            .copied()
            .collect();
        if !unknown.is_empty() {
            let id = &usages.extension_id;
            return Err(ExtensionError::InvalidMetadata {
                name: id.extension_name().to_string(),
                label: id.bzl_file_label().clone(),
                message: format!(
                    "root_module_direct_deps and root_module_direct_dev_deps contain repositories not generated by the extension: {}",
                    unknown.join(", ")
                ),
            });
        }

        let Some(root_usage) = usages.usage(&ModuleKey::ROOT) else {
            return Ok(());
        };
        let imported = root_usage.non_dev_exports();
        let imported_dev = root_usage.dev_exports();

        let mut sections = Vec::new();
        push_section(
            &mut sections,
            "Not imported, but reported as direct dependencies by the extension (may cause the build to fail)",
            direct.difference(&imported),
        );
        push_section(
            &mut sections,
            "Not imported, but reported as direct dev dependencies by the extension (may cause the build to fail)",
            dev.difference(&imported_dev),
        );
        push_section(
            &mut sections,
            "Imported as a regular dependency, but reported as a dev dependency by the extension",
            imported.intersection(&dev),
        );
        push_section(
            &mut sections,
            "Imported as a dev dependency, but reported as a regular dependency by the extension",
            imported_dev.intersection(&direct),
        );
        let all: BTreeSet<&str> = direct.union(&dev).copied().collect();
        push_section(
            &mut sections,
            "Imported, but reported as indirect dependencies by the extension",
            imported.union(&imported_dev).filter(|name| !all.contains(*name)),
        );

        if !sections.is_empty() {
            let id = &usages.extension_id;
            let message = format!(
                "The module extension {} defined in {} reported incorrect imports of repositories via use_repo():\n\n{}",
                id.extension_name(),
                id.bzl_file_label(),
                sections.join("\n\n")
            );
            handler.report(Diagnostic::warning(message).at(root_usage.location.clone()));
        }

        Ok(())
    }
}

fn resolve<'a>(
    deps: &'a DirectDeps,
    other: &'a DirectDeps,
    generated: &'a BTreeMap<String, RepoSpec>,
) -> BTreeSet<&'a str> {
    match deps {
        DirectDeps::Unspecified => BTreeSet::new(),
        DirectDeps::Names(names) => names.iter().map(String::as_str).collect(),
        DirectDeps::All => {
            let claimed: BTreeSet<&str> = match other {
                DirectDeps::Names(names) => names.iter().map(String::as_str).collect(),
                _ => BTreeSet::new(),
            };
            generated
                .keys()
                .map(String::as_str)
                .filter(|name| !claimed.contains(name))
                .collect()
        }
    }
}

fn push_section<'a, 'b: 'a>(
    sections: &mut Vec<String>,
    heading: &str,
    names: impl Iterator<Item = &'a &'b str>,
) {
    let names: Vec<&str> = names.copied().collect();
    if !names.is_empty() {
        sections.push(format!("{}:\n    {}", heading, names.join(", ")));
    }
}
