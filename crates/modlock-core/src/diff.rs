//! Human-readable reasons a locked extension result is out of date.

use crate::digest::TransitiveDigest;
use crate::lockfile::{LockFileModuleExtension, Lockfile};
use crate::model::{ModuleExtensionId, ModuleExtensionUsage, ModuleKey};
use std::collections::{BTreeMap, BTreeSet};

/// Explain how the current state of an extension differs from its lockfile entry
///
/// Reasons are ordered: a missing entry or changed implementation first,
/// then per-module usage changes in module order.
pub fn module_extension_diff(
    extension_id: &ModuleExtensionId,
    locked: Option<&LockFileModuleExtension>,
    locked_usages: &BTreeMap<ModuleKey, ModuleExtensionUsage>,
    digest: &TransitiveDigest,
    usages: &BTreeMap<ModuleKey, ModuleExtensionUsage>,
) -> Vec<String> {
    let mut reasons = Vec::new();

    match locked {
        None => reasons.push(format!(
            "the module extension '{}' does not exist in the lockfile",
            extension_id
        )),
        Some(entry) if entry.transitive_digest != *digest => reasons.push(format!(
            "the implementation of the extension '{}' or one of its transitive .bzl files has changed ({} -> {})",
            extension_id,
            entry.transitive_digest.short(),
            digest.short()
        )),
        Some(_) => {}
    }

    let modules: BTreeSet<&ModuleKey> = locked_usages.keys().chain(usages.keys()).collect();
    for module in modules {
        match (locked_usages.get(module), usages.get(module)) {
            (None, Some(_)) => reasons.push(format!(
                "module {} started using the extension '{}'",
                module, extension_id
            )),
            (Some(_), None) => reasons.push(format!(
                "module {} no longer uses the extension '{}'",
                module, extension_id
            )),
            (Some(old), Some(new)) if old != new => usage_diff(module, old, new, &mut reasons),
            _ => {}
        }
    }

    reasons
}

/// Explain how `new` differs from `old`, reading `new` as the current state
///
/// Covers the module inputs and flags, then every extension recorded in either file.
pub fn lockfile_diff(old: &Lockfile, new: &Lockfile) -> crate::lockfile::Result<Vec<String>> {
    let mut reasons = old.module_and_flags_diff(&new.inputs());
    let mut old_usages = old.extension_usages_by_id()?;
    let mut new_usages = new.extension_usages_by_id()?;

    let ids: BTreeSet<&ModuleExtensionId> = old
        .module_extensions
        .keys()
        .chain(new.module_extensions.keys())
        .collect();
    for id in ids {
        let locked_usages = old_usages.remove(id).unwrap_or_default();
        let usages = new_usages.remove(id).unwrap_or_default();
        match new.module_extensions.get(id) {
            Some(entry) => reasons.extend(module_extension_diff(
                id,
                old.module_extensions.get(id),
                &locked_usages,
                &entry.transitive_digest,
                &usages,
            )),
            None => reasons.push(format!("the module extension '{}' is no longer in the lockfile", id)),
        }
    }

    Ok(reasons)
}

fn usage_diff(
    module: &ModuleKey,
    old: &ModuleExtensionUsage,
    new: &ModuleExtensionUsage,
    reasons: &mut Vec<String>,
) {
    let before = reasons.len();

    let locals: BTreeSet<&String> = old.imports.keys().chain(new.imports.keys()).collect();
    for local in locals {
        match (old.imports.get(local), new.imports.get(local)) {
            (None, Some(exported)) => reasons.push(format!(
                "module {} now imports the repository '{}' as '{}'",
                module, exported, local
            )),
            (Some(exported), None) => reasons.push(format!(
                "module {} no longer imports the repository '{}' as '{}'",
                module, exported, local
            )),
            (Some(was), Some(now)) if was != now => reasons.push(format!(
                "module {} imports the repository '{}' as '{}' instead of '{}'",
                module, now, local, was
            )),
            _ => {}
        }
    }

    for local in new.dev_imports.difference(&old.dev_imports) {
        reasons.push(format!(
            "module {} now imports '{}' as a dev dependency",
            module, local
        ));
    }
    for local in old.dev_imports.difference(&new.dev_imports) {
        reasons.push(format!(
            "module {} no longer imports '{}' as a dev dependency",
            module, local
        ));
    }

    let tag_count = old.tags.len().max(new.tags.len());
    for i in 0..tag_count {
        match (old.tags.get(i), new.tags.get(i)) {
            (None, Some(tag)) => reasons.push(format!(
                "module {} added the tag '{}' at {}",
                module, tag.tag_name, tag.location
            )),
            (Some(tag), None) => reasons.push(format!(
                "module {} removed the tag '{}' (was at {})",
                module, tag.tag_name, tag.location
            )),
            (Some(was), Some(now)) if was.tag_name != now.tag_name => reasons.push(format!(
                "module {} replaced the tag '{}' with '{}' at {}",
                module, was.tag_name, now.tag_name, now.location
            )),
            (Some(was), Some(now)) if was != now => reasons.push(format!(
                "the tag '{}' at {} in module {} has been modified",
                now.tag_name, now.location, module
            )),
            _ => {}
        }
    }

    if reasons.len() == before {
        if old.location != new.location {
            reasons.push(format!(
                "the usage in module {} moved from {} to {}",
                module, old.location, new.location
            ));
        } else {
            reasons.push(format!("the usage in module {} has changed", module));
        }
    }
}
