//! Identity of modules, module extensions and their usages.

mod extension_id;
mod label;
mod module;
mod module_key;
mod repo_spec;
mod usage;
mod usages;
mod version;

pub use extension_id::{ExtensionIdParseError, ModuleExtensionId};
pub use label::{Label, LabelError, SCRIPT_EXTENSION};
pub use module::{AbridgedModule, Module, RepoMapping};
pub use module_key::{ModuleKey, ModuleKeyParseError, MAIN_REPO_NAME};
pub use repo_spec::{validate_repo_name, RepoSpec};
pub use usage::{AttributeValues, ModuleExtensionUsage, Tag};
pub use usages::{
    extension_usages_by_id, unique_extension_names, ExtensionUsageIndex, SingleExtensionUsages,
    UsageError, UsagesById,
};
pub use version::{Version, VersionParseError};
