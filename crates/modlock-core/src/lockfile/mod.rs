//! Lockfile for module extension results
//!
//! The lockfile records the inputs of dependency resolution together with
//! the repositories every used module extension generated, so later runs can
//! reuse those results instead of evaluating the extension again.

mod error;
mod flags;
mod module_diff;
mod store;
mod updater;
mod value;

pub use error::{LockfileError, Result};
pub use flags::{CheckMode, ResolutionFlags};
pub use store::LockfileStore;
pub use updater::{ExtensionResolution, LockfileUpdater};
pub use value::{LockFileModuleExtension, Lockfile, ResolutionInputs};

/// Lockfile format version - increment when the lockfile structure changes
pub const LOCK_FILE_VERSION: u32 = 1;

/// Default lockfile name, next to the root module file
pub const LOCK_FILE_NAME: &str = "MODULE.lock";
