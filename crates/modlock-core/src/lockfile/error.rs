use crate::model::{ModuleExtensionId, UsageError};
use crate::validate::UnresolvedImports;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockfileError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupted lockfile {}: {reason}", .path.display())]
    Corrupted { path: PathBuf, reason: String },

    #[error("Lockfile version mismatch in {}: expected {expected}, found {found}; delete the file and resolve again to regenerate it", .path.display())]
    VersionMismatch {
        path: PathBuf,
        expected: u32,
        found: u64,
    },

    #[error("Invalid module dependency graph in lockfile: {0}")]
    DependencyGraph(#[from] UsageError),

    #[error("Lockfile entry for module extension '{extension_id}' is invalid: {source}")]
    UnresolvedImports {
        extension_id: ModuleExtensionId,
        source: UnresolvedImports,
    },
}

pub type Result<T> = std::result::Result<T, LockfileError>;
