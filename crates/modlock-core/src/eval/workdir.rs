use rustc_hash::FxHashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Directory under the output base that holds every extension working directory
pub const WORKING_DIRECTORY_ROOT: &str = "modextwd";

/// Private scratch directory of one extension evaluation attempt
///
/// The directory is only created on first use, so attempts that never touch
/// the filesystem leave nothing behind.
#[derive(Debug)]
pub struct WorkingDirectory {
    path: PathBuf,
}

impl WorkingDirectory {
    /// Claim the directory for `unique_name`, removing leftovers of earlier attempts
    pub fn fresh(output_base: &Path, unique_name: &str) -> io::Result<Self> {
        let directory = Self {
            path: output_base.join(WORKING_DIRECTORY_ROOT).join(unique_name),
        };
        if directory.remove()? {
            debug!("Removed stale working directory {}", directory.path.display());
        }
        Ok(directory)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn ensure(&self) -> io::Result<&Path> {
        std::fs::create_dir_all(&self.path)?;
        Ok(&self.path)
    }

    /// Remove the directory and its contents; returns whether anything was removed
    pub fn remove(&self) -> io::Result<bool> {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Working directories of evaluations currently running, for cleanup on cancellation
#[derive(Debug, Default)]
pub struct InFlightDirectories {
    paths: Mutex<FxHashSet<PathBuf>>,
}

impl InFlightDirectories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `path` until the returned guard is dropped
    pub fn register(&self, path: &Path) -> InFlightGuard<'_> {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf());
        InFlightGuard {
            owner: self,
            path: path.to_path_buf(),
        }
    }

    pub fn len(&self) -> usize {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Best-effort removal of every tracked directory; returns how many were removed
    pub fn remove_all(&self) -> usize {
        let paths: Vec<PathBuf> = self
            .paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();

        let mut removed = 0;
        for path in paths {
            match std::fs::remove_dir_all(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove working directory {}: {}", path.display(), e),
            }
        }
        removed
    }
}

pub struct InFlightGuard<'a> {
    owner: &'a InFlightDirectories,
    path: PathBuf,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner
            .paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.path);
    }
}
