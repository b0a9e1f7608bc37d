use super::error::{LockfileError, Result};
use super::value::Lockfile;
use super::LOCK_FILE_NAME;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Reads and writes the lockfile at a fixed path
#[derive(Debug, Clone)]
pub struct LockfileStore {
    path: PathBuf,
}

impl LockfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for the default lockfile name in a workspace
    pub fn in_workspace(workspace_root: &Path) -> Self {
        Self::new(workspace_root.join(LOCK_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load and validate the lockfile, or `None` if there is no file yet
    pub fn load(&self) -> Result<Option<Lockfile>> {
        if !self.exists() {
            info!("No lockfile found at {}", self.path.display());
            return Ok(None);
        }

        let text = std::fs::read_to_string(&self.path).map_err(|source| LockfileError::Io {
            path: self.path.clone(),
            source,
        })?;

        let lockfile = match Lockfile::from_json(&text, &self.path) {
            Ok(lockfile) => lockfile,
            Err(e) => {
                warn!("Failed to load lockfile: {}", e);
                return Err(e);
            }
        };
        lockfile.validate()?;

        info!(
            "Loaded lockfile with {} module extensions",
            lockfile.module_extensions.len()
        );
        Ok(Some(lockfile))
    }

    /// Load the lockfile, falling back to an empty one when there is no file yet
    pub fn load_or_default(&self) -> Result<Lockfile> {
        Ok(self.load()?.unwrap_or_default())
    }

    /// Write the lockfile, replacing any existing file in one step
    pub fn save(&self, lockfile: &Lockfile) -> Result<()> {
        let json = lockfile.to_json()?;
        let io_error = |source| LockfileError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| LOCK_FILE_NAME.to_string());
        let temp_path = self.path.with_file_name(format!(".{}.tmp", file_name));

        std::fs::write(&temp_path, json).map_err(io_error)?;
        if let Err(source) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(io_error(source));
        }

        debug!("Wrote lockfile to {}", self.path.display());
        info!(
            "Saved lockfile with {} module extensions",
            lockfile.module_extensions.len()
        );
        Ok(())
    }
}
