use crate::lockfile::{ResolutionFlags, LOCK_FILE_NAME};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Default configuration file name in the workspace root
pub const CONFIG_FILE_NAME: &str = "modlock.json";

/// Default directory for extension working directories, relative to the workspace root
pub const DEFAULT_OUTPUT_BASE: &str = ".modlock";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// How the lockfile takes part in a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockfileMode {
    /// Reuse matching entries, re-evaluate stale ones and write the result back
    #[default]
    #[serde(alias = "refresh")]
    Update,
    /// Reuse matching entries and fail on anything stale; never write
    #[serde(alias = "verify")]
    Error,
    /// Ignore the lockfile entirely
    #[serde(alias = "disabled")]
    Off,
}

impl FromStr for LockfileMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "update" | "refresh" => Ok(LockfileMode::Update),
            "error" | "verify" => Ok(LockfileMode::Error),
            "off" | "disabled" => Ok(LockfileMode::Off),
            other => Err(ConfigError::InvalidValue {
                field: "lockfileMode",
                reason: format!("'{}' is not one of update, error, off", other),
            }),
        }
    }
}

impl fmt::Display for LockfileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LockfileMode::Update => "update",
            LockfileMode::Error => "error",
            LockfileMode::Off => "off",
        })
    }
}

/// Options that control extension resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverOptions {
    /// Lockfile participation (default: update)
    #[serde(default)]
    pub lockfile_mode: LockfileMode,

    /// Lockfile name relative to the workspace root (default: MODULE.lock)
    #[serde(default = "default_lockfile_name")]
    pub lockfile_name: String,

    /// Directory that holds extension working directories
    #[serde(default)]
    pub output_base: Option<String>,

    /// Factor applied to timeouts requested by extensions (default: 1.0)
    #[serde(default = "default_timeout_scaling")]
    pub timeout_scaling: f64,

    /// Evaluation rounds allowed before pending extensions are reported as stuck (default: 16)
    #[serde(default = "default_max_restarts")]
    pub max_restarts: usize,

    /// Pretty-print diagnostics (default: true)
    #[serde(default = "default_true")]
    pub pretty: bool,
}

fn default_lockfile_name() -> String {
    LOCK_FILE_NAME.to_string()
}

fn default_timeout_scaling() -> f64 {
    1.0
}

fn default_max_restarts() -> usize {
    16
}

fn default_true() -> bool {
    true
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            lockfile_mode: LockfileMode::default(),
            lockfile_name: default_lockfile_name(),
            output_base: None,
            timeout_scaling: default_timeout_scaling(),
            max_restarts: default_max_restarts(),
            pretty: true,
        }
    }
}

impl ResolverOptions {
    pub fn lockfile_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(&self.lockfile_name)
    }

    /// Output base, resolved against the workspace root when relative
    pub fn output_base_path(&self, workspace_root: &Path) -> PathBuf {
        match &self.output_base {
            Some(dir) => workspace_root.join(dir),
            None => workspace_root.join(DEFAULT_OUTPUT_BASE),
        }
    }
}

/// Values given on the command line, applied over the file configuration
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub lockfile_mode: Option<LockfileMode>,
    pub lockfile_name: Option<String>,
    pub output_base: Option<String>,
    pub timeout_scaling: Option<f64>,
    pub max_restarts: Option<usize>,
}

/// Main resolver configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverConfig {
    #[serde(default)]
    pub resolver_options: ResolverOptions,

    /// Flag values recorded in the lockfile
    #[serde(default)]
    pub flags: ResolutionFlags,
}

impl ResolverConfig {
    /// Load configuration from a JSON or YAML file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ResolverConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration and write it to a file
    pub fn init_file(path: &Path) -> Result<(), ConfigError> {
        let mut json = serde_json::to_string_pretty(&ResolverConfig::default())?;
        json.push('\n');
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Merge CLI overrides into this configuration
    pub fn merge(&mut self, overrides: &CliOverrides) -> Result<(), ConfigError> {
        let options = &mut self.resolver_options;
        if let Some(mode) = overrides.lockfile_mode {
            options.lockfile_mode = mode;
        }
        if let Some(name) = &overrides.lockfile_name {
            options.lockfile_name = name.clone();
        }
        if let Some(dir) = &overrides.output_base {
            options.output_base = Some(dir.clone());
        }
        if let Some(scaling) = overrides.timeout_scaling {
            options.timeout_scaling = scaling;
        }
        if let Some(rounds) = overrides.max_restarts {
            options.max_restarts = rounds;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let options = &self.resolver_options;
        if !(options.timeout_scaling.is_finite() && options.timeout_scaling > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "timeoutScaling",
                reason: format!("must be a positive number, got {}", options.timeout_scaling),
            });
        }
        if options.lockfile_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "lockfileName",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ResolverConfig::default();
        assert_eq!(config.resolver_options.lockfile_mode, LockfileMode::Update);
        assert_eq!(config.resolver_options.lockfile_name, "MODULE.lock");
        assert_eq!(config.resolver_options.timeout_scaling, 1.0);
    }

    #[test]
    fn test_mode_aliases() {
        assert_eq!("refresh".parse::<LockfileMode>().unwrap(), LockfileMode::Update);
        assert_eq!("VERIFY".parse::<LockfileMode>().unwrap(), LockfileMode::Error);
        assert_eq!("disabled".parse::<LockfileMode>().unwrap(), LockfileMode::Off);
        assert!("sometimes".parse::<LockfileMode>().is_err());

        let options: ResolverOptions = serde_json::from_str(r#"{"lockfileMode": "verify"}"#).unwrap();
        assert_eq!(options.lockfile_mode, LockfileMode::Error);
    }

    #[test]
    fn test_deserialize_config() {
        let json = r#"{
            "resolverOptions": {
                "lockfileMode": "off",
                "timeoutScaling": 2.5
            },
            "flags": { "ignoreDevDependency": true }
        }"#;
        let config: ResolverConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.resolver_options.lockfile_mode, LockfileMode::Off);
        assert_eq!(config.resolver_options.timeout_scaling, 2.5);
        assert_eq!(config.resolver_options.max_restarts, 16);
        assert!(config.flags.ignore_dev_dependency);
    }

    #[test]
    fn test_yaml_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("modlock.yaml");
        std::fs::write(&path, "resolverOptions:\n  lockfileMode: error\n  maxRestarts: 3\n").unwrap();

        let config = ResolverConfig::from_file(&path).unwrap();
        assert_eq!(config.resolver_options.lockfile_mode, LockfileMode::Error);
        assert_eq!(config.resolver_options.max_restarts, 3);
    }

    #[test]
    fn test_init_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        ResolverConfig::init_file(&path).unwrap();
        assert_eq!(ResolverConfig::from_file(&path).unwrap(), ResolverConfig::default());
    }

    #[test]
    fn test_merge_overrides() {
        let mut config = ResolverConfig::default();
        config
            .merge(&CliOverrides {
                lockfile_mode: Some(LockfileMode::Off),
                output_base: Some("out".to_string()),
                ..CliOverrides::default()
            })
            .unwrap();
        assert_eq!(config.resolver_options.lockfile_mode, LockfileMode::Off);
        assert_eq!(
            config.resolver_options.output_base_path(Path::new("/ws")),
            PathBuf::from("/ws/out")
        );

        let err = config.merge(&CliOverrides {
            timeout_scaling: Some(0.0),
            ..CliOverrides::default()
        });
        assert!(err.is_err());
    }
}
