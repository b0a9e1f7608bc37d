use super::version::{Version, VersionParseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Canonical repository name of the main workspace
pub const MAIN_REPO_NAME: &str = "_main";

const ROOT_KEY_TEXT: &str = "<root>";
const EMPTY_VERSION_TEXT: &str = "_";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleKeyParseError {
    #[error("invalid module key '{0}': expected 'name@version' or '<root>'")]
    Malformed(String),
    #[error("invalid module key '{input}': module name is empty")]
    EmptyName { input: String },
    #[error("invalid module key '{input}': {source}")]
    Version {
        input: String,
        source: VersionParseError,
    },
}

/// Identity of a module in the dependency graph
///
/// Ordering puts the root module first, then modules by name and version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleKey {
    name: String,
    version: Version,
}

impl ModuleKey {
    pub const ROOT: ModuleKey = ModuleKey {
        name: String::new(),
        version: Version::EMPTY,
    };

    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn is_root(&self) -> bool {
        self.name.is_empty() && self.version.is_empty()
    }

    /// Name under which the module's repository is materialised
    pub fn canonical_repo_name(&self) -> String {
        if self.is_root() {
            MAIN_REPO_NAME.to_string()
        } else {
            format!("{}~{}", self.name, self.version)
        }
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str(ROOT_KEY_TEXT)
        } else if self.version.is_empty() {
            write!(f, "{}@{}", self.name, EMPTY_VERSION_TEXT)
        } else {
            write!(f, "{}@{}", self.name, self.version)
        }
    }
}

impl FromStr for ModuleKey {
    type Err = ModuleKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ROOT_KEY_TEXT {
            return Ok(Self::ROOT);
        }
        let (name, version) = s
            .split_once('@')
            .ok_or_else(|| ModuleKeyParseError::Malformed(s.to_string()))?;
        if name.is_empty() {
            return Err(ModuleKeyParseError::EmptyName {
                input: s.to_string(),
            });
        }
        let version = if version == EMPTY_VERSION_TEXT {
            Version::EMPTY
        } else {
            Version::parse(version).map_err(|source| ModuleKeyParseError::Version {
                input: s.to_string(),
                source,
            })?
        };
        Ok(Self::new(name, version))
    }
}

impl TryFrom<String> for ModuleKey {
    type Error = ModuleKeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModuleKey> for String {
    fn from(key: ModuleKey) -> Self {
        key.to_string()
    }
}
