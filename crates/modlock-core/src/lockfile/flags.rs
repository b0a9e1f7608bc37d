use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Strictness of a dependency-graph check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMode {
    Off,
    #[default]
    Warning,
    Error,
}

impl fmt::Display for CheckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckMode::Off => "off",
            CheckMode::Warning => "warning",
            CheckMode::Error => "error",
        })
    }
}

/// Resolution flags whose values are recorded in the lockfile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionFlags {
    #[serde(default)]
    pub cmd_registries: Vec<String>,
    #[serde(default)]
    pub cmd_module_overrides: BTreeMap<String, String>,
    #[serde(default)]
    pub allowed_yanked_versions: Vec<String>,
    #[serde(default)]
    pub env_var_allowed_yanked_versions: String,
    #[serde(default)]
    pub ignore_dev_dependency: bool,
    #[serde(default)]
    pub direct_dependencies_mode: CheckMode,
    #[serde(default = "default_compatibility_mode")]
    pub compatibility_mode: CheckMode,
}

fn default_compatibility_mode() -> CheckMode {
    CheckMode::Error
}

impl Default for ResolutionFlags {
    fn default() -> Self {
        Self {
            cmd_registries: Vec::new(),
            cmd_module_overrides: BTreeMap::new(),
            allowed_yanked_versions: Vec::new(),
            env_var_allowed_yanked_versions: String::new(),
            ignore_dev_dependency: false,
            direct_dependencies_mode: CheckMode::default(),
            compatibility_mode: default_compatibility_mode(),
        }
    }
}

impl ResolutionFlags {
    /// Describe every flag whose value differs between `self` (locked) and `current`
    pub fn diff(&self, current: &ResolutionFlags) -> Vec<String> {
        let mut reasons = Vec::new();
        let mut changed = |differs: bool, what: &str| {
            if differs {
                reasons.push(format!("the value of {} has been modified", what));
            }
        };

        changed(self.cmd_registries != current.cmd_registries, "--registry flag");
        changed(
            self.cmd_module_overrides != current.cmd_module_overrides,
            "--override_module flag",
        );
        changed(
            self.allowed_yanked_versions != current.allowed_yanked_versions,
            "--allow_yanked_versions flag",
        );
        changed(
            self.env_var_allowed_yanked_versions != current.env_var_allowed_yanked_versions,
            "the allowed-yanked-versions environment variable",
        );
        changed(
            self.ignore_dev_dependency != current.ignore_dev_dependency,
            "--ignore_dev_dependency flag",
        );
        changed(
            self.direct_dependencies_mode != current.direct_dependencies_mode,
            "--check_direct_dependencies flag",
        );
        changed(
            self.compatibility_mode != current.compatibility_mode,
            "--check_compatibility flag",
        );

        reasons
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let flags = ResolutionFlags::default();
        assert_eq!(flags.direct_dependencies_mode, CheckMode::Warning);
        assert_eq!(flags.compatibility_mode, CheckMode::Error);
    }

    #[test]
    fn test_diff_reports_each_changed_flag() {
        let locked = ResolutionFlags::default();
        let current = ResolutionFlags {
            direct_dependencies_mode: CheckMode::Error,
            ignore_dev_dependency: true,
            ..ResolutionFlags::default()
        };
        assert_eq!(
            locked.diff(&current),
            vec![
                "the value of --ignore_dev_dependency flag has been modified",
                "the value of --check_direct_dependencies flag has been modified",
            ]
        );
        assert!(locked.diff(&locked.clone()).is_empty());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let flags: ResolutionFlags = serde_json::from_str("{}").unwrap();
        assert_eq!(flags, ResolutionFlags::default());
    }
}
