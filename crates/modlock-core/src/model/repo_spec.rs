use super::usage::AttributeValues;
use serde::{Deserialize, Serialize};

/// Instructions to materialise one repository: which rule to run and with what attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bzl_file: Option<String>,
    pub rule_class_name: String,
    #[serde(default)]
    pub attributes: AttributeValues,
}

impl RepoSpec {
    /// Spec for a native rule
    pub fn new(rule_class_name: impl Into<String>) -> Self {
        Self {
            bzl_file: None,
            rule_class_name: rule_class_name.into(),
            attributes: AttributeValues::new(),
        }
    }

    /// Spec for a rule defined in a script file
    pub fn from_bzl(bzl_file: impl Into<String>, rule_class_name: impl Into<String>) -> Self {
        Self {
            bzl_file: Some(bzl_file.into()),
            ..Self::new(rule_class_name)
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// Check a user-provided repository name
pub fn validate_repo_name(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(format!(
            "invalid user-provided repo name '{}': valid names may contain only A-Z, a-z, 0-9, '-', '_' and '.', and must start with a letter",
            name
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_shape() {
        let spec = RepoSpec::from_bzl("@bazel_tools//tools/build_defs/repo:http.bzl", "http_archive")
            .with_attr("url", "https://example.com/a.zip");
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["ruleClassName"], "http_archive");
        assert_eq!(json["attributes"]["url"], "https://example.com/a.zip");

        let native = serde_json::to_value(RepoSpec::new("local_repository")).unwrap();
        assert!(native.get("bzlFile").is_none());
    }

    #[test]
    fn test_validate_repo_name() {
        assert!(validate_repo_name("com_google_guava").is_ok());
        assert!(validate_repo_name("a.b-c").is_ok());
        assert!(validate_repo_name("").is_err());
        assert!(validate_repo_name("_hidden").is_err());
        assert!(validate_repo_name("bad name").is_err());
        assert!(validate_repo_name("a~b").is_err());
    }
}
