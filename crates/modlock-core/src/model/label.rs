use super::module_key::MAIN_REPO_NAME;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// File extension required for scripts that may define module extensions
pub const SCRIPT_EXTENSION: &str = ".bzl";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid label '{input}': {reason}")]
pub struct LabelError {
    pub input: String,
    pub reason: String,
}

impl LabelError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Canonical label of a file: `@repo//package:name`, or `//package:name` in the main repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Label {
    repo: String,
    package: String,
    name: String,
}

impl Label {
    /// Parse a label already in canonical form
    ///
    /// Apparent repository names are not resolved here; `@foo` and `@@foo`
    /// both name the canonical repository `foo`.
    pub fn parse_canonical(input: &str) -> Result<Self, LabelError> {
        let (repo, rest) = if let Some(stripped) = input.strip_prefix('@') {
            let stripped = stripped.strip_prefix('@').unwrap_or(stripped);
            let split = stripped
                .find("//")
                .ok_or_else(|| LabelError::new(input, "expected '//' after the repository name"))?;
            (&stripped[..split], &stripped[split..])
        } else {
            ("", input)
        };

        let body = rest
            .strip_prefix("//")
            .ok_or_else(|| LabelError::new(input, "label must start with '//' or '@'"))?;

        let (package, name) = match body.split_once(':') {
            Some((package, name)) => (package, name),
            None => (body, body.rsplit('/').next().unwrap_or(body)),
        };

        validate_repo(input, repo)?;
        validate_package(input, package)?;
        validate_target_name(input, name)?;

        Ok(Self {
            repo: repo.to_string(),
            package: package.to_string(),
            name: name.to_string(),
        })
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_main_repo(&self) -> bool {
        self.repo.is_empty()
    }

    /// Repository name used when deriving names from this label
    pub fn repo_display_name(&self) -> &str {
        if self.is_main_repo() {
            MAIN_REPO_NAME
        } else {
            &self.repo
        }
    }

    /// Ensure the label names a file that module extensions can be loaded from
    pub fn check_loadable(&self) -> Result<(), LabelError> {
        if self.name.ends_with(SCRIPT_EXTENSION) {
            Ok(())
        } else {
            Err(LabelError::new(
                &self.to_string(),
                format!("the label must reference a file with extension '{}'", SCRIPT_EXTENSION),
            ))
        }
    }
}

fn validate_repo(input: &str, repo: &str) -> Result<(), LabelError> {
    if let Some(c) = repo
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '~' | '+')))
    {
        return Err(LabelError::new(
            input,
            format!("invalid character '{}' in repository name", c),
        ));
    }
    Ok(())
}

fn validate_package(input: &str, package: &str) -> Result<(), LabelError> {
    if package.is_empty() {
        return Ok(());
    }
    if package.starts_with('/') || package.ends_with('/') {
        return Err(LabelError::new(input, "package name may not start or end with '/'"));
    }
    validate_path_segments(input, package, "package name")
}

fn validate_target_name(input: &str, name: &str) -> Result<(), LabelError> {
    if name.is_empty() {
        return Err(LabelError::new(input, "empty target name"));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(LabelError::new(input, "target name may not start or end with '/'"));
    }
    validate_path_segments(input, name, "target name")
}

fn validate_path_segments(input: &str, path: &str, what: &str) -> Result<(), LabelError> {
    for segment in path.split('/') {
        match segment {
            "" => return Err(LabelError::new(input, format!("{} contains '//'", what))),
            "." | ".." => {
                return Err(LabelError::new(
                    input,
                    format!("{} contains an up-level or current-directory reference", what),
                ))
            }
            _ => {}
        }
        if segment.chars().any(|c| c.is_whitespace() || matches!(c, ':' | '@')) {
            return Err(LabelError::new(input, format!("{} contains an invalid character", what)));
        }
    }
    Ok(())
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.repo.is_empty() {
            write!(f, "@{}", self.repo)?;
        }
        write!(f, "//{}:{}", self.package, self.name)
    }
}

impl FromStr for Label {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_canonical(s)
    }
}

impl TryFrom<String> for Label {
    type Error = LabelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_canonical(&value)
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        label.to_string()
    }
}
