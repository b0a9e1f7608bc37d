use super::label::{Label, LabelError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const SEPARATOR: char = '%';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtensionIdParseError {
    #[error("invalid module extension id '{0}': expected '<label>%<name>'")]
    Malformed(String),
    #[error("invalid module extension id '{input}': '{name}' is not a valid identifier")]
    InvalidName { input: String, name: String },
    #[error(transparent)]
    Label(#[from] LabelError),
}

/// Identity of a module extension: the script that defines it, the exported
/// name, and an optional isolation key for isolated usages
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleExtensionId {
    bzl_file_label: Label,
    extension_name: String,
    isolation_key: Option<String>,
}

impl ModuleExtensionId {
    pub fn new(bzl_file_label: Label, extension_name: impl Into<String>) -> Self {
        Self {
            bzl_file_label,
            extension_name: extension_name.into(),
            isolation_key: None,
        }
    }

    pub fn with_isolation_key(mut self, key: impl Into<String>) -> Self {
        self.isolation_key = Some(key.into());
        self
    }

    pub fn bzl_file_label(&self) -> &Label {
        &self.bzl_file_label
    }

    pub fn extension_name(&self) -> &str {
        &self.extension_name
    }

    pub fn isolation_key(&self) -> Option<&str> {
        self.isolation_key.as_deref()
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

impl fmt::Display for ModuleExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.bzl_file_label, SEPARATOR, self.extension_name)?;
        if let Some(key) = &self.isolation_key {
            write!(f, "{}{}", SEPARATOR, key)?;
        }
        Ok(())
    }
}

impl FromStr for ModuleExtensionId {
    type Err = ExtensionIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, SEPARATOR);
        let (Some(label), Some(name)) = (parts.next(), parts.next()) else {
            return Err(ExtensionIdParseError::Malformed(s.to_string()));
        };
        if !is_identifier(name) {
            return Err(ExtensionIdParseError::InvalidName {
                input: s.to_string(),
                name: name.to_string(),
            });
        }
        let mut id = Self::new(Label::parse_canonical(label)?, name);
        match parts.next() {
            Some("") => return Err(ExtensionIdParseError::Malformed(s.to_string())),
            Some(key) => id = id.with_isolation_key(key),
            None => {}
        }
        Ok(id)
    }
}

impl TryFrom<String> for ModuleExtensionId {
    type Error = ExtensionIdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModuleExtensionId> for String {
    fn from(id: ModuleExtensionId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_form() {
        let id = ModuleExtensionId::new(Label::parse_canonical("@foo//:ext.bzl").unwrap(), "maven");
        assert_eq!(id.to_string(), "@foo//:ext.bzl%maven");
        assert_eq!(id.to_string().parse::<ModuleExtensionId>().unwrap(), id);
    }

    #[test]
    fn test_isolation_key() {
        let id: ModuleExtensionId = "//:ext.bzl%maven%iso1".parse().unwrap();
        assert_eq!(id.isolation_key(), Some("iso1"));
        assert_eq!(id.extension_name(), "maven");
    }

    #[test]
    fn test_rejects_malformed_ids() {
        assert!("//:ext.bzl".parse::<ModuleExtensionId>().is_err());
        assert!("//:ext.bzl%1abc".parse::<ModuleExtensionId>().is_err());
        assert!("//:ext.bzl%maven%".parse::<ModuleExtensionId>().is_err());
        assert!("ext.bzl%maven".parse::<ModuleExtensionId>().is_err());
    }
}
