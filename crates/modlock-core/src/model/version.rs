use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version '{input}': {reason}")]
pub struct VersionParseError {
    pub input: String,
    pub reason: String,
}

/// Module version as written in the module file
///
/// Kept as the original text; only the shape is validated. The empty
/// version belongs to modules with an override that drops the version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(String);

impl Version {
    pub const EMPTY: Version = Version(String::new());

    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        if input.is_empty() {
            return Ok(Self::EMPTY);
        }

        let error = |reason: &str| VersionParseError {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let (rest, build) = match input.split_once('+') {
            Some((rest, build)) => (rest, Some(build)),
            None => (input, None),
        };
        let (release, prerelease) = match rest.split_once('-') {
            Some((release, prerelease)) => (release, Some(prerelease)),
            None => (rest, None),
        };

        if release.is_empty() {
            return Err(error("release segment is empty"));
        }
        for segment in release.split('.') {
            if segment.is_empty() {
                return Err(error("empty release identifier"));
            }
            if !segment.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(error("release identifiers may only contain letters and digits"));
            }
        }

        for (kind, part) in [("prerelease", prerelease), ("build", build)] {
            let Some(part) = part else { continue };
            if part.split('.').any(|segment| {
                segment.is_empty() || !segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            }) {
                return Err(error(&format!("malformed {} identifier", kind)));
            }
        }

        Ok(Self(input.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_versions() {
        for input in ["1.0", "1.2.3", "0.0.1-rc.1", "2.0.0+build.5", "1.0-beta-2"] {
            assert_eq!(Version::parse(input).unwrap().as_str(), input);
        }
    }

    #[test]
    fn test_empty_version() {
        let version = Version::parse("").unwrap();
        assert!(version.is_empty());
        assert_eq!(version, Version::EMPTY);
    }

    #[test]
    fn test_parse_invalid_versions() {
        for input in ["1..0", ".1", "1.0-", "1.0+", "1.0 beta", "-rc"] {
            assert!(Version::parse(input).is_err(), "{} should be rejected", input);
        }
    }
}
