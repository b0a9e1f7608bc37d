use super::implementation::ScriptError;
use crate::location::Location;
use crate::lockfile::LockfileError;
use crate::model::{Label, LabelError, ModuleExtensionId, UsageError};
use crate::validate::UnresolvedImports;
use std::path::PathBuf;
use thiserror::Error;

/// Whether retrying the same evaluation could succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transience {
    Persistent,
    Transient,
}

#[derive(Debug, Error)]
pub enum ExtensionError {
    /// The extension id names something that cannot hold a module extension
    #[error("invalid module extension label: {0}")]
    InvalidLabel(#[from] LabelError),

    /// No module in the dependency graph uses the extension
    #[error("no usages found for module extension '{0}'")]
    NoUsages(ModuleExtensionId),

    /// The defining script could not be loaded
    #[error("Error loading '{label}' for module extensions, requested by {location}: {message}")]
    LoadFailed {
        label: Label,
        location: Location,
        message: String,
    },

    /// The script loaded but has no extension under the requested name
    #[error("{label} does not export a module extension called {name}, yet its use is requested at {location}{suggestion}")]
    MissingExport {
        label: Label,
        name: String,
        location: Location,
        suggestion: String,
    },

    /// A usage calls a tag the extension does not declare
    #[error("The module extension defined at {label}%{name} does not have a tag class named {tag_name}, but its use is attempted at {location}{suggestion}")]
    UnknownTagClass {
        label: Label,
        name: String,
        tag_name: String,
        location: Location,
        suggestion: String,
    },

    /// Verify mode found a lockfile entry that no longer matches
    #[error("Lock file is no longer up-to-date because: {}", .reasons.join(", "))]
    StaleLockfile { reasons: Vec<String> },

    /// The implementation raised an error
    #[error("error evaluating module extension {name} in {label}: {error}")]
    EvaluationFailed {
        name: String,
        label: Label,
        error: ScriptError,
    },

    /// The implementation returned something other than nothing or metadata
    #[error("expected module extension {name} in {label} to return None or extension_metadata, got {type_name}")]
    InvalidReturn {
        name: String,
        label: Label,
        type_name: String,
    },

    /// The returned metadata contradicts itself or the generated repositories
    #[error("invalid extension_metadata returned by module extension {name} in {label}: {message}")]
    InvalidMetadata {
        name: String,
        label: Label,
        message: String,
    },

    #[error(transparent)]
    UnresolvedImports(#[from] UnresolvedImports),

    #[error("invalid module dependency graph: {0}")]
    DependencyGraph(#[from] UsageError),

    #[error(transparent)]
    Lockfile(#[from] LockfileError),

    /// The working directory of an interrupted attempt could not be removed
    #[error("Failed to clean up module context directory {}: {source}", .path.display())]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ExtensionError {
    pub fn transience(&self) -> Transience {
        match self {
            ExtensionError::EvaluationFailed { .. } | ExtensionError::Cleanup { .. } => {
                Transience::Transient
            }
            _ => Transience::Persistent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.transience() == Transience::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label() -> Label {
        Label::parse_canonical("//:ext.bzl").unwrap()
    }

    #[test]
    fn test_missing_export_message() {
        let err = ExtensionError::MissingExport {
            label: label(),
            name: "mavne".to_string(),
            location: Location::new("/ws/MODULE.bazel", 1, 9),
            suggestion: " (did you mean 'maven'?)".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "//:ext.bzl does not export a module extension called mavne, yet its use is requested at /ws/MODULE.bazel:1:9 (did you mean 'maven'?)"
        );
    }

    #[test]
    fn test_stale_message_joins_reasons() {
        let err = ExtensionError::StaleLockfile {
            reasons: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "Lock file is no longer up-to-date because: a, b");
    }

    #[test]
    fn test_transience() {
        let failed = ExtensionError::EvaluationFailed {
            name: "ext".to_string(),
            label: label(),
            error: ScriptError::new("boom"),
        };
        let invalid = ExtensionError::InvalidReturn {
            name: "ext".to_string(),
            label: label(),
            type_name: "string".to_string(),
        };
        assert!(failed.is_transient());
        assert_eq!(invalid.transience(), Transience::Persistent);
    }
}
