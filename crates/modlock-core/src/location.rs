use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a declaration in a module file or extension script
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Location used for values that do not come from any file
    pub fn builtin() -> Self {
        Self::new("<builtin>", 0, 0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.file)
        } else {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_position() {
        let location = Location::new("/ws/MODULE.bazel", 3, 14);
        assert_eq!(location.to_string(), "/ws/MODULE.bazel:3:14");
    }

    #[test]
    fn test_display_builtin() {
        assert_eq!(Location::builtin().to_string(), "<builtin>");
    }
}
