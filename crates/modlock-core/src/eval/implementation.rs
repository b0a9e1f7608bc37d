use super::context::ModuleExtensionContext;
use super::metadata::ExtensionMetadata;
use crate::location::Location;
use std::fmt;

/// One frame of a script call stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub function: String,
    pub location: Location,
}

/// Error raised by extension script code, with the call stack at the point of failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    message: String,
    stack: Vec<StackFrame>,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: Vec::new(),
        }
    }

    /// Push a frame; frames are added outermost first
    pub fn with_frame(mut self, function: impl Into<String>, location: Location) -> Self {
        self.stack.push(StackFrame {
            function: function.into(),
            location,
        });
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack(&self) -> &[StackFrame] {
        &self.stack
    }

    /// Message preceded by a traceback, for reporting to the user
    pub fn message_with_stack(&self) -> String {
        if self.stack.is_empty() {
            return format!("Error: {}", self.message);
        }
        let mut out = String::from("Traceback (most recent call last):\n");
        for frame in &self.stack {
            out.push_str(&format!("\tFile {}, in {}\n", frame.location, frame.function));
        }
        out.push_str(&format!("Error: {}", self.message));
        out
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ScriptError {}

/// Why an implementation stopped before returning
#[derive(Debug)]
pub enum Interrupt {
    /// An input the implementation asked for is not available yet
    Restart,
    Error(ScriptError),
}

impl From<ScriptError> for Interrupt {
    fn from(error: ScriptError) -> Self {
        Interrupt::Error(error)
    }
}

/// Value returned by an extension implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionReturn {
    None,
    Metadata(ExtensionMetadata),
    /// Anything else; carries the script type name for the error message
    Invalid { type_name: String },
}

/// Body of a module extension
///
/// Called once per evaluation attempt with a fresh context.
pub trait ExtensionImplementation: Send + Sync {
    fn call(&self, ctx: &mut ModuleExtensionContext<'_>) -> Result<ExtensionReturn, Interrupt>;
}

pub(crate) struct FnImplementation<F>(pub(crate) F);

impl<F> ExtensionImplementation for FnImplementation<F>
where
    F: Fn(&mut ModuleExtensionContext<'_>) -> Result<ExtensionReturn, Interrupt> + Send + Sync,
{
    fn call(&self, ctx: &mut ModuleExtensionContext<'_>) -> Result<ExtensionReturn, Interrupt> {
        (self.0)(ctx)
    }
}
