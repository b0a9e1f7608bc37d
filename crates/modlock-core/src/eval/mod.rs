//! Evaluation of a single module extension
//!
//! The evaluator consults the lockfile first and only runs the extension's
//! implementation on a miss. Implementations run in a private working
//! directory and may be interrupted when an input is not available yet; the
//! attempt is then discarded and reported as `NotReady`.

mod context;
mod download;
mod environment;
mod error;
mod evaluator;
mod implementation;
mod metadata;
mod step;
mod workdir;

pub use context::{Capabilities, ExtensionModule, ModuleExtensionContext};
pub use download::{DownloadError, Downloader, OfflineDownloader};
pub use environment::{Environment, Exported, LoadedScript, ModuleExtension};
pub use error::{ExtensionError, Transience};
pub use evaluator::{EvaluationOutput, SingleExtensionEvalValue, SingleExtensionEvaluator};
pub use implementation::{ExtensionImplementation, ExtensionReturn, Interrupt, ScriptError, StackFrame};
pub use metadata::{DirectDeps, ExtensionMetadata};
pub use step::Step;
pub use workdir::{InFlightDirectories, WorkingDirectory, WORKING_DIRECTORY_ROOT};
