pub mod config;
pub mod di;
pub mod diagnostics;
pub mod diff;
pub mod digest;
pub mod eval;
pub mod location;
pub mod lockfile;
pub mod model;
pub mod policy;
pub mod session;
pub mod spelling;
pub mod validate;

pub use config::{CliOverrides, LockfileMode, ResolverConfig, ResolverOptions};
pub use di::Container;
pub use diagnostics::{Diagnostic, DiagnosticHandler, DiagnosticLevel};
pub use digest::{ScriptGraph, TransitiveDigest};
pub use eval::{
    Environment, ExtensionError, ExtensionImplementation, ExtensionReturn, Interrupt,
    ModuleExtension, ModuleExtensionContext, SingleExtensionEvalValue, SingleExtensionEvaluator,
    Step,
};
pub use location::Location;
pub use lockfile::{LockFileModuleExtension, Lockfile, LockfileError, LockfileStore};
pub use model::{
    Label, Module, ModuleExtensionId, ModuleExtensionUsage, ModuleKey, RepoSpec,
    SingleExtensionUsages, Tag, Version,
};
pub use policy::{CacheDecision, ConsistencyPolicy};
pub use session::{ResolutionSession, SessionError};
