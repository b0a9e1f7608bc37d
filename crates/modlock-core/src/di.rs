use crate::config::ResolverConfig;
use crate::diagnostics::{ConsoleDiagnosticHandler, DiagnosticHandler};
use crate::eval::{Capabilities, Downloader, OfflineDownloader, SingleExtensionEvaluator};
use crate::lockfile::LockfileStore;
use crate::session::{ResolutionSession, SessionError};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Dependency injection container
/// Holds the shared collaborators and builds evaluators and sessions from them
pub struct Container {
    config: Arc<ResolverConfig>,
    diagnostic_handler: Arc<dyn DiagnosticHandler>,
    client_env: Arc<BTreeMap<String, String>>,
    downloader: Arc<dyn Downloader>,
}

impl Container {
    /// Create a container with production dependencies
    ///
    /// The client environment is snapshotted once here; downloads are disabled
    /// until a real downloader is supplied through `with_dependencies`.
    pub fn new(config: ResolverConfig) -> Self {
        let config = Arc::new(config);
        let diagnostic_handler = Arc::new(ConsoleDiagnosticHandler::new(config.resolver_options.pretty));
        let client_env = Arc::new(std::env::vars().collect());

        Container {
            config,
            diagnostic_handler,
            client_env,
            downloader: Arc::new(OfflineDownloader),
        }
    }

    /// Create a container with custom dependencies (for testing)
    pub fn with_dependencies(
        config: ResolverConfig,
        diagnostic_handler: Arc<dyn DiagnosticHandler>,
        client_env: BTreeMap<String, String>,
        downloader: Arc<dyn Downloader>,
    ) -> Self {
        Container {
            config: Arc::new(config),
            diagnostic_handler,
            client_env: Arc::new(client_env),
            downloader,
        }
    }

    pub fn config(&self) -> &Arc<ResolverConfig> {
        &self.config
    }

    pub fn diagnostic_handler(&self) -> &Arc<dyn DiagnosticHandler> {
        &self.diagnostic_handler
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            client_env: Arc::clone(&self.client_env),
            downloader: Arc::clone(&self.downloader),
            timeout_scaling: self.config.resolver_options.timeout_scaling,
        }
    }

    pub fn lockfile_store(&self, workspace_root: &Path) -> LockfileStore {
        LockfileStore::new(self.config.resolver_options.lockfile_path(workspace_root))
    }

    pub fn evaluator(&self, workspace_root: &Path) -> SingleExtensionEvaluator {
        let options = &self.config.resolver_options;
        SingleExtensionEvaluator::new(
            options.output_base_path(workspace_root),
            options.lockfile_mode,
            self.capabilities(),
            Arc::clone(&self.diagnostic_handler),
        )
    }

    /// Open a resolution session for the workspace, loading its lockfile
    pub fn open_session(&self, workspace_root: &Path) -> Result<ResolutionSession, SessionError> {
        ResolutionSession::open(
            self.lockfile_store(workspace_root),
            self.evaluator(workspace_root),
            self.config.resolver_options.max_restarts,
        )
    }

    /// Check if any errors have been reported
    pub fn has_errors(&self) -> bool {
        self.diagnostic_handler.has_errors()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostic_handler.error_count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostic_handler.warning_count()
    }
}
