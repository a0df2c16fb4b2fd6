//! [`ServerFactory`] that launches real server processes.

use super::config::LspServerConfig;
use super::process::ProcessLanguageServer;
use crate::server::{LanguageServer, LanguageServerError, ServerFactory};
use crate::workspace::WorkspaceRoot;

/// Starts one [`ProcessLanguageServer`] per workspace root.
#[derive(Debug, Clone, Default)]
pub struct ProcessServerFactory {
    config: LspServerConfig,
}

impl ProcessServerFactory {
    /// Uses `config` for every spawned process. A configured working
    /// directory overrides the workspace root.
    #[must_use]
    pub fn new(config: LspServerConfig) -> Self {
        Self { config }
    }

    /// Configuration applied to spawned processes.
    #[must_use]
    pub fn config(&self) -> &LspServerConfig {
        &self.config
    }
}

impl ServerFactory for ProcessServerFactory {
    fn spawn(
        &mut self,
        root: &WorkspaceRoot,
    ) -> Result<Box<dyn LanguageServer>, LanguageServerError> {
        let server = ProcessLanguageServer::spawn(&self.config, root).map_err(|error| {
            LanguageServerError::with_source(
                format!("could not launch {}", self.config.command.display()),
                error,
            )
        })?;
        Ok(Box::new(server))
    }
}
