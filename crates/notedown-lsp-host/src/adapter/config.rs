//! Configuration for process-based language server adapters.

use std::path::PathBuf;

/// Executable launched when no other command is configured.
pub const DEFAULT_SERVER_COMMAND: &str = "notedown";

/// Configuration for spawning a language server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LspServerConfig {
    /// The executable path or command name.
    pub command: PathBuf,
    /// Arguments to pass to the language server.
    pub args: Vec<String>,
    /// Working directory for the spawned process.
    pub working_dir: Option<PathBuf>,
}

impl Default for LspServerConfig {
    fn default() -> Self {
        Self::for_command(DEFAULT_SERVER_COMMAND)
    }
}

impl LspServerConfig {
    /// Runs `<command> serve`.
    #[must_use]
    pub fn for_command(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args: vec![String::from("serve")],
            working_dir: None,
        }
    }

    /// Sets a custom working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}
