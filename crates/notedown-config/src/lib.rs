//! Shared configuration for the Notedown client.
//!
//! Values are layered by `ortho_config`: built-in defaults, then a
//! configuration file (`--config-path` or `NOTEDOWN_CONFIG_PATH`), then
//! `NOTEDOWN_*` environment variables, then command-line flags.

mod defaults;
mod logging;

use std::path::{Component, Path};
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_CONCEAL_DEBOUNCE_MS, DEFAULT_LOG_FILTER, DEFAULT_MARKER_DIRECTORY,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SERVER_COMMAND, default_log_filter,
    default_log_filter_string, default_log_format, default_marker_directory,
    default_server_command,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "NOTEDOWN")]
pub struct Config {
    /// Executable launched as the language server (invoked with `serve`).
    #[ortho_config(default = default_server_command())]
    pub server_command: String,
    /// Name of the directory marking a workspace root.
    #[ortho_config(default = default_marker_directory())]
    pub marker_directory: String,
    /// Bound on synchronous requests, in milliseconds.
    #[ortho_config(default = DEFAULT_REQUEST_TIMEOUT_MS)]
    pub request_timeout_ms: u64,
    /// Debounce window for conceal refreshes, in milliseconds.
    #[ortho_config(default = DEFAULT_CONCEAL_DEBOUNCE_MS)]
    pub conceal_debounce_ms: u64,
    /// `tracing` filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for log lines.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_command: default_server_command(),
            marker_directory: default_marker_directory(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            conceal_debounce_ms: DEFAULT_CONCEAL_DEBOUNCE_MS,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Executable launched as the language server.
    #[must_use]
    pub fn server_command(&self) -> &str {
        self.server_command.as_str()
    }

    /// Name of the workspace marker directory.
    #[must_use]
    pub fn marker_directory(&self) -> &str {
        self.marker_directory.as_str()
    }

    /// Bound applied to latency-sensitive requests.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Quiet period before a conceal refresh fires.
    #[must_use]
    pub const fn conceal_debounce(&self) -> Duration {
        Duration::from_millis(self.conceal_debounce_ms)
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Rejects values that load cleanly but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the server command is blank, the marker is
    /// not a single directory name, or the request timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_command.trim().is_empty() {
            return Err(ConfigError::EmptyServerCommand);
        }
        if !is_single_component(&self.marker_directory) {
            return Err(ConfigError::InvalidMarker {
                marker: self.marker_directory.clone(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::ZeroRequestTimeout);
        }
        Ok(())
    }
}

fn is_single_component(marker: &str) -> bool {
    let mut components = Path::new(marker).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Semantic validation failures for a loaded [`Config`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The server command was empty or whitespace.
    #[error("server command must not be empty")]
    EmptyServerCommand,
    /// The marker was empty, absolute, or contained separators.
    #[error("marker directory '{marker}' must be a single directory name")]
    InvalidMarker {
        /// Rejected marker value.
        marker: String,
    },
    /// Synchronous requests would time out immediately.
    #[error("request timeout must be greater than zero")]
    ZeroRequestTimeout,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn defaults_are_valid() {
        let config = Config::default();

        assert_eq!(config.server_command(), "notedown");
        assert_eq!(config.marker_directory(), ".notedown");
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
        assert_eq!(config.conceal_debounce(), Duration::from_millis(300));
        assert_eq!(config.validate(), Ok(()));
    }

    #[rstest]
    #[case("")]
    #[case("nested/marker")]
    #[case("/absolute")]
    #[case("..")]
    fn rejects_marker_that_is_not_a_directory_name(#[case] marker: &str) {
        let config = Config {
            marker_directory: String::from(marker),
            ..Config::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMarker { .. })
        ));
    }

    #[rstest]
    fn rejects_blank_server_command() {
        let config = Config {
            server_command: String::from("   "),
            ..Config::default()
        };

        assert_eq!(config.validate(), Err(ConfigError::EmptyServerCommand));
    }

    #[rstest]
    fn rejects_zero_timeout() {
        let config = Config {
            request_timeout_ms: 0,
            ..Config::default()
        };

        assert_eq!(config.validate(), Err(ConfigError::ZeroRequestTimeout));
    }
}
