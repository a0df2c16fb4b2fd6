//! Built-in defaults applied before any configuration layer.

use crate::logging::LogFormat;

/// Executable launched as the Notedown language server.
pub const DEFAULT_SERVER_COMMAND: &str = "notedown";

/// Directory whose presence marks a workspace root.
pub const DEFAULT_MARKER_DIRECTORY: &str = ".notedown";

/// Upper bound on latency-sensitive requests such as list-item lookups.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 1_000;

/// Quiet period before a conceal refresh is sent after text changes.
pub const DEFAULT_CONCEAL_DEBOUNCE_MS: u64 = 300;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Owned server command used where allocation is required (e.g. serde).
#[must_use]
pub fn default_server_command() -> String {
    String::from(DEFAULT_SERVER_COMMAND)
}

/// Owned marker directory name.
#[must_use]
pub fn default_marker_directory() -> String {
    String::from(DEFAULT_MARKER_DIRECTORY)
}

/// Default log filter expression used by the binaries.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    String::from(DEFAULT_LOG_FILTER)
}

/// Default logging format for the binaries.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}
