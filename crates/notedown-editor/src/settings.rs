//! Editor-side settings.

use std::time::Duration;

use notedown_config::Config;
use notedown_lsp_host::DEFAULT_MARKER;

/// Default quiet period before conceal ranges are refreshed.
pub const DEFAULT_CONCEAL_DEBOUNCE: Duration = Duration::from_millis(300);

/// Settings consumed by [`Notedown`](crate::Notedown).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSettings {
    /// Directory name marking a workspace root.
    pub marker: String,
    /// Quiet period after an edit before conceal ranges are requested.
    pub conceal_debounce: Duration,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            marker: String::from(DEFAULT_MARKER),
            conceal_debounce: DEFAULT_CONCEAL_DEBOUNCE,
        }
    }
}

impl From<&Config> for EditorSettings {
    fn from(config: &Config) -> Self {
        Self {
            marker: String::from(config.marker_directory()),
            conceal_debounce: config.conceal_debounce(),
        }
    }
}
