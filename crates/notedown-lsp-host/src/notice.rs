//! User-visible notices.
//!
//! Failures that should reach the user without interrupting them (timeouts,
//! unsupported commands, server `window/showMessage`) go through a
//! [`Notifier`]. Embedding editors supply their own; the CLI collects notices
//! and prints them after each command.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

const NOTICE_TARGET: &str = "notedown_lsp_host::notice";

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// Degraded but recoverable.
    Warn,
    /// Operation failed.
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Info => "info",
            Self::Warn => "warning",
            Self::Error => "error",
        };
        formatter.write_str(label)
    }
}

/// A single notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Message shown to the user.
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.level, self.message)
    }
}

/// Non-blocking sink for user-visible notices.
pub trait Notifier: Send + Sync {
    /// Records or displays a notice.
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Emits notices as log events only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => info!(target: NOTICE_TARGET, "{message}"),
            NoticeLevel::Warn => warn!(target: NOTICE_TARGET, "{message}"),
            NoticeLevel::Error => error!(target: NOTICE_TARGET, "{message}"),
        }
    }
}

/// Buffers notices until the owner drains them.
#[derive(Debug, Clone, Default)]
pub struct CollectingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl CollectingNotifier {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns every buffered notice.
    #[must_use]
    pub fn take(&self) -> Vec<Notice> {
        let mut notices = self
            .notices
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        std::mem::take(&mut *notices)
    }

    /// Copies the buffered notices without draining them.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        TracingNotifier.notify(level, message);
        self.notices
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(Notice {
                level,
                message: String::from(message),
            });
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn collector_drains_in_order() {
        let notifier = CollectingNotifier::new();
        notifier.notify(NoticeLevel::Warn, "first");
        notifier.notify(NoticeLevel::Error, "second");

        let notices = notifier.take();

        assert_eq!(notices.len(), 2);
        assert_eq!(notices.first().map(ToString::to_string), Some(String::from("warning: first")));
        assert!(notifier.notices().is_empty());
    }

    #[rstest]
    fn clones_share_the_buffer() {
        let notifier = CollectingNotifier::new();
        let clone = notifier.clone();

        clone.notify(NoticeLevel::Info, "shared");

        assert_eq!(notifier.notices().len(), 1);
    }
}
