//! Correlation between an outbound request and its eventual reply.
//!
//! A [`PendingReply`] is handed to the caller as soon as a request is
//! written. The caller may block on it for a bounded time or poll it on
//! later turns of the editor loop; the server side completes it through the
//! paired [`ReplySender`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Error object returned by the server in place of a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (code {code})")]
pub struct ServerFault {
    /// JSON-RPC error code.
    pub code: i64,
    /// Server-provided message.
    pub message: String,
}

/// Result delivered through a reply channel.
pub type ReplyOutcome = Result<Value, ServerFault>;

/// Why a reply did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    /// No reply arrived within the bound.
    #[error("{method} timed out after {timeout_ms}ms")]
    TimedOut {
        /// Request method.
        method: String,
        /// Bound that elapsed.
        timeout_ms: u64,
    },
    /// The server went away before replying.
    #[error("{method} was abandoned before a reply arrived")]
    Disconnected {
        /// Request method.
        method: String,
    },
    /// The server answered with an error object.
    #[error("{method} failed: {fault}")]
    Server {
        /// Request method.
        method: String,
        /// Error reported by the server.
        #[source]
        fault: ServerFault,
    },
}

/// Completing half of a reply channel.
#[derive(Debug)]
pub struct ReplySender {
    method: String,
    sender: Sender<ReplyOutcome>,
    abandoned: Arc<AtomicBool>,
}

impl ReplySender {
    /// Method of the request being answered.
    #[must_use]
    pub fn method(&self) -> &str {
        self.method.as_str()
    }

    /// Delivers the outcome. Returns `false` when the caller stopped waiting.
    pub fn complete(self, outcome: ReplyOutcome) -> bool {
        self.sender.send(outcome).is_ok()
    }

    /// Whether the waiting half is gone, after a timeout or because the
    /// caller stopped caring. Completing an abandoned reply is a no-op.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::Acquire)
    }
}

/// Waiting half of a reply channel.
///
/// Dropping it marks the paired [`ReplySender`] as abandoned.
#[derive(Debug)]
pub struct PendingReply {
    method: String,
    receiver: Receiver<ReplyOutcome>,
    abandoned: Arc<AtomicBool>,
}

impl PendingReply {
    /// Creates a connected sender/receiver pair for `method`.
    #[must_use]
    pub fn channel(method: impl Into<String>) -> (ReplySender, Self) {
        let method = method.into();
        let (sender, receiver) = mpsc::channel();
        let abandoned = Arc::new(AtomicBool::new(false));
        (
            ReplySender {
                method: method.clone(),
                sender,
                abandoned: Arc::clone(&abandoned),
            },
            Self {
                method,
                receiver,
                abandoned,
            },
        )
    }

    /// A reply that is already complete.
    #[must_use]
    pub fn ready(method: impl Into<String>, outcome: ReplyOutcome) -> Self {
        let (sender, pending) = Self::channel(method);
        sender.complete(outcome);
        pending
    }

    /// Method of the request this reply belongs to.
    #[must_use]
    pub fn method(&self) -> &str {
        self.method.as_str()
    }

    /// Blocks for at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ReplyError::TimedOut`] when the bound elapses,
    /// [`ReplyError::Disconnected`] when the sender was dropped, and
    /// [`ReplyError::Server`] for error responses.
    pub fn wait(mut self, timeout: Duration) -> Result<Value, ReplyError> {
        let received = self.receiver.recv_timeout(timeout);
        let method = std::mem::take(&mut self.method);
        match received {
            Ok(outcome) => outcome.map_err(|fault| ReplyError::Server { method, fault }),
            Err(RecvTimeoutError::Timeout) => Err(ReplyError::TimedOut {
                method,
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(ReplyError::Disconnected { method }),
        }
    }

    /// Checks for a reply without blocking. `None` means still in flight.
    pub fn poll(&mut self) -> Option<Result<Value, ReplyError>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome.map_err(|fault| ReplyError::Server {
                method: self.method.clone(),
                fault,
            })),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(ReplyError::Disconnected {
                method: self.method.clone(),
            })),
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.abandoned.store(true, Ordering::Release);
    }
}
