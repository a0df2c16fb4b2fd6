//! Failures of the stdio server adapter.

use std::io;

use thiserror::Error;

/// Errors raised while launching or talking to a `notedown serve` process.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The server executable is not on `PATH`.
    #[error("notedown server executable '{command}' not found")]
    BinaryNotFound {
        /// Command as configured.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The process could not be started or its pipes were unavailable.
    #[error("could not start notedown server: {message}")]
    SpawnFailed {
        /// What went wrong.
        message: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Framing or pipe failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message could not be encoded.
    #[error("invalid JSON-RPC payload: {0}")]
    Codec(#[from] serde_json::Error),

    /// `initialize` failed or returned unusable capabilities.
    #[error("handshake failed: {message}")]
    InitializationFailed {
        /// Reason reported by the server or the reply channel.
        message: String,
    },

    /// The process is gone; no further traffic is possible.
    #[error("notedown server is not running")]
    ProcessExited,
}

/// Errors reading or writing `Content-Length` frames.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Pipe I/O failed.
    #[error("pipe I/O failed: {0}")]
    Io(#[from] io::Error),

    /// End of stream between frames.
    #[error("server closed its output")]
    Closed,

    /// Headers ended without a `Content-Length`.
    #[error("frame has no Content-Length header")]
    MissingContentLength,

    /// A header line was not `Name: value` or the length was not a number.
    #[error("malformed frame header")]
    InvalidHeader,
}
