//! Error types surfaced by the LSP host facade.

use std::fmt;

use thiserror::Error;

use crate::capability::{CapabilityKind, CapabilitySource};
use crate::reply::ReplyError;
use crate::server::LanguageServerError;
use crate::workspace::WorkspaceRoot;

/// Operation being executed when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOperation {
    /// Server initialisation handshake.
    Initialise,
    /// `textDocument/didOpen` notification.
    DidOpen,
    /// `textDocument/didChange` notification.
    DidChange,
    /// `textDocument/didClose` notification.
    DidClose,
    /// `workspace/executeCommand` request.
    ExecuteCommand,
    /// `textDocument/definition` request.
    Definition,
    /// `textDocument/foldingRange` request.
    FoldingRange,
    /// `textDocument/completion` request.
    Completion,
    /// `textDocument/codeAction` request.
    CodeAction,
    /// `shutdown`/`exit` sequence.
    Shutdown,
}

impl fmt::Display for HostOperation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Initialise => "initialisation",
            Self::DidOpen => "didOpen",
            Self::DidChange => "didChange",
            Self::DidClose => "didClose",
            Self::ExecuteCommand => "executeCommand",
            Self::Definition => "definition",
            Self::FoldingRange => "foldingRange",
            Self::Completion => "completion",
            Self::CodeAction => "codeAction",
            Self::Shutdown => "shutdown",
        };
        formatter.write_str(label)
    }
}

/// Errors returned by [`crate::LspHost`].
#[derive(Debug, Error)]
pub enum LspHostError {
    /// The server process could not be started.
    #[error("failed to start language server for {root}: {source}")]
    SpawnFailed {
        /// Workspace the server was meant for.
        root: WorkspaceRoot,
        /// Underlying error.
        #[source]
        source: LanguageServerError,
    },

    /// No live session exists for the root.
    #[error("no language server session for {root}")]
    UnknownSession {
        /// Root requested by the caller.
        root: WorkspaceRoot,
    },

    /// The session's server does not offer the capability.
    #[error("{capability} is unavailable for {root}: {reason}")]
    CapabilityUnavailable {
        /// Session root.
        root: WorkspaceRoot,
        /// Capability that was requested.
        capability: CapabilityKind,
        /// Why the capability is not available.
        reason: CapabilitySource,
    },

    /// Underlying language server returned an error.
    #[error("language server for {root} failed during {operation}: {source}")]
    Server {
        /// Session root.
        root: WorkspaceRoot,
        /// Operation that failed.
        operation: HostOperation,
        /// Underlying error.
        #[source]
        source: LanguageServerError,
    },

    /// A request produced no usable reply.
    #[error("{operation} for {root} did not complete: {source}")]
    Reply {
        /// Session root.
        root: WorkspaceRoot,
        /// Operation that was waiting.
        operation: HostOperation,
        /// Why the reply failed.
        #[source]
        source: ReplyError,
    },

    /// Parameters or results could not be encoded or decoded.
    #[error("invalid {operation} payload: {message}")]
    InvalidPayload {
        /// Operation whose payload was invalid.
        operation: HostOperation,
        /// Codec diagnostic.
        message: String,
    },
}

impl LspHostError {
    pub(crate) fn spawn_failed(root: &WorkspaceRoot, source: LanguageServerError) -> Self {
        Self::SpawnFailed {
            root: root.clone(),
            source,
        }
    }

    pub(crate) fn unknown(root: &WorkspaceRoot) -> Self {
        Self::UnknownSession { root: root.clone() }
    }

    pub(crate) fn capability_unavailable(
        root: &WorkspaceRoot,
        capability: CapabilityKind,
        reason: CapabilitySource,
    ) -> Self {
        Self::CapabilityUnavailable {
            root: root.clone(),
            capability,
            reason,
        }
    }

    pub(crate) fn server(
        root: &WorkspaceRoot,
        operation: HostOperation,
        source: LanguageServerError,
    ) -> Self {
        Self::Server {
            root: root.clone(),
            operation,
            source,
        }
    }

    pub(crate) fn reply(root: &WorkspaceRoot, operation: HostOperation, source: ReplyError) -> Self {
        Self::Reply {
            root: root.clone(),
            operation,
            source,
        }
    }

    pub(crate) fn invalid_payload(operation: HostOperation, error: &serde_json::Error) -> Self {
        Self::InvalidPayload {
            operation,
            message: error.to_string(),
        }
    }
}
