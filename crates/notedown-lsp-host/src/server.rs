//! Abstractions over concrete language server implementations.

use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;

use lsp_types::{
    CodeActionProviderCapability, DidChangeTextDocumentParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, FoldingRangeProviderCapability, OneOf, ServerCapabilities,
};
use serde_json::Value;
use thiserror::Error;

use crate::reply::PendingReply;
use crate::workspace::WorkspaceRoot;

/// Capabilities the host inspects after the initialisation handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerCapabilitySet {
    execute_command: bool,
    commands: BTreeSet<String>,
    folding_range: bool,
    definition: bool,
    completion: bool,
    code_action: bool,
}

impl ServerCapabilitySet {
    /// A server that advertises nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an `executeCommandProvider` listing `commands`.
    #[must_use]
    pub fn with_execute_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.execute_command = true;
        self.commands.extend(commands.into_iter().map(Into::into));
        self
    }

    /// Declares `textDocument/foldingRange` support.
    #[must_use]
    pub fn with_folding_range(mut self, supported: bool) -> Self {
        self.folding_range = supported;
        self
    }

    /// Declares `textDocument/definition` support.
    #[must_use]
    pub fn with_definition(mut self, supported: bool) -> Self {
        self.definition = supported;
        self
    }

    /// Declares `textDocument/completion` support.
    #[must_use]
    pub fn with_completion(mut self, supported: bool) -> Self {
        self.completion = supported;
        self
    }

    /// Declares `textDocument/codeAction` support.
    #[must_use]
    pub fn with_code_action(mut self, supported: bool) -> Self {
        self.code_action = supported;
        self
    }

    /// Extracts the relevant subset of an `initialize` result.
    #[must_use]
    pub fn from_server_capabilities(capabilities: &ServerCapabilities) -> Self {
        let mut set = Self::new();
        if let Some(provider) = &capabilities.execute_command_provider {
            set = set.with_execute_commands(provider.commands.iter().cloned());
        }
        let folding_range = match &capabilities.folding_range_provider {
            Some(FoldingRangeProviderCapability::Simple(enabled)) => *enabled,
            Some(_) => true,
            None => false,
        };
        let definition = match &capabilities.definition_provider {
            Some(OneOf::Left(enabled)) => *enabled,
            Some(OneOf::Right(_)) => true,
            None => false,
        };
        let code_action = match &capabilities.code_action_provider {
            Some(CodeActionProviderCapability::Simple(enabled)) => *enabled,
            Some(CodeActionProviderCapability::Options(_)) => true,
            None => false,
        };
        set.with_folding_range(folding_range)
            .with_definition(definition)
            .with_completion(capabilities.completion_provider.is_some())
            .with_code_action(code_action)
    }

    /// Whether an `executeCommandProvider` was advertised at all.
    #[must_use]
    pub fn has_execute_command_provider(&self) -> bool {
        self.execute_command
    }

    /// Whether the provider lists `command`.
    #[must_use]
    pub fn advertises_command(&self, command: &str) -> bool {
        self.execute_command && self.commands.contains(command)
    }

    /// Advertised command names in sorted order.
    pub fn commands(&self) -> impl Iterator<Item = &str> + '_ {
        self.commands.iter().map(String::as_str)
    }

    /// Whether `textDocument/foldingRange` is supported.
    #[must_use]
    pub fn supports_folding_range(&self) -> bool {
        self.folding_range
    }

    /// Whether `textDocument/definition` is supported.
    #[must_use]
    pub fn supports_definition(&self) -> bool {
        self.definition
    }

    /// Whether `textDocument/completion` is supported.
    #[must_use]
    pub fn supports_completion(&self) -> bool {
        self.completion
    }

    /// Whether `textDocument/codeAction` is supported.
    #[must_use]
    pub fn supports_code_action(&self) -> bool {
        self.code_action
    }
}

/// A notification pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerNotification {
    /// Notification method, e.g. `textDocument/publishDiagnostics`.
    pub method: String,
    /// Raw parameters.
    pub params: Value,
}

/// Errors reported by language server implementations.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct LanguageServerError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl LanguageServerError {
    /// Builds an error without an underlying source.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error that wraps an underlying source.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Human-friendly description without the optional source.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Behaviour required from a language server session.
///
/// Notifications return once written. Requests return a [`PendingReply`]
/// immediately so callers decide whether to wait or poll.
pub trait LanguageServer: Send {
    /// Runs the initialisation handshake for `root`.
    fn initialize(&mut self, root: &WorkspaceRoot)
    -> Result<ServerCapabilitySet, LanguageServerError>;

    /// Sends `textDocument/didOpen`.
    fn did_open(&mut self, params: DidOpenTextDocumentParams) -> Result<(), LanguageServerError>;

    /// Sends `textDocument/didChange`.
    fn did_change(
        &mut self,
        params: DidChangeTextDocumentParams,
    ) -> Result<(), LanguageServerError>;

    /// Sends `textDocument/didClose`.
    fn did_close(&mut self, params: DidCloseTextDocumentParams) -> Result<(), LanguageServerError>;

    /// Writes a request and returns the handle for its reply.
    fn request(&mut self, method: &str, params: Value) -> Result<PendingReply, LanguageServerError>;

    /// Removes and returns notifications received since the last call.
    fn drain_notifications(&mut self) -> Vec<ServerNotification>;

    /// Runs the `shutdown`/`exit` sequence and releases the process.
    fn shutdown(&mut self) -> Result<(), LanguageServerError>;

    /// Whether the session can still carry traffic.
    fn is_running(&self) -> bool;
}

impl fmt::Debug for dyn LanguageServer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("LanguageServer")
    }
}

/// Creates a language server for a workspace root.
pub trait ServerFactory: Send {
    /// Starts a server whose working directory is `root`.
    fn spawn(&mut self, root: &WorkspaceRoot) -> Result<Box<dyn LanguageServer>, LanguageServerError>;
}

impl fmt::Debug for dyn ServerFactory {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("ServerFactory")
    }
}
