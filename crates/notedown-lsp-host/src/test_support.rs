//! Scripted in-memory servers for tests.
//!
//! [`ScriptedServer`] answers requests from canned responses keyed by
//! command name (for `workspace/executeCommand`) or method, and records every
//! call so tests can assert on traffic. [`ScriptedFactory`] hands out such
//! servers to an [`LspHost`](crate::LspHost) and keeps handles to each one.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams, Uri,
};
use serde_json::Value;

use crate::command::NotedownCommand;
use crate::reply::{PendingReply, ReplySender, ServerFault};
use crate::server::{
    LanguageServer, LanguageServerError, ServerCapabilitySet, ServerFactory, ServerNotification,
};
use crate::workspace::WorkspaceRoot;

/// How a scripted server answers a request.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedResponse {
    /// Reply with this result.
    Value(Value),
    /// Reply with a JSON-RPC error.
    Fault {
        /// Error code.
        code: i64,
        /// Error message.
        message: String,
    },
    /// Never reply until [`ScriptedServerHandle::release`] is called.
    Stall,
}

/// A call observed by a scripted server.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedCall {
    /// Initialisation handshake for a root.
    Initialise(PathBuf),
    /// `textDocument/didOpen`.
    DidOpen {
        /// Document URI.
        uri: Uri,
        /// Declared language id.
        language_id: String,
        /// Document version.
        version: i32,
    },
    /// `textDocument/didChange`.
    DidChange {
        /// Document URI.
        uri: Uri,
        /// New document version.
        version: i32,
        /// Full replacement text.
        text: String,
    },
    /// `textDocument/didClose`.
    DidClose(Uri),
    /// Any request.
    Request {
        /// Request method.
        method: String,
        /// Raw parameters.
        params: Value,
    },
    /// Shutdown sequence.
    Shutdown,
}

impl ScriptedCall {
    /// Command name when the call is a `workspace/executeCommand` request.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::Request { method, params } if method == "workspace/executeCommand" => {
                params.get("command").and_then(Value::as_str)
            }
            _ => None,
        }
    }

    /// Arguments of an executeCommand request.
    #[must_use]
    pub fn arguments(&self) -> Option<&Value> {
        match self {
            Self::Request { params, .. } => params.get("arguments"),
            _ => None,
        }
    }
}

type Responder = Box<dyn FnMut(&str, &Value) -> Option<ScriptedResponse> + Send>;

struct ScriptState {
    capabilities: ServerCapabilitySet,
    fail_initialise: Option<String>,
    responses: HashMap<String, ScriptedResponse>,
    responder: Option<Responder>,
    notifications: Vec<ServerNotification>,
    calls: Vec<ScriptedCall>,
    stalled: Vec<(String, ReplySender)>,
    running: bool,
}

/// Test double standing in for a language server process.
pub struct ScriptedServer {
    shared: Arc<Mutex<ScriptState>>,
}

impl ScriptedServer {
    /// A server advertising `capabilities` and replying `null` to everything.
    #[must_use]
    pub fn new(capabilities: ServerCapabilitySet) -> Self {
        Self {
            shared: Arc::new(Mutex::new(ScriptState {
                capabilities,
                fail_initialise: None,
                responses: HashMap::new(),
                responder: None,
                notifications: Vec::new(),
                calls: Vec::new(),
                stalled: Vec::new(),
                running: true,
            })),
        }
    }

    /// A server that advertises every Notedown command plus folding ranges,
    /// definitions, completion and code actions.
    #[must_use]
    pub fn full() -> Self {
        Self::new(
            ServerCapabilitySet::new()
                .with_execute_commands(NotedownCommand::ALL.map(NotedownCommand::wire_name))
                .with_folding_range(true)
                .with_definition(true)
                .with_completion(true)
                .with_code_action(true),
        )
    }

    /// Answers requests for `key` (command or method name) with `response`.
    #[must_use]
    pub fn respond(self, key: impl Into<String>, response: ScriptedResponse) -> Self {
        lock(&self.shared).responses.insert(key.into(), response);
        self
    }

    /// Computes responses dynamically; consulted before canned responses.
    #[must_use]
    pub fn with_responder<F>(self, responder: F) -> Self
    where
        F: FnMut(&str, &Value) -> Option<ScriptedResponse> + Send + 'static,
    {
        lock(&self.shared).responder = Some(Box::new(responder));
        self
    }

    /// Makes the handshake fail with `message`.
    #[must_use]
    pub fn failing_initialise(self, message: impl Into<String>) -> Self {
        lock(&self.shared).fail_initialise = Some(message.into());
        self
    }

    /// Handle for assertions and scripted events.
    #[must_use]
    pub fn handle(&self) -> ScriptedServerHandle {
        ScriptedServerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn guard(&self) -> Result<MutexGuard<'_, ScriptState>, LanguageServerError> {
        let state = lock(&self.shared);
        if state.running {
            Ok(state)
        } else {
            Err(LanguageServerError::new("scripted server is not running"))
        }
    }
}

impl LanguageServer for ScriptedServer {
    fn initialize(
        &mut self,
        root: &WorkspaceRoot,
    ) -> Result<ServerCapabilitySet, LanguageServerError> {
        let mut state = self.guard()?;
        state
            .calls
            .push(ScriptedCall::Initialise(root.path().to_path_buf()));
        if let Some(message) = &state.fail_initialise {
            return Err(LanguageServerError::new(message.clone()));
        }
        Ok(state.capabilities.clone())
    }

    fn did_open(&mut self, params: DidOpenTextDocumentParams) -> Result<(), LanguageServerError> {
        let document = params.text_document;
        self.guard()?.calls.push(ScriptedCall::DidOpen {
            uri: document.uri,
            language_id: document.language_id,
            version: document.version,
        });
        Ok(())
    }

    fn did_change(
        &mut self,
        params: DidChangeTextDocumentParams,
    ) -> Result<(), LanguageServerError> {
        let text = params
            .content_changes
            .into_iter()
            .last()
            .map(|change| change.text)
            .unwrap_or_default();
        self.guard()?.calls.push(ScriptedCall::DidChange {
            uri: params.text_document.uri,
            version: params.text_document.version,
            text,
        });
        Ok(())
    }

    fn did_close(&mut self, params: DidCloseTextDocumentParams) -> Result<(), LanguageServerError> {
        self.guard()?
            .calls
            .push(ScriptedCall::DidClose(params.text_document.uri));
        Ok(())
    }

    fn request(&mut self, method: &str, params: Value) -> Result<PendingReply, LanguageServerError> {
        let mut state = self.guard()?;
        let call = ScriptedCall::Request {
            method: String::from(method),
            params: params.clone(),
        };
        let key = String::from(call.command().unwrap_or(method));
        state.calls.push(call);

        let dynamic = state
            .responder
            .as_mut()
            .and_then(|responder| responder(&key, &params));
        let response = dynamic
            .or_else(|| state.responses.get(&key).cloned())
            .unwrap_or(ScriptedResponse::Value(Value::Null));

        Ok(match response {
            ScriptedResponse::Value(value) => PendingReply::ready(method, Ok(value)),
            ScriptedResponse::Fault { code, message } => {
                PendingReply::ready(method, Err(ServerFault { code, message }))
            }
            ScriptedResponse::Stall => {
                let (sender, reply) = PendingReply::channel(method);
                state.stalled.push((key, sender));
                reply
            }
        })
    }

    fn drain_notifications(&mut self) -> Vec<ServerNotification> {
        std::mem::take(&mut lock(&self.shared).notifications)
    }

    fn shutdown(&mut self) -> Result<(), LanguageServerError> {
        let mut state = lock(&self.shared);
        state.calls.push(ScriptedCall::Shutdown);
        state.running = false;
        state.stalled.clear();
        Ok(())
    }

    fn is_running(&self) -> bool {
        lock(&self.shared).running
    }
}

/// Assertion and control handle for a [`ScriptedServer`].
#[derive(Clone)]
pub struct ScriptedServerHandle {
    shared: Arc<Mutex<ScriptState>>,
}

impl ScriptedServerHandle {
    /// Every call observed so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ScriptedCall> {
        lock(&self.shared).calls.clone()
    }

    /// Number of executeCommand requests for `command`.
    #[must_use]
    pub fn command_count(&self, command: NotedownCommand) -> usize {
        lock(&self.shared)
            .calls
            .iter()
            .filter(|call| call.command() == Some(command.wire_name()))
            .count()
    }

    /// Number of requests for `method`.
    #[must_use]
    pub fn request_count(&self, method: &str) -> usize {
        lock(&self.shared)
            .calls
            .iter()
            .filter(|call| matches!(call, ScriptedCall::Request { method: m, .. } if m == method))
            .count()
    }

    /// Replaces the canned response for `key`.
    pub fn set_response(&self, key: impl Into<String>, response: ScriptedResponse) {
        lock(&self.shared).responses.insert(key.into(), response);
    }

    /// Queues a notification for the next drain.
    pub fn push_notification(&self, method: impl Into<String>, params: Value) {
        lock(&self.shared).notifications.push(ServerNotification {
            method: method.into(),
            params,
        });
    }

    /// Completes the oldest stalled request for `key`. Returns whether one
    /// was waiting.
    pub fn release(&self, key: &str, value: Value) -> bool {
        let mut state = lock(&self.shared);
        let position = state.stalled.iter().position(|(stalled, _)| stalled == key);
        match position {
            Some(index) => {
                let (_, sender) = state.stalled.remove(index);
                sender.complete(Ok(value));
                true
            }
            None => false,
        }
    }

    /// Number of requests still stalled.
    #[must_use]
    pub fn stalled(&self) -> usize {
        lock(&self.shared).stalled.len()
    }

    /// Simulates the process dying.
    pub fn crash(&self) {
        let mut state = lock(&self.shared);
        state.running = false;
        state.stalled.clear();
    }

    /// Whether the server still reports itself running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.shared).running
    }
}

type Builder = Box<dyn Fn() -> ScriptedServer + Send>;

struct FactoryState {
    builder: Builder,
    spawned: Vec<(PathBuf, ScriptedServerHandle)>,
    fail_next: Option<String>,
}

/// [`ServerFactory`] producing [`ScriptedServer`]s.
pub struct ScriptedFactory {
    shared: Arc<Mutex<FactoryState>>,
}

impl ScriptedFactory {
    /// Builds each server with `builder`.
    #[must_use]
    pub fn new<F>(builder: F) -> Self
    where
        F: Fn() -> ScriptedServer + Send + 'static,
    {
        Self {
            shared: Arc::new(Mutex::new(FactoryState {
                builder: Box::new(builder),
                spawned: Vec::new(),
                fail_next: None,
            })),
        }
    }

    /// Handle for assertions after the factory moves into a host.
    #[must_use]
    pub fn handle(&self) -> ScriptedFactoryHandle {
        ScriptedFactoryHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl ServerFactory for ScriptedFactory {
    fn spawn(
        &mut self,
        root: &WorkspaceRoot,
    ) -> Result<Box<dyn LanguageServer>, LanguageServerError> {
        let mut state = lock(&self.shared);
        if let Some(message) = state.fail_next.take() {
            return Err(LanguageServerError::new(message));
        }
        let server = (state.builder)();
        state
            .spawned
            .push((root.path().to_path_buf(), server.handle()));
        Ok(Box::new(server))
    }
}

/// Assertion and control handle for a [`ScriptedFactory`].
#[derive(Clone)]
pub struct ScriptedFactoryHandle {
    shared: Arc<Mutex<FactoryState>>,
}

impl ScriptedFactoryHandle {
    /// Number of servers spawned so far.
    #[must_use]
    pub fn spawn_count(&self) -> usize {
        lock(&self.shared).spawned.len()
    }

    /// Handle of the most recently spawned server.
    #[must_use]
    pub fn last_server(&self) -> Option<ScriptedServerHandle> {
        lock(&self.shared)
            .spawned
            .last()
            .map(|(_, handle)| handle.clone())
    }

    /// Handles of every server spawned for `root`, oldest first.
    #[must_use]
    pub fn servers_for(&self, root: &WorkspaceRoot) -> Vec<ScriptedServerHandle> {
        lock(&self.shared)
            .spawned
            .iter()
            .filter(|(path, _)| path == root.path())
            .map(|(_, handle)| handle.clone())
            .collect()
    }

    /// Makes the next spawn fail with `message`.
    pub fn fail_next_spawn(&self, message: impl Into<String>) {
        lock(&self.shared).fail_next = Some(message.into());
    }
}

fn lock<T>(shared: &Mutex<T>) -> MutexGuard<'_, T> {
    shared.lock().unwrap_or_else(|poison| poison.into_inner())
}
