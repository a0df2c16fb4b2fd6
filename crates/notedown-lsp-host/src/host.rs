//! Session registry that owns one language server per workspace root.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lsp_types::{
    CodeActionOrCommand, CodeActionParams, CompletionItem, CompletionParams, CompletionResponse,
    Diagnostic, DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    ExecuteCommandParams, FoldingRange, FoldingRangeParams, GotoDefinitionParams,
    GotoDefinitionResponse, MessageType, PublishDiagnosticsParams, ShowMessageParams,
    TextDocumentIdentifier, Uri,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::capability::{CapabilityKind, CapabilitySummary, resolve_capabilities};
use crate::command::NotedownCommand;
use crate::errors::{HostOperation, LspHostError};
use crate::notice::{NoticeLevel, Notifier, TracingNotifier};
use crate::reply::PendingReply;
use crate::server::{LanguageServer, LanguageServerError, ServerFactory, ServerNotification};
use crate::workspace::{WorkspaceLocator, WorkspaceRoot};

const HOST_TARGET: &str = "notedown_lsp_host::host";

/// Default bound on synchronous requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(1_000);

/// Tunables for an [`LspHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostSettings {
    /// Bound on requests the caller blocks on.
    pub request_timeout: Duration,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Identity of one attached session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Numeric value of the identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}

/// Live session attached to a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    /// Session identifier; changes when a session is replaced.
    pub id: SessionId,
    /// Root the session serves.
    pub root: WorkspaceRoot,
}

/// Status line for one tracked session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Session identifier.
    pub id: SessionId,
    /// Root the session serves.
    pub root: WorkspaceRoot,
    /// Whether the server can still carry traffic.
    pub running: bool,
    /// Commands the server advertised at attach time.
    pub commands: Vec<String>,
}

struct Session {
    id: SessionId,
    server: Box<dyn LanguageServer>,
    summary: CapabilitySummary,
    diagnostics: HashMap<Uri, Vec<Diagnostic>>,
}

struct CallContext<'a> {
    root: &'a WorkspaceRoot,
    capability: CapabilityKind,
    operation: HostOperation,
}

/// Owns the language server sessions, at most one per root.
pub struct LspHost {
    factory: Box<dyn ServerFactory>,
    notifier: Arc<dyn Notifier>,
    settings: HostSettings,
    sessions: BTreeMap<WorkspaceRoot, Session>,
    next_id: u64,
}

impl fmt::Debug for LspHost {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LspHost")
            .field("settings", &self.settings)
            .field("roots", &self.sessions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl LspHost {
    /// Builds an empty host that starts servers through `factory`.
    #[must_use]
    pub fn new(factory: Box<dyn ServerFactory>, settings: HostSettings) -> Self {
        Self {
            factory,
            notifier: Arc::new(TracingNotifier),
            settings,
            sessions: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Routes user-visible notices to `notifier`.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Active settings.
    #[must_use]
    pub const fn settings(&self) -> HostSettings {
        self.settings
    }

    /// Notice sink shared with the command bridge.
    #[must_use]
    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.notifier)
    }

    /// Returns the live session for `root`, starting one when needed.
    ///
    /// Repeated calls return the same session while its process runs. A
    /// session whose process has exited is replaced. When spawning or the
    /// handshake fails nothing is registered, so a later call retries.
    ///
    /// # Errors
    ///
    /// Returns [`LspHostError::SpawnFailed`] or [`LspHostError::Server`] when
    /// the server cannot be started or initialised.
    pub fn ensure_session(&mut self, root: &WorkspaceRoot) -> Result<SessionHandle, LspHostError> {
        if let Some(session) = self.sessions.get(root) {
            if session.server.is_running() {
                return Ok(SessionHandle {
                    id: session.id,
                    root: root.clone(),
                });
            }
            warn!(
                target: HOST_TARGET,
                root = %root,
                session = %session.id,
                "language server exited; starting a replacement"
            );
            self.sessions.remove(root);
        }

        let session = self.start_session(root).inspect_err(|error| {
            self.notifier.notify(NoticeLevel::Error, &error.to_string());
        })?;
        let handle = SessionHandle {
            id: session.id,
            root: root.clone(),
        };
        self.sessions.insert(root.clone(), session);
        Ok(handle)
    }

    fn start_session(&mut self, root: &WorkspaceRoot) -> Result<Session, LspHostError> {
        debug!(target: HOST_TARGET, root = %root, "starting language server");
        let mut server = self
            .factory
            .spawn(root)
            .map_err(|source| LspHostError::spawn_failed(root, source))?;

        let advertised = match server.initialize(root) {
            Ok(advertised) => advertised,
            Err(source) => {
                if let Err(error) = server.shutdown() {
                    debug!(
                        target: HOST_TARGET,
                        root = %root,
                        error = %error,
                        "cleanup after failed handshake also failed"
                    );
                }
                return Err(LspHostError::server(root, HostOperation::Initialise, source));
            }
        };

        let summary = resolve_capabilities(&advertised);
        let id = SessionId(self.next_id);
        self.next_id += 1;
        info!(
            target: HOST_TARGET,
            root = %root,
            session = %id,
            commands = ?summary.advertised_commands(),
            "language server attached"
        );
        Ok(Session {
            id,
            server,
            summary,
            diagnostics: HashMap::new(),
        })
    }

    /// Eagerly starts a session when `cwd` lies inside a workspace.
    ///
    /// Returns `Ok(None)` outside any workspace.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::ensure_session`] failures.
    pub fn startup(
        &mut self,
        locator: &WorkspaceLocator,
        cwd: &Path,
    ) -> Result<Option<SessionHandle>, LspHostError> {
        match locator.locate_from_dir(cwd) {
            Some(root) => self.ensure_session(&root).map(Some),
            None => {
                debug!(target: HOST_TARGET, cwd = %cwd.display(), "startup outside any workspace");
                Ok(None)
            }
        }
    }

    /// Handle of the live session for `root`, if any.
    #[must_use]
    pub fn session(&self, root: &WorkspaceRoot) -> Option<SessionHandle> {
        self.sessions.get(root).map(|session| SessionHandle {
            id: session.id,
            root: root.clone(),
        })
    }

    /// Capability summary recorded when the session attached.
    #[must_use]
    pub fn capabilities(&self, root: &WorkspaceRoot) -> Option<&CapabilitySummary> {
        self.sessions.get(root).map(|session| &session.summary)
    }

    /// Status of every tracked session, ordered by root.
    #[must_use]
    pub fn sessions(&self) -> Vec<SessionStatus> {
        self.sessions
            .iter()
            .map(|(root, session)| SessionStatus {
                id: session.id,
                root: root.clone(),
                running: session.server.is_running(),
                commands: session.summary.advertised_commands().to_vec(),
            })
            .collect()
    }

    /// Forwards `textDocument/didOpen`.
    ///
    /// # Errors
    ///
    /// Returns [`LspHostError::UnknownSession`] without a session and
    /// [`LspHostError::Server`] when the notification cannot be written.
    pub fn did_open(
        &mut self,
        root: &WorkspaceRoot,
        params: DidOpenTextDocumentParams,
    ) -> Result<(), LspHostError> {
        self.notify_server(root, HostOperation::DidOpen, |server| server.did_open(params))
    }

    /// Forwards `textDocument/didChange`.
    ///
    /// # Errors
    ///
    /// As [`Self::did_open`].
    pub fn did_change(
        &mut self,
        root: &WorkspaceRoot,
        params: DidChangeTextDocumentParams,
    ) -> Result<(), LspHostError> {
        self.notify_server(root, HostOperation::DidChange, |server| {
            server.did_change(params)
        })
    }

    /// Forwards `textDocument/didClose` and forgets the document's
    /// diagnostics.
    ///
    /// # Errors
    ///
    /// As [`Self::did_open`].
    pub fn did_close(
        &mut self,
        root: &WorkspaceRoot,
        params: DidCloseTextDocumentParams,
    ) -> Result<(), LspHostError> {
        if let Some(session) = self.sessions.get_mut(root) {
            session.diagnostics.remove(&params.text_document.uri);
        }
        self.notify_server(root, HostOperation::DidClose, |server| {
            server.did_close(params)
        })
    }

    /// Issues a custom command after checking the session advertises it.
    ///
    /// # Errors
    ///
    /// Returns [`LspHostError::CapabilityUnavailable`] when the command is not
    /// advertised; no request is sent in that case.
    pub fn execute_command(
        &mut self,
        root: &WorkspaceRoot,
        command: NotedownCommand,
        arguments: Vec<Value>,
    ) -> Result<PendingReply, LspHostError> {
        let params = ExecuteCommandParams {
            command: String::from(command.wire_name()),
            arguments,
            work_done_progress_params: lsp_types::WorkDoneProgressParams::default(),
        };
        let context = CallContext {
            root,
            capability: command.capability(),
            operation: HostOperation::ExecuteCommand,
        };
        debug!(target: HOST_TARGET, root = %root, command = %command, "executing command");
        self.request_with_capability(&context, "workspace/executeCommand", &params)
    }

    /// Resolves `textDocument/definition`, waiting up to the request bound.
    ///
    /// # Errors
    ///
    /// Returns [`LspHostError::Reply`] on timeout and
    /// [`LspHostError::InvalidPayload`] for malformed results.
    pub fn goto_definition(
        &mut self,
        root: &WorkspaceRoot,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>, LspHostError> {
        let context = CallContext {
            root,
            capability: CapabilityKind::Definition,
            operation: HostOperation::Definition,
        };
        let reply = self.request_with_capability(&context, "textDocument/definition", &params)?;
        self.wait_for(&context, reply)
    }

    /// Fetches `textDocument/foldingRange`, waiting up to the request bound.
    ///
    /// # Errors
    ///
    /// As [`Self::goto_definition`].
    pub fn folding_ranges(
        &mut self,
        root: &WorkspaceRoot,
        uri: &Uri,
    ) -> Result<Vec<FoldingRange>, LspHostError> {
        let params = FoldingRangeParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
            work_done_progress_params: lsp_types::WorkDoneProgressParams::default(),
            partial_result_params: lsp_types::PartialResultParams::default(),
        };
        let context = CallContext {
            root,
            capability: CapabilityKind::FoldingRange,
            operation: HostOperation::FoldingRange,
        };
        let reply = self.request_with_capability(&context, "textDocument/foldingRange", &params)?;
        let ranges: Option<Vec<FoldingRange>> = self.wait_for(&context, reply)?;
        Ok(ranges.unwrap_or_default())
    }

    /// Requests `textDocument/completion`, waiting up to the request bound.
    ///
    /// Both the array and list result shapes flatten into the items; `null`
    /// yields none.
    ///
    /// # Errors
    ///
    /// As [`Self::goto_definition`].
    pub fn completion(
        &mut self,
        root: &WorkspaceRoot,
        params: CompletionParams,
    ) -> Result<Vec<CompletionItem>, LspHostError> {
        let context = CallContext {
            root,
            capability: CapabilityKind::Completion,
            operation: HostOperation::Completion,
        };
        let reply = self.request_with_capability(&context, "textDocument/completion", &params)?;
        let items = match self.wait_for(&context, reply)? {
            Some(CompletionResponse::Array(items)) => items,
            Some(CompletionResponse::List(list)) => list.items,
            None => Vec::new(),
        };
        Ok(items)
    }

    /// Requests `textDocument/codeAction`, waiting up to the request bound.
    ///
    /// # Errors
    ///
    /// As [`Self::goto_definition`].
    pub fn code_actions(
        &mut self,
        root: &WorkspaceRoot,
        params: CodeActionParams,
    ) -> Result<Vec<CodeActionOrCommand>, LspHostError> {
        let context = CallContext {
            root,
            capability: CapabilityKind::CodeAction,
            operation: HostOperation::CodeAction,
        };
        let reply = self.request_with_capability(&context, "textDocument/codeAction", &params)?;
        let actions: Option<Vec<CodeActionOrCommand>> = self.wait_for(&context, reply)?;
        Ok(actions.unwrap_or_default())
    }

    /// Latest diagnostics published for `uri`.
    #[must_use]
    pub fn diagnostics(&self, root: &WorkspaceRoot, uri: &Uri) -> Vec<Diagnostic> {
        self.sessions
            .get(root)
            .and_then(|session| session.diagnostics.get(uri))
            .cloned()
            .unwrap_or_default()
    }

    /// Processes notifications the servers pushed since the last call.
    ///
    /// Diagnostics are stored per document, `window/showMessage` goes to the
    /// notifier and log messages are traced. Returns the number handled.
    pub fn pump_notifications(&mut self) -> usize {
        let mut handled = 0;
        for (root, session) in &mut self.sessions {
            for notification in session.server.drain_notifications() {
                handled += 1;
                route_notification(root, session, self.notifier.as_ref(), notification);
            }
        }
        handled
    }

    /// Shuts down every session and clears the registry.
    ///
    /// Returns the number of sessions stopped. Failures are logged; the
    /// registry is cleared regardless.
    pub fn reload(&mut self) -> usize {
        let sessions = std::mem::take(&mut self.sessions);
        let count = sessions.len();
        for (root, mut session) in sessions {
            info!(target: HOST_TARGET, root = %root, session = %session.id, "stopping language server");
            if let Err(source) = session.server.shutdown() {
                let error = LspHostError::server(&root, HostOperation::Shutdown, source);
                warn!(target: HOST_TARGET, error = %error, "shutdown failed");
            }
        }
        count
    }

    fn session_mut(&mut self, root: &WorkspaceRoot) -> Result<&mut Session, LspHostError> {
        self.sessions
            .get_mut(root)
            .ok_or_else(|| LspHostError::unknown(root))
    }

    fn notify_server<F>(
        &mut self,
        root: &WorkspaceRoot,
        operation: HostOperation,
        call: F,
    ) -> Result<(), LspHostError>
    where
        F: FnOnce(&mut dyn LanguageServer) -> Result<(), LanguageServerError>,
    {
        let session = self.session_mut(root)?;
        call(session.server.as_mut()).map_err(|source| LspHostError::server(root, operation, source))
    }

    fn request_with_capability<P>(
        &mut self,
        context: &CallContext<'_>,
        method: &str,
        params: &P,
    ) -> Result<PendingReply, LspHostError>
    where
        P: serde::Serialize,
    {
        let session = self.session_mut(context.root)?;
        let state = session.summary.state(context.capability);
        if !state.enabled {
            debug!(
                target: HOST_TARGET,
                root = %context.root,
                capability = %context.capability,
                reason = %state.source,
                "capability unavailable; request not sent"
            );
            return Err(LspHostError::capability_unavailable(
                context.root,
                context.capability,
                state.source,
            ));
        }

        let params = serde_json::to_value(params)
            .map_err(|error| LspHostError::invalid_payload(context.operation, &error))?;
        session
            .server
            .request(method, params)
            .map_err(|source| LspHostError::server(context.root, context.operation, source))
    }

    fn wait_for<T>(
        &self,
        context: &CallContext<'_>,
        reply: PendingReply,
    ) -> Result<Option<T>, LspHostError>
    where
        T: DeserializeOwned,
    {
        let value = reply
            .wait(self.settings.request_timeout)
            .map_err(|source| LspHostError::reply(context.root, context.operation, source))?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|error| LspHostError::invalid_payload(context.operation, &error))
    }
}

fn route_notification(
    root: &WorkspaceRoot,
    session: &mut Session,
    notifier: &dyn Notifier,
    notification: ServerNotification,
) {
    match notification.method.as_str() {
        "textDocument/publishDiagnostics" => {
            match serde_json::from_value::<PublishDiagnosticsParams>(notification.params) {
                Ok(params) => {
                    debug!(
                        target: HOST_TARGET,
                        root = %root,
                        uri = params.uri.as_str(),
                        count = params.diagnostics.len(),
                        "diagnostics published"
                    );
                    session.diagnostics.insert(params.uri, params.diagnostics);
                }
                Err(error) => warn!(target: HOST_TARGET, error = %error, "malformed diagnostics"),
            }
        }
        "window/showMessage" => match serde_json::from_value::<ShowMessageParams>(notification.params)
        {
            Ok(params) => notifier.notify(notice_level(params.typ), &params.message),
            Err(error) => warn!(target: HOST_TARGET, error = %error, "malformed showMessage"),
        },
        "window/logMessage" => {
            let message = notification
                .params
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            debug!(target: HOST_TARGET, root = %root, "server: {message}");
        }
        other => trace!(target: HOST_TARGET, method = other, "ignoring notification"),
    }
}

fn notice_level(kind: MessageType) -> NoticeLevel {
    if kind == MessageType::ERROR {
        NoticeLevel::Error
    } else if kind == MessageType::WARNING {
        NoticeLevel::Warn
    } else {
        NoticeLevel::Info
    }
}
