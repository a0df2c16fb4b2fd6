//! Process-based language server adapter implementing the `LanguageServer` trait.

use std::io::{BufReader, BufWriter};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    InitializeResult,
};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::ADAPTER_TARGET;
use super::config::LspServerConfig;
use super::error::AdapterError;
use super::inbox::{Inbox, read_loop};
use super::jsonrpc::{JsonRpcNotification, JsonRpcRequest};
use super::lifecycle::{kill, terminate_child};
use super::state::{ProcessState, SharedWriter};
use super::transport::{FramedReader, FramedWriter};
use crate::reply::PendingReply;
use crate::server::{
    LanguageServer, LanguageServerError, ServerCapabilitySet, ServerNotification,
};
use crate::workspace::WorkspaceRoot;

/// Bound on the `initialize` handshake; servers index the workspace first.
const INITIALIZE_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound on the `shutdown` request before the process is stopped anyway.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// A language server running as a child process.
pub struct ProcessLanguageServer {
    root: WorkspaceRoot,
    inbox: Arc<Inbox>,
    state: ProcessState,
}

impl ProcessLanguageServer {
    /// Spawns the configured command for `root` and starts its reader thread.
    ///
    /// The process runs with `root` as its working directory unless the
    /// configuration names another one; its stderr is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::BinaryNotFound`] when the command does not
    /// exist and [`AdapterError::SpawnFailed`] for other launch failures.
    pub fn spawn(config: &LspServerConfig, root: &WorkspaceRoot) -> Result<Self, AdapterError> {
        let working_dir = config
            .working_dir
            .clone()
            .unwrap_or_else(|| root.path().to_path_buf());
        debug!(
            target: ADAPTER_TARGET,
            root = %root,
            command = %config.command.display(),
            args = ?config.args,
            "spawning language server process"
        );

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .current_dir(&working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    AdapterError::BinaryNotFound {
                        command: config.command.display().to_string(),
                        source,
                    }
                } else {
                    AdapterError::SpawnFailed {
                        message: format!("failed to start {}", config.command.display()),
                        source,
                    }
                }
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            kill(&mut child, root);
            return Err(AdapterError::SpawnFailed {
                message: String::from("failed to capture stdio"),
                source: std::io::Error::other("missing pipe"),
            });
        };

        let writer: SharedWriter = Arc::new(Mutex::new(FramedWriter::new(BufWriter::new(stdin))));
        let inbox = Arc::new(Inbox::new());
        let reader = {
            let inbox = Arc::clone(&inbox);
            let writer = Arc::clone(&writer);
            thread::Builder::new()
                .name(format!("notedown-lsp-reader-{}", child.id()))
                .spawn(move || read_loop(FramedReader::new(BufReader::new(stdout)), &inbox, &writer))
        };
        let reader = match reader {
            Ok(reader) => reader,
            Err(source) => {
                kill(&mut child, root);
                return Err(AdapterError::SpawnFailed {
                    message: String::from("failed to start reader thread"),
                    source,
                });
            }
        };

        debug!(
            target: ADAPTER_TARGET,
            root = %root,
            pid = child.id(),
            "language server process spawned"
        );

        Ok(Self {
            root: root.clone(),
            inbox,
            state: ProcessState::Running {
                child,
                writer,
                reader,
            },
        })
    }

    /// Root the process serves.
    #[must_use]
    pub fn root(&self) -> &WorkspaceRoot {
        &self.root
    }

    fn writer(&self) -> Result<&SharedWriter, AdapterError> {
        match &self.state {
            ProcessState::Running { writer, .. } if self.inbox.is_alive() => Ok(writer),
            ProcessState::Running { .. } | ProcessState::Stopped => Err(AdapterError::ProcessExited),
        }
    }

    fn write(&self, payload: &[u8]) -> Result<(), AdapterError> {
        let writer = self.writer()?;
        let mut writer = writer.lock().unwrap_or_else(|poison| poison.into_inner());
        writer.send(payload)?;
        Ok(())
    }

    fn send_request(&self, method: &str, params: Value) -> Result<PendingReply, AdapterError> {
        let request = JsonRpcRequest::new(method, params);
        let payload = serde_json::to_vec(&request)?;
        let (sender, reply) = PendingReply::channel(method);
        self.inbox.register(request.id, sender);

        debug!(target: ADAPTER_TARGET, method, id = request.id, "sending request");
        if let Err(error) = self.write(&payload) {
            self.inbox.cancel(request.id);
            return Err(error);
        }
        Ok(reply)
    }

    fn send_notification(&self, method: &str, params: Value) -> Result<(), AdapterError> {
        let payload = serde_json::to_vec(&JsonRpcNotification::new(method, params))?;
        debug!(target: ADAPTER_TARGET, method, "sending notification");
        self.write(&payload)
    }

    fn notify_server<P: serde::Serialize>(
        &self,
        method: &str,
        params: P,
    ) -> Result<(), LanguageServerError> {
        serde_json::to_value(params)
            .map_err(AdapterError::from)
            .and_then(|params| self.send_notification(method, params))
            .map_err(|error| LanguageServerError::with_source(format!("{method} failed"), error))
    }

    fn handshake(&self) -> Result<ServerCapabilitySet, AdapterError> {
        let root_uri = self
            .root
            .uri()
            .map_err(|error| AdapterError::InitializationFailed {
                message: error.to_string(),
            })?;
        let params = json!({
            "processId": std::process::id(),
            "clientInfo": { "name": "notedown-client", "version": env!("CARGO_PKG_VERSION") },
            "rootUri": root_uri.as_str(),
            "workspaceFolders": [{ "uri": root_uri.as_str(), "name": self.root.name() }],
            "capabilities": {
                "textDocument": {
                    "synchronization": { "dynamicRegistration": false },
                    "definition": { "linkSupport": false },
                    "foldingRange": { "lineFoldingOnly": true },
                    "publishDiagnostics": {}
                },
                "workspace": {
                    "executeCommand": { "dynamicRegistration": false },
                    "workspaceEdit": { "documentChanges": true },
                    "workspaceFolders": true
                },
                "window": { "showMessage": {} }
            }
        });

        let value = self
            .send_request("initialize", params)?
            .wait(INITIALIZE_TIMEOUT)
            .map_err(|error| AdapterError::InitializationFailed {
                message: error.to_string(),
            })?;
        let result: InitializeResult = serde_json::from_value(value)?;
        self.send_notification("initialized", json!({}))?;

        let capabilities = ServerCapabilitySet::from_server_capabilities(&result.capabilities);
        debug!(
            target: ADAPTER_TARGET,
            root = %self.root,
            commands = ?capabilities.commands().collect::<Vec<_>>(),
            folding_range = capabilities.supports_folding_range(),
            definition = capabilities.supports_definition(),
            "language server initialized with capabilities"
        );
        Ok(capabilities)
    }
}

impl LanguageServer for ProcessLanguageServer {
    fn initialize(
        &mut self,
        root: &WorkspaceRoot,
    ) -> Result<ServerCapabilitySet, LanguageServerError> {
        if root != &self.root {
            return Err(LanguageServerError::new(format!(
                "process for {} cannot serve {root}",
                self.root
            )));
        }
        self.handshake()
            .map_err(|error| LanguageServerError::with_source("initialization handshake failed", error))
    }

    fn did_open(&mut self, params: DidOpenTextDocumentParams) -> Result<(), LanguageServerError> {
        self.notify_server("textDocument/didOpen", params)
    }

    fn did_change(
        &mut self,
        params: DidChangeTextDocumentParams,
    ) -> Result<(), LanguageServerError> {
        self.notify_server("textDocument/didChange", params)
    }

    fn did_close(&mut self, params: DidCloseTextDocumentParams) -> Result<(), LanguageServerError> {
        self.notify_server("textDocument/didClose", params)
    }

    fn request(&mut self, method: &str, params: Value) -> Result<PendingReply, LanguageServerError> {
        self.send_request(method, params)
            .map_err(|error| LanguageServerError::with_source(format!("{method} request failed"), error))
    }

    fn drain_notifications(&mut self) -> Vec<ServerNotification> {
        self.inbox.drain_notifications()
    }

    /// Sends `shutdown` followed by `exit`, then waits for the process to
    /// terminate.
    fn shutdown(&mut self) -> Result<(), LanguageServerError> {
        debug!(target: ADAPTER_TARGET, root = %self.root, "initiating graceful shutdown");

        match self.send_request("shutdown", Value::Null) {
            Ok(reply) => {
                if let Err(error) = reply.wait(SHUTDOWN_TIMEOUT) {
                    debug!(target: ADAPTER_TARGET, root = %self.root, error = %error, "shutdown request failed");
                }
            }
            Err(error) => {
                debug!(target: ADAPTER_TARGET, root = %self.root, error = %error, "shutdown request failed");
            }
        }
        if let Err(error) = self.send_notification("exit", Value::Null) {
            debug!(target: ADAPTER_TARGET, root = %self.root, error = %error, "exit notification failed");
        }

        if let ProcessState::Running {
            mut child,
            writer,
            reader,
        } = std::mem::replace(&mut self.state, ProcessState::Stopped)
        {
            drop(writer);
            terminate_child(&mut child, &self.root);
            join_reader(reader, &self.root);
        }
        self.inbox.close();
        Ok(())
    }

    fn is_running(&self) -> bool {
        matches!(self.state, ProcessState::Running { .. }) && self.inbox.is_alive()
    }
}

fn join_reader(reader: thread::JoinHandle<()>, root: &WorkspaceRoot) {
    if reader.join().is_err() {
        warn!(target: ADAPTER_TARGET, root = %root, "reader thread panicked");
    }
}

impl Drop for ProcessLanguageServer {
    fn drop(&mut self) {
        if let ProcessState::Running { mut child, .. } =
            std::mem::replace(&mut self.state, ProcessState::Stopped)
        {
            stop_on_drop(&mut child, &self.root);
        }
    }
}

fn stop_on_drop(child: &mut Child, root: &WorkspaceRoot) {
    if let Ok(Some(_)) = child.try_wait() {
        return;
    }
    kill(child, root);
}

impl std::fmt::Debug for ProcessLanguageServer {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ProcessLanguageServer")
            .field("root", &self.root)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
