//! Translation between Notedown's custom commands and typed results.
//!
//! The boundary query blocks for at most the host's request timeout because
//! the editor needs its answer before continuing. Conceal and code execution
//! replies are collected by [`CommandBridge::poll`] on a later turn of the
//! editor loop. Every failure degrades to an empty result plus a notice.

use std::collections::HashMap;
use std::sync::Arc;

use lsp_types::{Position, Uri, WorkspaceEdit};
use tracing::{debug, warn};

use crate::command::{
    ConcealRange, ListItemBoundaries, NotedownCommand, code_execution_arguments,
    conceal_arguments, list_item_arguments, parse_conceal_ranges, parse_workspace_edit,
};
use crate::errors::LspHostError;
use crate::host::LspHost;
use crate::notice::{NoticeLevel, Notifier};
use crate::reply::{PendingReply, ReplyError};
use crate::workspace::WorkspaceRoot;

const BRIDGE_TARGET: &str = "notedown_lsp_host::bridge";

/// A completed asynchronous command.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeReply {
    /// Conceal ranges computed for `version` of the document.
    ConcealRanges {
        /// Document the ranges belong to.
        uri: Uri,
        /// Document version the request was issued for.
        version: i32,
        /// Ranges returned by the server.
        ranges: Vec<ConcealRange>,
    },
    /// Output of executed code blocks.
    CodeBlocksExecuted {
        /// Document whose blocks ran.
        uri: Uri,
        /// Edit inserting the output; empty when there is nothing to apply.
        edit: WorkspaceEdit,
    },
}

struct PendingConceal {
    version: i32,
    reply: PendingReply,
}

struct PendingExecution {
    uri: Uri,
    reply: PendingReply,
}

/// Issues Notedown commands through an [`LspHost`] it owns.
pub struct CommandBridge {
    host: LspHost,
    notifier: Arc<dyn Notifier>,
    conceal: HashMap<Uri, PendingConceal>,
    executions: Vec<PendingExecution>,
}

impl std::fmt::Debug for CommandBridge {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CommandBridge")
            .field("host", &self.host)
            .field("pending_conceal", &self.conceal.len())
            .field("pending_executions", &self.executions.len())
            .finish_non_exhaustive()
    }
}

impl CommandBridge {
    /// Wraps `host`; notices go to the host's notifier.
    #[must_use]
    pub fn new(host: LspHost) -> Self {
        let notifier = host.notifier();
        Self {
            host,
            notifier,
            conceal: HashMap::new(),
            executions: Vec::new(),
        }
    }

    /// Session registry.
    #[must_use]
    pub fn host(&self) -> &LspHost {
        &self.host
    }

    /// Mutable session registry.
    pub fn host_mut(&mut self) -> &mut LspHost {
        &mut self.host
    }

    /// Boundaries of the list item at `position`, blocking up to the request
    /// timeout.
    ///
    /// Timeouts, unsupported commands and malformed payloads yield
    /// [`ListItemBoundaries::not_found`] together with a notice.
    pub fn list_item_boundaries(
        &mut self,
        root: &WorkspaceRoot,
        uri: &Uri,
        position: Position,
    ) -> ListItemBoundaries {
        let command = NotedownCommand::ListItemBoundaries;
        let Some(reply) = self.dispatch(root, command, list_item_arguments(uri, position)) else {
            return ListItemBoundaries::not_found();
        };

        match reply.wait(self.host.settings().request_timeout) {
            Ok(value) => ListItemBoundaries::from_value(value).unwrap_or_else(|error| {
                self.notify(
                    NoticeLevel::Warn,
                    &format!("{command} returned a malformed result: {error}"),
                );
                ListItemBoundaries::not_found()
            }),
            Err(error @ ReplyError::TimedOut { .. }) => {
                self.notify(NoticeLevel::Warn, &format!("list item lookup failed: {error}"));
                ListItemBoundaries::not_found()
            }
            Err(error) => {
                self.notify(NoticeLevel::Error, &format!("list item lookup failed: {error}"));
                ListItemBoundaries::not_found()
            }
        }
    }

    /// Requests conceal ranges for `version` of the document.
    ///
    /// A newer request for the same document replaces an older one still in
    /// flight. Returns whether a request was sent.
    pub fn request_conceal_ranges(&mut self, root: &WorkspaceRoot, uri: &Uri, version: i32) -> bool {
        let Some(reply) = self.dispatch(root, NotedownCommand::ConcealRanges, conceal_arguments(uri))
        else {
            return false;
        };
        if let Some(previous) = self.conceal.insert(uri.clone(), PendingConceal { version, reply }) {
            debug!(
                target: BRIDGE_TARGET,
                uri = uri.as_str(),
                superseded = previous.version,
                version,
                "conceal request superseded"
            );
        }
        true
    }

    /// Requests execution of the document's code blocks, optionally only
    /// those tagged `language`. Returns whether a request was sent.
    pub fn request_code_execution(
        &mut self,
        root: &WorkspaceRoot,
        uri: &Uri,
        language: Option<&str>,
    ) -> bool {
        let arguments = code_execution_arguments(uri, language);
        let Some(reply) = self.dispatch(root, NotedownCommand::ExecuteCodeBlocks, arguments) else {
            return false;
        };
        self.executions.push(PendingExecution {
            uri: uri.clone(),
            reply,
        });
        true
    }

    /// Collects asynchronous replies that have arrived.
    pub fn poll(&mut self) -> Vec<BridgeReply> {
        let mut replies = Vec::new();
        let notifier = Arc::clone(&self.notifier);

        self.conceal.retain(|uri, pending| {
            let Some(outcome) = pending.reply.poll() else {
                return true;
            };
            match outcome {
                Ok(value) => {
                    let ranges = parse_conceal_ranges(value).unwrap_or_else(|error| {
                        warn!(
                            target: BRIDGE_TARGET,
                            uri = uri.as_str(),
                            error = %error,
                            "malformed conceal ranges"
                        );
                        Vec::new()
                    });
                    replies.push(BridgeReply::ConcealRanges {
                        uri: uri.clone(),
                        version: pending.version,
                        ranges,
                    });
                }
                Err(error) => {
                    notifier.notify(NoticeLevel::Warn, &format!("conceal refresh failed: {error}"));
                }
            }
            false
        });

        self.executions.retain_mut(|pending| {
            let Some(outcome) = pending.reply.poll() else {
                return true;
            };
            match outcome {
                Ok(value) => {
                    let edit = parse_workspace_edit(value).unwrap_or_else(|error| {
                        notifier.notify(
                            NoticeLevel::Warn,
                            &format!("code execution returned a malformed edit: {error}"),
                        );
                        WorkspaceEdit::default()
                    });
                    replies.push(BridgeReply::CodeBlocksExecuted {
                        uri: pending.uri.clone(),
                        edit,
                    });
                }
                Err(error) => {
                    notifier.notify(NoticeLevel::Error, &format!("code execution failed: {error}"));
                }
            }
            false
        });

        replies
    }

    /// Whether any asynchronous request is still in flight.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.conceal.is_empty() || !self.executions.is_empty()
    }

    /// Forgets in-flight requests for a document that is going away.
    pub fn forget(&mut self, uri: &Uri) {
        self.conceal.remove(uri);
        self.executions.retain(|pending| &pending.uri != uri);
    }

    /// Drops every in-flight request and shuts down all sessions.
    ///
    /// Returns the number of sessions stopped.
    pub fn reload(&mut self) -> usize {
        self.conceal.clear();
        self.executions.clear();
        self.host.reload()
    }

    fn dispatch(
        &mut self,
        root: &WorkspaceRoot,
        command: NotedownCommand,
        arguments: Vec<serde_json::Value>,
    ) -> Option<PendingReply> {
        match self.host.execute_command(root, command, arguments) {
            Ok(reply) => Some(reply),
            Err(LspHostError::CapabilityUnavailable { reason, .. }) => {
                self.notify(
                    NoticeLevel::Warn,
                    &format!("{command} is not supported by the server ({reason})"),
                );
                None
            }
            Err(error) => {
                self.notify(NoticeLevel::Error, &error.to_string());
                None
            }
        }
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notifier.notify(level, message);
    }
}
