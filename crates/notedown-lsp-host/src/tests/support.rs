//! Shared world for host and bridge scenarios.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use lsp_types::Uri;
use serde_json::json;

use crate::bridge::{BridgeReply, CommandBridge};
use crate::command::{ListItemBoundaries, NotedownCommand};
use crate::errors::LspHostError;
use crate::host::{HostSettings, LspHost, SessionHandle};
use crate::notice::{CollectingNotifier, NoticeLevel};
use crate::server::ServerCapabilitySet;
use crate::test_support::{ScriptedFactory, ScriptedFactoryHandle, ScriptedResponse, ScriptedServer};
use crate::workspace::WorkspaceRoot;

/// Bound used by scenarios that exercise timeouts.
pub(crate) const TEST_TIMEOUT: Duration = Duration::from_millis(50);

pub(crate) fn notes_root() -> WorkspaceRoot {
    WorkspaceRoot::new("/workspace/notes")
}

pub(crate) fn journal_root() -> WorkspaceRoot {
    WorkspaceRoot::new("/workspace/journal")
}

pub(crate) fn sample_uri() -> Uri {
    Uri::from_str("file:///workspace/notes/todo.md").expect("invalid test URI")
}

/// Names a root in step text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RootName {
    Notes,
    Journal,
}

impl FromStr for RootName {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "notes" => Ok(Self::Notes),
            "journal" => Ok(Self::Journal),
            other => Err(format!("unknown root '{other}'")),
        }
    }
}

impl RootName {
    pub(crate) fn root(self) -> WorkspaceRoot {
        match self {
            Self::Notes => notes_root(),
            Self::Journal => journal_root(),
        }
    }
}

pub(crate) struct TestWorld {
    pub(crate) bridge: CommandBridge,
    pub(crate) factory: ScriptedFactoryHandle,
    pub(crate) notifier: CollectingNotifier,
    pub(crate) last_session: Option<Result<SessionHandle, LspHostError>>,
    pub(crate) first_handle: Option<SessionHandle>,
    pub(crate) boundaries: Option<ListItemBoundaries>,
    pub(crate) replies: Vec<BridgeReply>,
}

impl TestWorld {
    pub(crate) fn new(builder: impl Fn() -> ScriptedServer + Send + 'static) -> Self {
        let factory = ScriptedFactory::new(builder);
        let handle = factory.handle();
        let notifier = CollectingNotifier::new();
        let host = LspHost::new(
            Box::new(factory),
            HostSettings {
                request_timeout: TEST_TIMEOUT,
            },
        )
        .with_notifier(Arc::new(notifier.clone()));
        Self {
            bridge: CommandBridge::new(host),
            factory: handle,
            notifier,
            last_session: None,
            first_handle: None,
            boundaries: None,
            replies: Vec::new(),
        }
    }

    pub(crate) fn host(&mut self) -> &mut LspHost {
        self.bridge.host_mut()
    }

    pub(crate) fn ensure(&mut self, root: &WorkspaceRoot) {
        let result = self.host().ensure_session(root);
        if let Ok(handle) = &result {
            if self.first_handle.is_none() {
                self.first_handle = Some(handle.clone());
            }
        }
        self.last_session = Some(result);
    }

    pub(crate) fn has_notice(&self, level: NoticeLevel) -> bool {
        self.notifier
            .notices()
            .iter()
            .any(|notice| notice.level == level)
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new(ScriptedServer::full)
    }
}

pub(crate) fn boundaries_payload(start: u32, end: u32) -> serde_json::Value {
    json!({
        "found": true,
        "start": {"line": start, "character": 0},
        "end": {"line": end, "character": 0}
    })
}

pub(crate) fn no_commands() -> ScriptedServer {
    ScriptedServer::new(ServerCapabilitySet::new().with_folding_range(true))
}

pub(crate) fn stalling(command: NotedownCommand) -> impl Fn() -> ScriptedServer + Send + 'static {
    move || ScriptedServer::full().respond(command.wire_name(), ScriptedResponse::Stall)
}
