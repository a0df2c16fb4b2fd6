//! Shared world for editor scenarios.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lsp_types::Uri;
use notedown_lsp_host::test_support::{
    ScriptedFactory, ScriptedFactoryHandle, ScriptedResponse, ScriptedServer, ScriptedServerHandle,
};
use notedown_lsp_host::{CollectingNotifier, HostSettings, LspHost, NotedownCommand};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::clock::ManualClock;
use crate::coordinator::{Notedown, TickReport};
use crate::selection::LineSelection;
use crate::settings::EditorSettings;

pub(crate) const DEBOUNCE: Duration = Duration::from_millis(300);

pub(crate) const NESTED_LIST: &str = "- alpha\n  - alpha child\n- beta\n- gamma\n";

pub(crate) const WIKILINK: &str = "see [[target|label]]\n";

pub(crate) const CODE_BLOCK: &str = "```sh\necho hi\n```\n";

/// Answers the scripted server computes from test-controlled data.
#[derive(Default)]
struct Script {
    boundaries: HashMap<u32, (u32, u32)>,
    execution: Option<(u32, String)>,
}

type SharedScript = Arc<Mutex<Script>>;

/// Editor coordinator over scripted servers in a temporary workspace.
pub(crate) struct EditorWorld {
    pub(crate) workspace: TempDir,
    pub(crate) notedown: Notedown,
    pub(crate) factory: ScriptedFactoryHandle,
    pub(crate) notifier: CollectingNotifier,
    pub(crate) clock: ManualClock,
    pub(crate) uri: Option<Uri>,
    pub(crate) selection: Option<LineSelection>,
    pub(crate) cursor: Option<u32>,
    pub(crate) report: TickReport,
    script: SharedScript,
}

impl EditorWorld {
    pub(crate) fn new(builder: impl Fn() -> ScriptedServer + Send + 'static) -> Self {
        let workspace = TempDir::new().expect("temp dir");
        fs::create_dir_all(workspace.path().join(".notedown")).expect("marker");

        let script: SharedScript = Arc::new(Mutex::new(Script::default()));
        let shared = Arc::clone(&script);
        let factory = ScriptedFactory::new(move || {
            let shared = Arc::clone(&shared);
            builder().with_responder(move |key, params| respond(&shared, key, params))
        });
        let handle = factory.handle();
        let notifier = CollectingNotifier::new();
        let host = LspHost::new(
            Box::new(factory),
            HostSettings {
                request_timeout: Duration::from_millis(50),
            },
        )
        .with_notifier(Arc::new(notifier.clone()));
        let clock = ManualClock::new();
        let settings = EditorSettings {
            conceal_debounce: DEBOUNCE,
            ..EditorSettings::default()
        };
        let notedown = Notedown::new(host, &settings).with_clock(Arc::new(clock.clone()));

        Self {
            workspace,
            notedown,
            factory: handle,
            notifier,
            clock,
            uri: None,
            selection: None,
            cursor: None,
            report: TickReport::default(),
            script,
        }
    }

    /// Path of a file inside the workspace.
    pub(crate) fn workspace_file(&self, name: &str) -> PathBuf {
        self.workspace.path().join(name)
    }

    /// Opens `text` as `name` inside the workspace.
    pub(crate) fn open(&mut self, name: &str, text: &str) -> Uri {
        let path = self.workspace_file(name);
        fs::write(&path, text).expect("write document");
        let uri = self
            .notedown
            .open_document(&path, String::from(text))
            .expect("open document");
        self.uri = Some(uri.clone());
        uri
    }

    pub(crate) fn uri(&self) -> Uri {
        self.uri.clone().expect("no document opened")
    }

    pub(crate) fn text(&self) -> String {
        let uri = self.uri();
        String::from(
            self.notedown
                .document(&uri)
                .expect("document is open")
                .text(),
        )
    }

    pub(crate) fn server(&self) -> ScriptedServerHandle {
        self.factory.last_server().expect("a server was spawned")
    }

    /// Makes the server answer a boundary query at `line` with `start..end`.
    pub(crate) fn item(&self, line: u32, start: u32, end: u32) {
        self.script
            .lock()
            .expect("script")
            .boundaries
            .insert(line, (start, end));
    }

    /// Makes code execution insert `output` at the start of `line`.
    pub(crate) fn execution_output(&self, line: u32, output: &str) {
        self.script.lock().expect("script").execution = Some((line, String::from(output)));
    }

    /// Boundaries of every item in [`NESTED_LIST`].
    pub(crate) fn nested_list_items(&self) {
        self.item(0, 0, 2);
        self.item(1, 1, 2);
        self.item(2, 2, 3);
        self.item(3, 3, 4);
    }

    /// Lets the debounce window pass and runs one loop turn.
    pub(crate) fn elapse_debounce(&mut self) {
        self.clock.advance(DEBOUNCE);
        self.report = self.notedown.tick();
    }
}

impl Default for EditorWorld {
    fn default() -> Self {
        Self::new(ScriptedServer::full)
    }
}

fn respond(script: &SharedScript, key: &str, params: &Value) -> Option<ScriptedResponse> {
    let script = script.lock().unwrap_or_else(|poison| poison.into_inner());
    if key == NotedownCommand::ListItemBoundaries.wire_name() {
        let line = params
            .pointer("/arguments/1/line")
            .and_then(Value::as_u64)
            .and_then(|line| u32::try_from(line).ok());
        let payload = match line.and_then(|line| script.boundaries.get(&line)) {
            Some((start, end)) => json!({
                "found": true,
                "start": {"line": start, "character": 0},
                "end": {"line": end, "character": 0}
            }),
            None => json!({"found": false}),
        };
        return Some(ScriptedResponse::Value(payload));
    }
    if key == NotedownCommand::ExecuteCodeBlocks.wire_name() {
        let (line, output) = script.execution.as_ref()?;
        let uri = params.pointer("/arguments/0").and_then(Value::as_str)?;
        let position = json!({"line": line, "character": 0});
        return Some(ScriptedResponse::Value(json!({
            "changes": {
                uri: [{"range": {"start": position, "end": position}, "newText": output}]
            }
        })));
    }
    None
}

pub(crate) fn concealing_server() -> ScriptedServer {
    ScriptedServer::full().respond(
        NotedownCommand::ConcealRanges.wire_name(),
        ScriptedResponse::Value(json!([
            {
                "range": {"start": {"line": 0, "character": 6}, "end": {"line": 0, "character": 12}},
                "kind": "wikilink-target"
            },
            {
                "range": {"start": {"line": 0, "character": 0}, "end": {"line": 0, "character": 3}},
                "kind": "emphasis"
            }
        ])),
    )
}

pub(crate) fn stalling_conceal_server() -> ScriptedServer {
    ScriptedServer::full().respond(
        NotedownCommand::ConcealRanges.wire_name(),
        ScriptedResponse::Stall,
    )
}
