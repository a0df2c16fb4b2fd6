//! Harness for driving the client against scripted servers.

use std::ffi::OsString;
use std::fs;
use std::io::{self, BufRead, Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notedown_config::Config;
use notedown_editor::{EditorSettings, Notedown};
use notedown_lsp_host::test_support::{
    ScriptedFactory, ScriptedFactoryHandle, ScriptedResponse, ScriptedServer,
};
use notedown_lsp_host::{CollectingNotifier, HostSettings, LspHost, NotedownCommand};
use rstest::fixture;
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::workbench::Workbench;
use crate::{AppError, ConfigLoader};

/// Three top-level items, one line each.
pub(super) const FLAT_LIST: &str = "- one\n- two\n- three\n";

pub(super) const CODE_BLOCK: &str = "```sh\necho hi\n```\n";

pub(super) const EXECUTION_OUTPUT: &str = "```output\nhi\n```\n";

pub(super) struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    pub(super) fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        self.config.validate()?;
        Ok(self.config.clone())
    }
}

pub(super) fn args(values: &[&str]) -> Vec<OsString> {
    std::iter::once("notedown-client")
        .chain(values.iter().copied())
        .map(OsString::from)
        .collect()
}

/// A workbench over scripted servers rooted in a temporary workspace.
pub(super) struct Bench {
    pub(super) workspace: TempDir,
    pub(super) workbench: Workbench,
    pub(super) factory: ScriptedFactoryHandle,
    pub(super) out: Vec<u8>,
    pub(super) err: Vec<u8>,
}

impl Bench {
    pub(super) fn file(&self, name: &str, text: &str) -> PathBuf {
        let path = self.workspace.path().join(name);
        fs::write(&path, text).expect("write document");
        path
    }

    pub(super) fn read(&self, name: &str) -> String {
        fs::read_to_string(self.workspace.path().join(name)).expect("read document")
    }

    pub(super) fn stdout(&self) -> String {
        String::from_utf8(self.out.clone()).expect("stdout utf8")
    }

    pub(super) fn stderr(&self) -> String {
        String::from_utf8(self.err.clone()).expect("stderr utf8")
    }
}

#[fixture]
pub(super) fn bench() -> Bench {
    bench_with(ScriptedServer::full)
}

pub(super) fn bench_with(builder: impl Fn() -> ScriptedServer + Send + 'static) -> Bench {
    let workspace = TempDir::new().expect("temp dir");
    fs::create_dir_all(workspace.path().join(".notedown")).expect("marker");

    let factory = ScriptedFactory::new(move || builder().with_responder(respond));
    let handle = factory.handle();
    let notices = CollectingNotifier::new();
    let host = LspHost::new(
        Box::new(factory),
        HostSettings {
            request_timeout: Duration::from_millis(200),
        },
    )
    .with_notifier(Arc::new(notices.clone()));
    let notedown = Notedown::new(host, &EditorSettings::default());
    let workbench = Workbench::new(
        notedown,
        notices,
        workspace.path().to_path_buf(),
        Duration::from_millis(200),
    );

    Bench {
        workspace,
        workbench,
        factory: handle,
        out: Vec::new(),
        err: Vec::new(),
    }
}

/// Interactive input that records how many servers had been spawned when
/// the loop first asked for a line.
pub(super) struct WatchedInput {
    inner: Cursor<Vec<u8>>,
    factory: ScriptedFactoryHandle,
    pub(super) spawned_before_first_read: Option<usize>,
}

impl WatchedInput {
    pub(super) fn new(script: &str, factory: ScriptedFactoryHandle) -> Self {
        Self {
            inner: Cursor::new(script.as_bytes().to_vec()),
            factory,
            spawned_before_first_read: None,
        }
    }

    fn observe(&mut self) {
        if self.spawned_before_first_read.is_none() {
            self.spawned_before_first_read = Some(self.factory.spawn_count());
        }
    }
}

impl Read for WatchedInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.observe();
        self.inner.read(buf)
    }
}

impl BufRead for WatchedInput {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.observe();
        self.inner.fill_buf()
    }

    fn consume(&mut self, amount: usize) {
        self.inner.consume(amount);
    }
}

/// Every line of [`FLAT_LIST`] is an item; code execution appends
/// [`EXECUTION_OUTPUT`] after [`CODE_BLOCK`]; the one code action offered
/// for a line turns it into a task.
fn respond(key: &str, params: &Value) -> Option<ScriptedResponse> {
    if key == "textDocument/codeAction" {
        let uri = params.pointer("/textDocument/uri").and_then(Value::as_str)?;
        let line = params.pointer("/range/start/line").and_then(Value::as_u64)?;
        let at = json!({"line": line, "character": 2});
        return Some(ScriptedResponse::Value(json!([{
            "title": "Convert to task",
            "edit": {"changes": {uri: [{"range": {"start": at, "end": at}, "newText": "[ ] "}]}}
        }])));
    }
    if key == NotedownCommand::ExecuteCodeBlocks.wire_name() {
        let uri = params.pointer("/arguments/0").and_then(Value::as_str)?;
        let end = json!({"line": 3, "character": 0});
        return Some(ScriptedResponse::Value(json!({
            "changes": { uri: [{"range": {"start": end, "end": end}, "newText": EXECUTION_OUTPUT}] }
        })));
    }
    if key != NotedownCommand::ListItemBoundaries.wire_name() {
        return None;
    }
    let line = params.pointer("/arguments/1/line").and_then(Value::as_u64)?;
    let payload = if line < 3 {
        json!({
            "found": true,
            "start": {"line": line, "character": 0},
            "end": {"line": line + 1, "character": 0}
        })
    } else {
        json!({"found": false})
    };
    Some(ScriptedResponse::Value(payload))
}
