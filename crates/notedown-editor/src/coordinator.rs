//! The [`Notedown`] coordinator.
//!
//! Opening a file locates its workspace, picks the content flavor, attaches
//! the workspace session and announces the document. Edits are forwarded as
//! full-text changes and schedule a debounced conceal refresh. [`Notedown::tick`]
//! is one turn of the editor loop: due refreshes are sent, finished replies
//! are applied and server notifications are routed.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lsp_types::{
    CodeActionContext, CodeActionOrCommand, CodeActionParams, CompletionItem, CompletionParams,
    Diagnostic, GotoDefinitionParams, GotoDefinitionResponse, Location, Position, Range,
    TextDocumentIdentifier, TextDocumentPositionParams, Uri, WorkspaceEdit,
};
use notedown_config::Config;
use notedown_lsp_host::adapter::{LspServerConfig, ProcessServerFactory};
use notedown_lsp_host::{
    BridgeReply, CommandBridge, ContentFlavor, HostSettings, LspHost, LspHostError, NoticeLevel,
    Notifier, SessionHandle, SessionStatus, UriConversionError, WorkspaceLocator, WorkspaceRoot,
    path_to_uri,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::{SharedClock, SystemClock};
use crate::conceal::{ConcealMark, ConcealPainter};
use crate::debounce::Debouncer;
use crate::document::Document;
use crate::edit::{EditError, apply_workspace_edit};
use crate::fold::{FoldLevel, fold_levels};
use crate::move_item::{Direction, move_block, sibling_line};
use crate::selection::LineSelection;
use crate::settings::EditorSettings;

const COORDINATOR_TARGET: &str = "notedown_editor::coordinator";
const SETTLE_INTERVAL: Duration = Duration::from_millis(10);

/// Errors surfaced by [`Notedown`] operations.
#[derive(Debug, Error)]
pub enum NotedownError {
    /// The session manager failed.
    #[error(transparent)]
    Host(#[from] LspHostError),
    /// A path could not be expressed as a `file://` URI.
    #[error(transparent)]
    Uri(#[from] UriConversionError),
    /// A relative path could not be made absolute.
    #[error("failed to resolve '{}': {source}", path.display())]
    Path {
        /// Path as given.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The document is not open.
    #[error("document {uri} is not open")]
    UnknownDocument {
        /// URI that was asked for.
        uri: String,
    },
    /// A workspace edit could not be applied.
    #[error("failed to apply edit to {uri}: {source}")]
    Edit {
        /// Target document.
        uri: String,
        /// Why the edit was rejected.
        #[source]
        source: EditError,
    },
}

/// What one or more turns of the loop accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Conceal requests sent because their debounce window elapsed.
    pub conceal_requests: usize,
    /// Conceal replies painted.
    pub conceal_painted: usize,
    /// Conceal replies discarded as stale.
    pub conceal_discarded: usize,
    /// Code execution edits that changed a document.
    pub edits_applied: usize,
    /// Server notifications routed.
    pub notifications: usize,
}

impl TickReport {
    fn absorb(&mut self, other: Self) {
        self.conceal_requests += other.conceal_requests;
        self.conceal_painted += other.conceal_painted;
        self.conceal_discarded += other.conceal_discarded;
        self.edits_applied += other.edits_applied;
        self.notifications += other.notifications;
    }
}

/// Ties documents, sessions and editor actions together.
pub struct Notedown {
    locator: WorkspaceLocator,
    bridge: CommandBridge,
    notifier: Arc<dyn Notifier>,
    clock: SharedClock,
    conceal_debounce: Debouncer<Uri>,
    painter: ConcealPainter,
    documents: HashMap<Uri, Document>,
}

impl std::fmt::Debug for Notedown {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Notedown")
            .field("locator", &self.locator)
            .field("bridge", &self.bridge)
            .field("documents", &self.documents.len())
            .finish_non_exhaustive()
    }
}

impl Notedown {
    /// Coordinator over `host`, reading time from the system clock.
    #[must_use]
    pub fn new(host: LspHost, settings: &EditorSettings) -> Self {
        let notifier = host.notifier();
        Self {
            locator: WorkspaceLocator::new(settings.marker.clone()),
            bridge: CommandBridge::new(host),
            notifier,
            clock: Arc::new(SystemClock),
            conceal_debounce: Debouncer::new(settings.conceal_debounce),
            painter: ConcealPainter::new(),
            documents: HashMap::new(),
        }
    }

    /// Coordinator that launches `server_command serve` for each workspace.
    #[must_use]
    pub fn from_config(config: &Config, notifier: Arc<dyn Notifier>) -> Self {
        let factory = ProcessServerFactory::new(LspServerConfig::for_command(
            config.server_command(),
        ));
        let host = LspHost::new(
            Box::new(factory),
            HostSettings {
                request_timeout: config.request_timeout(),
            },
        )
        .with_notifier(notifier);
        Self::new(host, &EditorSettings::from(config))
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Workspace locator in use.
    #[must_use]
    pub const fn locator(&self) -> &WorkspaceLocator {
        &self.locator
    }

    /// Destination of user-visible notices.
    #[must_use]
    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.notifier)
    }

    /// Attaches eagerly when `cwd` is inside a workspace.
    ///
    /// # Errors
    ///
    /// Returns [`NotedownError::Host`] when the server cannot be started.
    pub fn startup(&mut self, cwd: &Path) -> Result<Option<SessionHandle>, NotedownError> {
        Ok(self.bridge.host_mut().startup(&self.locator, cwd)?)
    }

    /// Opens (or reopens) the file at `path` with `text`.
    ///
    /// The flavor is recomputed on every open. A session that fails to start
    /// leaves the document open without a server; later commands retry.
    ///
    /// # Errors
    ///
    /// Returns [`NotedownError::Path`] or [`NotedownError::Uri`] when the
    /// path cannot be turned into a document URI.
    pub fn open_document(&mut self, path: &Path, text: String) -> Result<Uri, NotedownError> {
        let absolute = std::path::absolute(path).map_err(|source| NotedownError::Path {
            path: path.to_path_buf(),
            source,
        })?;
        let uri = path_to_uri(&absolute)?;
        if self.documents.contains_key(&uri) {
            self.close_document(&uri)?;
        }

        let root = self.locator.locate(&absolute);
        let document = Document::new(uri.clone(), absolute, text, root.clone());
        info!(
            target: COORDINATOR_TARGET,
            uri = uri.as_str(),
            flavor = %document.flavor(),
            "opened document"
        );
        let open_params = document.did_open_params();
        self.documents.insert(uri.clone(), document);

        if let Some(root) = root {
            let attached = match self.ensure_attached(&root) {
                Ok(true) => Ok(()),
                Ok(false) => self
                    .bridge
                    .host_mut()
                    .did_open(&root, open_params)
                    .map_err(NotedownError::from),
                Err(error) => Err(error),
            };
            if let Err(error) = attached {
                warn!(target: COORDINATOR_TARGET, root = %root, error = %error, "document left detached");
            }
            self.conceal_debounce.trigger(uri.clone(), self.clock.now());
        }
        Ok(uri)
    }

    /// Replaces the text of an open document and returns its new version.
    ///
    /// # Errors
    ///
    /// Returns [`NotedownError::UnknownDocument`] for documents that are not
    /// open and [`NotedownError::Host`] when the change cannot be delivered.
    pub fn change_document(&mut self, uri: &Uri, text: String) -> Result<i32, NotedownError> {
        let document = self.document_mut(uri)?;
        let version = document.replace_text(text);
        let params = document.did_change_params();
        let root = document.root().cloned();

        if let Some(root) = root {
            if !self.ensure_attached(&root)? {
                self.bridge.host_mut().did_change(&root, params)?;
            }
            self.conceal_debounce.trigger(uri.clone(), self.clock.now());
        }
        Ok(version)
    }

    /// Closes a document and drops everything pending for it.
    ///
    /// # Errors
    ///
    /// Returns [`NotedownError::UnknownDocument`] for documents that are not
    /// open.
    pub fn close_document(&mut self, uri: &Uri) -> Result<(), NotedownError> {
        let document = self
            .documents
            .remove(uri)
            .ok_or_else(|| unknown_document(uri))?;
        self.conceal_debounce.cancel(uri);
        self.painter.clear(uri);
        self.bridge.forget(uri);

        if let Some(root) = document.root()
            && self.bridge.host().session(root).is_some()
        {
            self.bridge
                .host_mut()
                .did_close(root, document.did_close_params())?;
        }
        Ok(())
    }

    /// An open document.
    #[must_use]
    pub fn document(&self, uri: &Uri) -> Option<&Document> {
        self.documents.get(uri)
    }

    /// Every open document, in no particular order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    /// Flavor of an open document.
    #[must_use]
    pub fn flavor(&self, uri: &Uri) -> Option<ContentFlavor> {
        self.documents.get(uri).map(Document::flavor)
    }

    /// Lines of the list item at `position`.
    ///
    /// Returns `Ok(None)` when no item encloses the position, the server does
    /// not answer in time or the document is outside any workspace.
    ///
    /// # Errors
    ///
    /// Returns [`NotedownError::UnknownDocument`] or a session start failure.
    pub fn select_list_item(
        &mut self,
        uri: &Uri,
        position: Position,
    ) -> Result<Option<LineSelection>, NotedownError> {
        let Some(root) = self.attached_root(uri)? else {
            return Ok(None);
        };
        let boundaries = self.bridge.list_item_boundaries(&root, uri, position);
        debug!(
            target: COORDINATOR_TARGET,
            uri = uri.as_str(),
            line = position.line,
            found = boundaries.found,
            "list item boundaries"
        );
        Ok(LineSelection::from_boundaries(&boundaries))
    }

    /// Moves the list item on `line` past its sibling in `direction`.
    ///
    /// Returns the cursor line after the move, or `Ok(None)` when there is
    /// nothing to swap with.
    ///
    /// # Errors
    ///
    /// As [`Self::select_list_item`] and [`Self::change_document`].
    pub fn move_list_item(
        &mut self,
        uri: &Uri,
        line: u32,
        direction: Direction,
    ) -> Result<Option<u32>, NotedownError> {
        let Some(item) = self.select_list_item(uri, Position::new(line, 0))? else {
            return Ok(None);
        };
        let text = String::from(self.document_ref(uri)?.text());
        let Some(sibling_start) = sibling_line(&text, item, direction) else {
            self.notifier.notify(
                NoticeLevel::Info,
                &format!("no list item to move {direction} past"),
            );
            return Ok(None);
        };
        let Some(sibling) = self.select_list_item(uri, Position::new(sibling_start, 0))? else {
            return Ok(None);
        };
        let Some(moved) = move_block(&text, item, sibling, direction, line) else {
            return Ok(None);
        };
        self.change_document(uri, moved.text)?;
        Ok(Some(moved.cursor_line))
    }

    /// Asks the server to run the code blocks of a document.
    ///
    /// The resulting edit is applied by a later [`Self::tick`]. Returns
    /// whether a request was sent.
    ///
    /// # Errors
    ///
    /// As [`Self::select_list_item`].
    pub fn execute_code_blocks(
        &mut self,
        uri: &Uri,
        language: Option<&str>,
    ) -> Result<bool, NotedownError> {
        let Some(root) = self.attached_root(uri)? else {
            return Ok(false);
        };
        Ok(self.bridge.request_code_execution(&root, uri, language))
    }

    /// Requests conceal ranges for the document's current version now.
    ///
    /// # Errors
    ///
    /// As [`Self::select_list_item`].
    pub fn refresh_conceal(&mut self, uri: &Uri) -> Result<bool, NotedownError> {
        let Some(root) = self.attached_root(uri)? else {
            return Ok(false);
        };
        let version = self.document_ref(uri)?.version();
        self.conceal_debounce.cancel(uri);
        Ok(self.bridge.request_conceal_ranges(&root, uri, version))
    }

    /// Conceal marks painted for a document.
    #[must_use]
    pub fn conceal_marks(&self, uri: &Uri) -> &[ConcealMark] {
        self.painter.marks(uri)
    }

    /// Per-line fold levels from the server's folding ranges.
    ///
    /// Documents without a session, and failed requests, fold nothing.
    ///
    /// # Errors
    ///
    /// As [`Self::select_list_item`].
    pub fn fold_levels(&mut self, uri: &Uri) -> Result<Vec<FoldLevel>, NotedownError> {
        let line_count = self.document_ref(uri)?.line_count();
        let Some(root) = self.attached_root(uri)? else {
            return Ok(fold_levels(&[], line_count));
        };
        let ranges = self
            .bridge
            .host_mut()
            .folding_ranges(&root, uri)
            .unwrap_or_else(|error| {
                self.notifier
                    .notify(NoticeLevel::Warn, &format!("folding unavailable: {error}"));
                Vec::new()
            });
        Ok(fold_levels(&ranges, line_count))
    }

    /// Targets of the link at `position`.
    ///
    /// # Errors
    ///
    /// As [`Self::select_list_item`]; failed lookups resolve to no targets
    /// with a notice.
    pub fn definition(
        &mut self,
        uri: &Uri,
        position: Position,
    ) -> Result<Vec<Location>, NotedownError> {
        let Some(root) = self.attached_root(uri)? else {
            return Ok(Vec::new());
        };
        let params = GotoDefinitionParams {
            text_document_position_params: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier { uri: uri.clone() },
                position,
            },
            work_done_progress_params: lsp_types::WorkDoneProgressParams::default(),
            partial_result_params: lsp_types::PartialResultParams::default(),
        };
        let response = match self.bridge.host_mut().goto_definition(&root, params) {
            Ok(response) => response,
            Err(error) => {
                self.notifier
                    .notify(NoticeLevel::Warn, &format!("definition lookup failed: {error}"));
                None
            }
        };
        Ok(match response {
            None => Vec::new(),
            Some(GotoDefinitionResponse::Scalar(location)) => vec![location],
            Some(GotoDefinitionResponse::Array(locations)) => locations,
            Some(GotoDefinitionResponse::Link(links)) => links
                .into_iter()
                .map(|link| Location {
                    uri: link.target_uri,
                    range: link.target_selection_range,
                })
                .collect(),
        })
    }

    /// Completion candidates at `position`, such as wikilink targets or task
    /// states.
    ///
    /// # Errors
    ///
    /// As [`Self::select_list_item`]; failed requests resolve to no items
    /// with a notice.
    pub fn completion(
        &mut self,
        uri: &Uri,
        position: Position,
    ) -> Result<Vec<CompletionItem>, NotedownError> {
        let Some(root) = self.attached_root(uri)? else {
            return Ok(Vec::new());
        };
        let params = CompletionParams {
            text_document_position: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier { uri: uri.clone() },
                position,
            },
            work_done_progress_params: lsp_types::WorkDoneProgressParams::default(),
            partial_result_params: lsp_types::PartialResultParams::default(),
            context: None,
        };
        Ok(self
            .bridge
            .host_mut()
            .completion(&root, params)
            .unwrap_or_else(|error| {
                self.notifier
                    .notify(NoticeLevel::Warn, &format!("completion failed: {error}"));
                Vec::new()
            }))
    }

    /// Code actions the server offers for `range`.
    ///
    /// The published diagnostics overlapping the range travel with the
    /// request.
    ///
    /// # Errors
    ///
    /// As [`Self::completion`].
    pub fn code_actions(
        &mut self,
        uri: &Uri,
        range: Range,
    ) -> Result<Vec<CodeActionOrCommand>, NotedownError> {
        let Some(root) = self.attached_root(uri)? else {
            return Ok(Vec::new());
        };
        let diagnostics = self
            .bridge
            .host()
            .diagnostics(&root, uri)
            .into_iter()
            .filter(|diagnostic| overlaps(diagnostic.range, range))
            .collect();
        let params = CodeActionParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
            range,
            context: CodeActionContext {
                diagnostics,
                ..CodeActionContext::default()
            },
            work_done_progress_params: lsp_types::WorkDoneProgressParams::default(),
            partial_result_params: lsp_types::PartialResultParams::default(),
        };
        Ok(self
            .bridge
            .host_mut()
            .code_actions(&root, params)
            .unwrap_or_else(|error| {
                self.notifier
                    .notify(NoticeLevel::Warn, &format!("code actions failed: {error}"));
                Vec::new()
            }))
    }

    /// Applies the workspace edit carried by a code action.
    ///
    /// Actions that only name a command change nothing and return `false`.
    ///
    /// # Errors
    ///
    /// As [`Self::apply_edit`].
    pub fn apply_code_action(
        &mut self,
        uri: &Uri,
        action: &CodeActionOrCommand,
    ) -> Result<bool, NotedownError> {
        let edit = match action {
            CodeActionOrCommand::CodeAction(action) => action.edit.as_ref(),
            CodeActionOrCommand::Command(_) => None,
        };
        let Some(edit) = edit else {
            self.notifier.notify(
                NoticeLevel::Info,
                &format!("'{}' carries no edit", action_title(action)),
            );
            return Ok(false);
        };
        self.apply_edit(uri, edit)
    }

    /// Diagnostics the server published for a document.
    #[must_use]
    pub fn diagnostics(&self, uri: &Uri) -> Vec<Diagnostic> {
        self.documents
            .get(uri)
            .and_then(Document::root)
            .map(|root| self.bridge.host().diagnostics(root, uri))
            .unwrap_or_default()
    }

    /// Status of every tracked session.
    #[must_use]
    pub fn status(&self) -> Vec<SessionStatus> {
        self.bridge.host().sessions()
    }

    /// One turn of the editor loop.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        let due = self.conceal_debounce.take_due(self.clock.now());
        report.conceal_requests = self.send_conceal_requests(due);
        self.apply_replies(&mut report);
        report.notifications = self.bridge.host_mut().pump_notifications();
        report
    }

    /// Fires pending refreshes immediately and ticks until every reply has
    /// arrived or `timeout` passes.
    pub fn settle(&mut self, timeout: Duration) -> TickReport {
        let deadline = Instant::now() + timeout;
        let due = self.conceal_debounce.drain();
        let mut report = TickReport {
            conceal_requests: self.send_conceal_requests(due),
            ..TickReport::default()
        };
        loop {
            report.absorb(self.tick());
            if !self.bridge.has_pending() || Instant::now() >= deadline {
                return report;
            }
            std::thread::sleep(SETTLE_INTERVAL);
        }
    }

    /// Applies a workspace edit to an open document.
    ///
    /// Returns whether the text changed; an empty edit is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`NotedownError::Edit`] for edits that cannot be applied.
    pub fn apply_edit(&mut self, uri: &Uri, edit: &WorkspaceEdit) -> Result<bool, NotedownError> {
        let document = self.document_ref(uri)?;
        let updated =
            apply_workspace_edit(document.text(), edit, uri).map_err(|source| NotedownError::Edit {
                uri: String::from(uri.as_str()),
                source,
            })?;
        if updated == document.text() {
            return Ok(false);
        }
        self.change_document(uri, updated)?;
        Ok(true)
    }

    /// Restarts every session and re-attaches open workspace documents.
    ///
    /// Returns the number of sessions stopped.
    pub fn reload(&mut self) -> usize {
        let stopped = self.bridge.reload();
        self.conceal_debounce.clear();
        info!(target: COORDINATOR_TARGET, stopped, "reloaded language servers");

        let roots: BTreeSet<WorkspaceRoot> = self
            .documents
            .values()
            .filter_map(|document| document.root().cloned())
            .collect();
        for root in &roots {
            if let Err(error) = self.ensure_attached(root) {
                warn!(target: COORDINATOR_TARGET, root = %root, error = %error, "re-attach failed");
            }
        }
        let now = self.clock.now();
        for document in self.documents.values().filter(|document| document.root().is_some()) {
            self.conceal_debounce.trigger(document.uri().clone(), now);
        }
        self.notifier.notify(
            NoticeLevel::Info,
            &format!("restarted {stopped} language server(s)"),
        );
        stopped
    }

    fn send_conceal_requests(&mut self, due: Vec<Uri>) -> usize {
        let mut sent = 0;
        for uri in due {
            match self.refresh_conceal(&uri) {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err(error) => {
                    debug!(target: COORDINATOR_TARGET, uri = uri.as_str(), error = %error, "conceal refresh skipped");
                }
            }
        }
        sent
    }

    fn apply_replies(&mut self, report: &mut TickReport) {
        for reply in self.bridge.poll() {
            match reply {
                BridgeReply::ConcealRanges {
                    uri,
                    version,
                    ranges,
                } => {
                    let Some(document) = self.documents.get(&uri) else {
                        continue;
                    };
                    if self.painter.paint(
                        &uri,
                        document.text(),
                        document.version(),
                        version,
                        &ranges,
                    ) {
                        report.conceal_painted += 1;
                    } else {
                        report.conceal_discarded += 1;
                    }
                }
                BridgeReply::CodeBlocksExecuted { uri, edit } => match self.apply_edit(&uri, &edit) {
                    Ok(true) => report.edits_applied += 1,
                    Ok(false) => {
                        debug!(target: COORDINATOR_TARGET, uri = uri.as_str(), "code execution produced no edit");
                    }
                    Err(error) => self.notifier.notify(NoticeLevel::Error, &error.to_string()),
                },
            }
        }
    }

    /// Starts or replaces the session for `root` if needed.
    ///
    /// Returns `true` when a new session was attached; every open document
    /// of the root has then been announced to it and has a conceal refresh
    /// scheduled.
    fn ensure_attached(&mut self, root: &WorkspaceRoot) -> Result<bool, NotedownError> {
        let before = self.bridge.host().session(root).map(|handle| handle.id);
        let handle = self.bridge.host_mut().ensure_session(root)?;
        if before == Some(handle.id) {
            return Ok(false);
        }
        let now = self.clock.now();
        for document in self
            .documents
            .values()
            .filter(|document| document.root() == Some(root))
        {
            self.bridge
                .host_mut()
                .did_open(root, document.did_open_params())?;
            self.conceal_debounce.trigger(document.uri().clone(), now);
        }
        Ok(true)
    }

    fn attached_root(&mut self, uri: &Uri) -> Result<Option<WorkspaceRoot>, NotedownError> {
        let Some(root) = self.document_ref(uri)?.root().cloned() else {
            self.notifier.notify(
                NoticeLevel::Info,
                &format!("{} is not inside a notedown workspace", uri.as_str()),
            );
            return Ok(None);
        };
        self.ensure_attached(&root)?;
        Ok(Some(root))
    }

    fn document_ref(&self, uri: &Uri) -> Result<&Document, NotedownError> {
        self.documents.get(uri).ok_or_else(|| unknown_document(uri))
    }

    fn document_mut(&mut self, uri: &Uri) -> Result<&mut Document, NotedownError> {
        self.documents
            .get_mut(uri)
            .ok_or_else(|| unknown_document(uri))
    }
}

/// Title shown for a code action or bare command.
#[must_use]
pub fn action_title(action: &CodeActionOrCommand) -> &str {
    match action {
        CodeActionOrCommand::CodeAction(action) => &action.title,
        CodeActionOrCommand::Command(command) => &command.title,
    }
}

/// Whether two ranges share at least one line.
fn overlaps(left: Range, right: Range) -> bool {
    left.start.line <= right.end.line && right.start.line <= left.end.line
}

fn unknown_document(uri: &Uri) -> NotedownError {
    NotedownError::UnknownDocument {
        uri: String::from(uri.as_str()),
    }
}
