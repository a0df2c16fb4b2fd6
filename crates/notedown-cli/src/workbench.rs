//! Executes client actions against a [`Notedown`] coordinator.
//!
//! The same [`Action`] values back the one-shot subcommands and the
//! interactive loop. Documents are read from disk when first named and
//! written back after every edit. Notices raised while an action runs are
//! printed to stderr once it finishes.

use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use lsp_types::{Position, Range, Uri};
use notedown_editor::{Notedown, action_title};
use notedown_lsp_host::CollectingNotifier;
use tracing::{debug, warn};

use crate::AppError;
use crate::cli::{Action, ReplLine, split_words};

const WORKBENCH_TARGET: &str = "notedown_cli::workbench";

/// Upper bound on waiting for code execution output.
const EXECUTION_TIMEOUT: Duration = Duration::from_secs(30);

const PROMPT: &str = "notedown> ";

/// Whether the loop keeps reading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

pub(crate) struct Workbench {
    notedown: Notedown,
    notices: CollectingNotifier,
    cwd: PathBuf,
    request_timeout: Duration,
}

impl Workbench {
    pub(crate) const fn new(
        notedown: Notedown,
        notices: CollectingNotifier,
        cwd: PathBuf,
        request_timeout: Duration,
    ) -> Self {
        Self {
            notedown,
            notices,
            cwd,
            request_timeout,
        }
    }

    #[cfg(test)]
    pub(crate) const fn notedown(&self) -> &Notedown {
        &self.notedown
    }

    /// Attaches to the workspace enclosing `dir` (or the working directory)
    /// and reports it.
    fn status_of<W: Write>(
        &mut self,
        dir: Option<&Path>,
        out: &mut W,
    ) -> Result<(), AppError> {
        let dir = dir.map_or_else(|| self.cwd.clone(), |dir| self.resolve(dir));
        match self.notedown.startup(&dir)? {
            Some(handle) => writeln!(out, "workspace {} (session {})", handle.root, handle.id)?,
            None => writeln!(
                out,
                "no {} directory above {}; documents open as plain markdown",
                self.notedown.locator().marker(),
                dir.display()
            )?,
        }
        self.print_status(out)
    }

    /// Runs one action.
    pub(crate) fn execute<W: Write>(
        &mut self,
        action: &Action,
        out: &mut W,
    ) -> Result<Flow, AppError> {
        debug!(target: WORKBENCH_TARGET, action = ?action, "executing action");
        match action {
            Action::Status { path } => self.status_of(path.as_deref(), out)?,
            Action::Reload => {
                let stopped = self.notedown.reload();
                writeln!(out, "restarted {stopped} session(s)")?;
            }
            Action::Open { file } => {
                let uri = self.reopen(file)?;
                let flavor = self
                    .notedown
                    .flavor(&uri)
                    .map(|flavor| flavor.to_string())
                    .unwrap_or_default();
                writeln!(out, "opened {} as {flavor}", uri.as_str())?;
            }
            Action::SelectItem { file, line, column } => {
                self.print_selection(file, one_based(*line, *column), out)?;
            }
            Action::MoveItem {
                file,
                line,
                direction,
            } => {
                let uri = self.ensure_open(file)?;
                let line = line.saturating_sub(1);
                match self.notedown.move_list_item(&uri, line, *direction)? {
                    Some(cursor) => {
                        self.save(&uri)?;
                        writeln!(out, "moved item {direction}; cursor on line {}", cursor + 1)?;
                    }
                    None => writeln!(out, "nothing to move")?,
                }
            }
            Action::ExecCode { file, language } => {
                self.run_code_blocks(file, language.as_deref(), out)?;
            }
            Action::Conceal { file } => self.print_conceal(file, out)?,
            Action::Folds { file } => {
                let uri = self.ensure_open(file)?;
                for (line, level) in self.notedown.fold_levels(&uri)?.iter().enumerate() {
                    writeln!(out, "{}\t{level}", line + 1)?;
                }
            }
            Action::Complete { file, line, column } => {
                self.print_completion(file, one_based(*line, *column), out)?;
            }
            Action::CodeActions { file, line, apply } => {
                self.code_actions(file, line.saturating_sub(1), *apply, out)?;
            }
            Action::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Reads actions from `input` until end of input or `quit`.
    ///
    /// The session for the working directory's workspace starts before the
    /// first line is read; a server that fails to start is reported and
    /// retried by later actions. A rejected or failing line is reported and
    /// the loop carries on.
    pub(crate) fn repl<R, W, E>(
        &mut self,
        input: &mut R,
        out: &mut W,
        err: &mut E,
    ) -> Result<(), AppError>
    where
        R: BufRead,
        W: Write,
        E: Write,
    {
        if let Err(error) = self.notedown.startup(&self.cwd) {
            warn!(target: WORKBENCH_TARGET, error = %error, "eager startup failed");
        }
        self.flush_notices(err)?;

        let mut line = String::new();
        loop {
            write!(out, "{PROMPT}")?;
            out.flush()?;
            line.clear();
            if input.read_line(&mut line).map_err(AppError::ReadInput)? == 0 {
                return Ok(());
            }
            let Some(words) = split_words(&line) else {
                writeln!(err, "error: unterminated quote")?;
                continue;
            };
            if words.is_empty() {
                continue;
            }
            let flow = match ReplLine::try_parse_from(words) {
                Ok(parsed) => self.execute(&parsed.action, out).unwrap_or_else(|error| {
                    writeln!(err, "error: {error}").ok();
                    Flow::Continue
                }),
                Err(error) if !error.use_stderr() => {
                    write!(out, "{error}")?;
                    Flow::Continue
                }
                Err(error) => {
                    write!(err, "{error}")?;
                    Flow::Continue
                }
            };
            self.flush_notices(err)?;
            if flow == Flow::Quit {
                return Ok(());
            }
        }
    }

    /// Prints and drains the notices raised so far.
    pub(crate) fn flush_notices<E: Write>(&self, err: &mut E) -> Result<(), AppError> {
        let mut notices = self.notices.take();
        notices.dedup();
        for notice in notices {
            writeln!(err, "{notice}")?;
        }
        Ok(())
    }

    fn print_status<W: Write>(&self, out: &mut W) -> Result<(), AppError> {
        let sessions = self.notedown.status();
        if sessions.is_empty() {
            writeln!(out, "no active sessions")?;
        }
        for session in sessions {
            let state = if session.running { "running" } else { "stopped" };
            writeln!(out, "{} {} {state}", session.id, session.root)?;
            if !session.commands.is_empty() {
                writeln!(out, "  commands: {}", session.commands.join(", "))?;
            }
        }
        Ok(())
    }

    fn print_selection<W: Write>(
        &mut self,
        path: &Path,
        position: Position,
        out: &mut W,
    ) -> Result<(), AppError> {
        let uri = self.ensure_open(path)?;
        let Some(selection) = self.notedown.select_list_item(&uri, position)? else {
            writeln!(out, "no list item at line {}", position.line + 1)?;
            return Ok(());
        };
        writeln!(out, "{selection}")?;
        if let Some(document) = self.notedown.document(&uri) {
            for line in selection.extract(document.text()) {
                writeln!(out, "{line}")?;
            }
        }
        Ok(())
    }

    fn print_completion<W: Write>(
        &mut self,
        path: &Path,
        position: Position,
        out: &mut W,
    ) -> Result<(), AppError> {
        let uri = self.ensure_open(path)?;
        let items = self.notedown.completion(&uri, position)?;
        if items.is_empty() {
            writeln!(out, "no completions")?;
        }
        for item in items {
            match item.detail {
                Some(detail) => writeln!(out, "{}\t{detail}", item.label)?,
                None => writeln!(out, "{}", item.label)?,
            }
        }
        Ok(())
    }

    /// Lists the actions for `line`, or applies the `apply`th one.
    fn code_actions<W: Write>(
        &mut self,
        path: &Path,
        line: u32,
        apply: Option<u32>,
        out: &mut W,
    ) -> Result<(), AppError> {
        let uri = self.ensure_open(path)?;
        let start = Position::new(line, 0);
        let actions = self.notedown.code_actions(&uri, Range::new(start, start))?;
        let Some(number) = apply else {
            if actions.is_empty() {
                writeln!(out, "no code actions")?;
            }
            for (index, action) in actions.iter().enumerate() {
                writeln!(out, "{}. {}", index + 1, action_title(action))?;
            }
            return Ok(());
        };
        let chosen = usize::try_from(number)
            .ok()
            .and_then(|number| number.checked_sub(1))
            .and_then(|index| actions.get(index));
        let Some(action) = chosen else {
            writeln!(out, "no code action {number}; {} offered", actions.len())?;
            return Ok(());
        };
        if self.notedown.apply_code_action(&uri, action)? {
            self.save(&uri)?;
            writeln!(out, "applied '{}'", action_title(action))?;
        } else {
            writeln!(out, "nothing applied")?;
        }
        Ok(())
    }

    fn run_code_blocks<W: Write>(
        &mut self,
        path: &Path,
        language: Option<&str>,
        out: &mut W,
    ) -> Result<(), AppError> {
        let uri = self.ensure_open(path)?;
        if !self.notedown.execute_code_blocks(&uri, language)? {
            writeln!(out, "code execution is unavailable for {}", path.display())?;
            return Ok(());
        }
        let report = self.notedown.settle(EXECUTION_TIMEOUT);
        if report.edits_applied == 0 {
            writeln!(out, "code blocks produced no output")?;
            return Ok(());
        }
        self.save(&uri)?;
        writeln!(out, "wrote execution output to {}", path.display())?;
        Ok(())
    }

    fn print_conceal<W: Write>(&mut self, path: &Path, out: &mut W) -> Result<(), AppError> {
        let uri = self.ensure_open(path)?;
        if !self.notedown.refresh_conceal(&uri)? {
            writeln!(out, "concealing is unavailable for {}", path.display())?;
            return Ok(());
        }
        self.notedown.settle(self.request_timeout);
        let marks = self.notedown.conceal_marks(&uri);
        if marks.is_empty() {
            writeln!(out, "nothing concealed")?;
        }
        for mark in marks {
            writeln!(out, "{}:{}-{}", mark.line + 1, mark.start + 1, mark.end + 1)?;
        }
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    /// URI of the open document at `path`, opening it from disk if needed.
    fn ensure_open(&mut self, path: &Path) -> Result<Uri, AppError> {
        let path = self.resolve(path);
        let open = self
            .notedown
            .documents()
            .find(|document| document.path() == path)
            .map(|document| document.uri().clone());
        match open {
            Some(uri) => Ok(uri),
            None => self.reopen(&path),
        }
    }

    fn reopen(&mut self, path: &Path) -> Result<Uri, AppError> {
        let path = self.resolve(path);
        let text = fs::read_to_string(&path).map_err(|source| AppError::ReadDocument {
            path: path.clone(),
            source,
        })?;
        Ok(self.notedown.open_document(&path, text)?)
    }

    fn save(&self, uri: &Uri) -> Result<(), AppError> {
        let Some(document) = self.notedown.document(uri) else {
            return Ok(());
        };
        fs::write(document.path(), document.text()).map_err(|source| AppError::WriteDocument {
            path: document.path().to_path_buf(),
            source,
        })
    }
}

/// Zero-based position for one-based user input.
fn one_based(line: u32, column: u32) -> Position {
    Position::new(line.saturating_sub(1), column.saturating_sub(1))
}
