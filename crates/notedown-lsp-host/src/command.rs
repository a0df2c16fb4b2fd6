//! Custom `workspace/executeCommand` extensions of the Notedown server.
//!
//! | Command                          | Arguments                    | Result                     |
//! |----------------------------------|------------------------------|----------------------------|
//! | `notedown.getListItemBoundaries` | `[uri, {line, character}]`   | `{found, start, end}`      |
//! | `notedown.getConcealRanges`      | `[uri]`                      | `[{range, kind}]`          |
//! | `notedown.executeCodeBlocks`     | `[uri]` or `[uri, language]` | `WorkspaceEdit` or `null`  |

use std::fmt;
use std::str::FromStr;

use lsp_types::{Position, Range, Uri, WorkspaceEdit};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::capability::CapabilityKind;

/// Commands the client knows how to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NotedownCommand {
    /// Line span of the list item under a position.
    ListItemBoundaries,
    /// Ranges the editor should conceal.
    ConcealRanges,
    /// Runs the document's code blocks and returns their output as edits.
    ExecuteCodeBlocks,
}

impl NotedownCommand {
    /// Every command, in wire-name order.
    pub const ALL: [Self; 3] = [
        Self::ExecuteCodeBlocks,
        Self::ConcealRanges,
        Self::ListItemBoundaries,
    ];

    /// Name used in `ExecuteCommandParams::command`.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::ListItemBoundaries => "notedown.getListItemBoundaries",
            Self::ConcealRanges => "notedown.getConcealRanges",
            Self::ExecuteCodeBlocks => "notedown.executeCodeBlocks",
        }
    }

    /// Capability guarding the command.
    #[must_use]
    pub const fn capability(self) -> CapabilityKind {
        match self {
            Self::ListItemBoundaries => CapabilityKind::ListItemBoundaries,
            Self::ConcealRanges => CapabilityKind::ConcealRanges,
            Self::ExecuteCodeBlocks => CapabilityKind::ExecuteCodeBlocks,
        }
    }
}

impl fmt::Display for NotedownCommand {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.wire_name())
    }
}

/// A wire name that is not one of the Notedown commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown notedown command '{0}'")]
pub struct UnknownCommand(pub String);

impl FromStr for NotedownCommand {
    type Err = UnknownCommand;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|command| command.wire_name() == value)
            .ok_or_else(|| UnknownCommand(String::from(value)))
    }
}

/// Line span of a list item.
///
/// `start` is the first line of the item and `end` the first line after it,
/// so an item on line 2 with no children ends at line 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListItemBoundaries {
    /// Whether a list item encloses the queried position.
    pub found: bool,
    /// First position of the item.
    #[serde(default)]
    pub start: Position,
    /// Position just past the item.
    #[serde(default)]
    pub end: Position,
}

impl ListItemBoundaries {
    /// Result used when no item was found or the lookup failed.
    #[must_use]
    pub fn not_found() -> Self {
        Self::default()
    }

    /// Builds a found item spanning `start_line..end_line`.
    #[must_use]
    pub const fn lines(start_line: u32, end_line: u32) -> Self {
        Self {
            found: true,
            start: Position {
                line: start_line,
                character: 0,
            },
            end: Position {
                line: end_line,
                character: 0,
            },
        }
    }

    /// Decodes a command result; `null` means nothing was found.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error for payloads of the wrong shape.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::not_found());
        }
        serde_json::from_value(value)
    }
}

/// Kind tag of a conceal range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConcealKind {
    /// Target part of a `[[target|label]]` wikilink.
    WikilinkTarget,
    /// Any kind this client does not act on.
    #[serde(other)]
    Unknown,
}

/// A range the server suggests hiding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcealRange {
    /// Concealed span.
    pub range: Range,
    /// What the span represents.
    pub kind: ConcealKind,
}

/// Decodes a conceal result; `null` yields no ranges.
///
/// # Errors
///
/// Returns the `serde_json` error for payloads of the wrong shape.
pub fn parse_conceal_ranges(value: Value) -> Result<Vec<ConcealRange>, serde_json::Error> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value)
}

/// Decodes a code execution result; `null` yields an empty edit.
///
/// # Errors
///
/// Returns the `serde_json` error for payloads of the wrong shape.
pub fn parse_workspace_edit(value: Value) -> Result<WorkspaceEdit, serde_json::Error> {
    if value.is_null() {
        return Ok(WorkspaceEdit::default());
    }
    serde_json::from_value(value)
}

/// Arguments of `notedown.getListItemBoundaries`.
#[must_use]
pub fn list_item_arguments(uri: &Uri, position: Position) -> Vec<Value> {
    vec![
        Value::String(String::from(uri.as_str())),
        serde_json::json!({ "line": position.line, "character": position.character }),
    ]
}

/// Arguments of `notedown.getConcealRanges`.
#[must_use]
pub fn conceal_arguments(uri: &Uri) -> Vec<Value> {
    vec![Value::String(String::from(uri.as_str()))]
}

/// Arguments of `notedown.executeCodeBlocks`, optionally filtered by language.
#[must_use]
pub fn code_execution_arguments(uri: &Uri, language: Option<&str>) -> Vec<Value> {
    let mut arguments = vec![Value::String(String::from(uri.as_str()))];
    if let Some(language) = language {
        arguments.push(Value::String(String::from(language)));
    }
    arguments
}
