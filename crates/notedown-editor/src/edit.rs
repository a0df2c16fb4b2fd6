//! Application of LSP workspace edits to document text.
//!
//! Positions are UTF-16 code units as the protocol defaults to. A line past
//! the end of the document resolves to the end of the text and a character
//! past the end of a line resolves to the end of that line, so servers can
//! append output after the final line.

use lsp_types::{
    AnnotatedTextEdit, DocumentChangeOperation, DocumentChanges, OneOf, Position, TextEdit, Uri,
    WorkspaceEdit,
};
use thiserror::Error;

/// Reasons an edit cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// The edit creates, renames or deletes files.
    #[error("workspace edit includes unsupported resource operation: {operation}")]
    ResourceOperation {
        /// Debug rendering of the operation.
        operation: String,
    },
    /// A range ends before it starts.
    #[error("edit range end {end:?} precedes start {start:?}")]
    InvertedRange {
        /// Range start.
        start: Position,
        /// Range end.
        end: Position,
    },
    /// Two edits touch the same text.
    #[error("edits overlap at byte {offset}")]
    Overlapping {
        /// Offset where the later edit starts.
        offset: usize,
    },
    /// A position falls inside a surrogate pair.
    #[error("position {position:?} splits a UTF-16 code unit sequence")]
    SplitsCodePoint {
        /// Offending position.
        position: Position,
    },
}

/// Text edits in `edit` that target `uri`, from both `changes` and
/// `documentChanges`.
///
/// # Errors
///
/// Returns [`EditError::ResourceOperation`] when `documentChanges` contains
/// file operations.
pub fn edits_for(edit: &WorkspaceEdit, uri: &Uri) -> Result<Vec<TextEdit>, EditError> {
    let mut edits = Vec::new();

    if let Some(file_edits) = edit.changes.as_ref().and_then(|changes| changes.get(uri)) {
        edits.extend(file_edits.iter().cloned());
    }

    match &edit.document_changes {
        None => {}
        Some(DocumentChanges::Edits(document_edits)) => {
            for document_edit in document_edits {
                append_document_edits(
                    &mut edits,
                    &document_edit.text_document.uri,
                    &document_edit.edits,
                    uri,
                );
            }
        }
        Some(DocumentChanges::Operations(operations)) => {
            for operation in operations {
                match operation {
                    DocumentChangeOperation::Edit(document_edit) => append_document_edits(
                        &mut edits,
                        &document_edit.text_document.uri,
                        &document_edit.edits,
                        uri,
                    ),
                    DocumentChangeOperation::Op(resource) => {
                        return Err(EditError::ResourceOperation {
                            operation: format!("{resource:?}"),
                        });
                    }
                }
            }
        }
    }

    Ok(edits)
}

/// Applies the parts of `edit` that target `uri` to `original`.
///
/// An edit with nothing for `uri` returns `original` unchanged.
///
/// # Errors
///
/// Returns [`EditError`] for file operations, inverted or overlapping ranges
/// and positions that split a surrogate pair.
pub fn apply_workspace_edit(
    original: &str,
    edit: &WorkspaceEdit,
    uri: &Uri,
) -> Result<String, EditError> {
    let edits = edits_for(edit, uri)?;
    apply_text_edits(original, &edits)
}

/// Applies `edits` to `original`, back to front.
///
/// Inserts at the same position keep their relative order.
///
/// # Errors
///
/// As [`apply_workspace_edit`].
pub fn apply_text_edits(original: &str, edits: &[TextEdit]) -> Result<String, EditError> {
    if edits.is_empty() {
        return Ok(String::from(original));
    }

    let mut spans = edits
        .iter()
        .enumerate()
        .map(|(index, edit)| {
            let start = position_to_offset(original, edit.range.start)?;
            let end = position_to_offset(original, edit.range.end)?;
            if end < start {
                return Err(EditError::InvertedRange {
                    start: edit.range.start,
                    end: edit.range.end,
                });
            }
            Ok((start, end, index, edit.new_text.as_str()))
        })
        .collect::<Result<Vec<_>, EditError>>()?;

    spans.sort_by(|left, right| (left.0, left.2).cmp(&(right.0, right.2)));
    for pair in spans.windows(2) {
        if let [earlier, later] = pair
            && later.0 < earlier.1
        {
            return Err(EditError::Overlapping { offset: later.0 });
        }
    }

    let mut updated = String::from(original);
    for (start, end, _, replacement) in spans.into_iter().rev() {
        updated.replace_range(start..end, replacement);
    }
    Ok(updated)
}

fn append_document_edits(
    target: &mut Vec<TextEdit>,
    uri: &Uri,
    edits: &[OneOf<TextEdit, AnnotatedTextEdit>],
    requested: &Uri,
) {
    if uri != requested {
        return;
    }
    target.extend(edits.iter().map(|edit| match edit {
        OneOf::Left(text_edit) => text_edit.clone(),
        OneOf::Right(annotated) => annotated.text_edit.clone(),
    }));
}

fn position_to_offset(content: &str, position: Position) -> Result<usize, EditError> {
    let Some(line_start) = line_start_offset(content, position.line) else {
        return Ok(content.len());
    };
    let rest = content.get(line_start..).unwrap_or_default();
    let line = rest.split('\n').next().unwrap_or_default();
    let line = line.strip_suffix('\r').unwrap_or(line);

    let mut units = 0_u32;
    for (index, character) in line.char_indices() {
        if units == position.character {
            return Ok(line_start + index);
        }
        let width = if character.len_utf16() == 2 { 2 } else { 1 };
        units = units.saturating_add(width);
        if units > position.character {
            return Err(EditError::SplitsCodePoint { position });
        }
    }
    Ok(line_start + line.len())
}

fn line_start_offset(content: &str, line: u32) -> Option<usize> {
    if line == 0 {
        return Some(0);
    }
    content
        .match_indices('\n')
        .nth(usize::try_from(line - 1).ok()?)
        .map(|(index, _)| index + 1)
}
