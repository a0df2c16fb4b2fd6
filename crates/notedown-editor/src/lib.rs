//! Editor-side handling of Notedown documents.
//!
//! [`Notedown`] coordinates open documents with the language server sessions
//! owned by [`notedown_lsp_host`]. The action handlers turn command results
//! into editor operations: [`LineSelection`] for list-item selection,
//! [`move_block`] for moving items past their siblings, [`ConcealPainter`]
//! for wikilink targets, [`fold_levels`] for folding and
//! [`apply_workspace_edit`] for code execution output.

mod clock;
mod conceal;
mod coordinator;
mod debounce;
mod document;
mod edit;
mod fold;
mod move_item;
mod selection;
mod settings;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use conceal::{ConcealMark, ConcealPainter, marks_for_ranges};
pub use coordinator::{Notedown, NotedownError, TickReport, action_title};
pub use debounce::Debouncer;
pub use document::Document;
pub use edit::{EditError, apply_text_edits, apply_workspace_edit, edits_for};
pub use fold::{FoldLevel, fold_levels};
pub use move_item::{Direction, MovedItem, list_item_indent, move_block, sibling_line};
pub use selection::LineSelection;
pub use settings::{DEFAULT_CONCEAL_DEBOUNCE, EditorSettings};
