//! Linewise selections derived from list-item boundaries.

use std::fmt;

use notedown_lsp_host::ListItemBoundaries;

/// Lines `start..end`: `start` inclusive, `end` exclusive, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineSelection {
    /// First selected line.
    pub start: u32,
    /// First line after the selection.
    pub end: u32,
}

impl LineSelection {
    /// Selection of `start..end`, widened to at least one line.
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        let end = if end > start { end } else { start.saturating_add(1) };
        Self { start, end }
    }

    /// Selection covering an item the server found.
    ///
    /// An end position inside a line keeps that line in the selection.
    #[must_use]
    pub const fn from_boundaries(boundaries: &ListItemBoundaries) -> Option<Self> {
        if !boundaries.found {
            return None;
        }
        let end = if boundaries.end.character > 0 {
            boundaries.end.line.saturating_add(1)
        } else {
            boundaries.end.line
        };
        Some(Self::new(boundaries.start.line, end))
    }

    /// Number of selected lines.
    #[must_use]
    pub const fn len(self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the selection covers no lines.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.end <= self.start
    }

    /// Whether `line` is selected.
    #[must_use]
    pub const fn contains(self, line: u32) -> bool {
        line >= self.start && line < self.end
    }

    /// Selected lines of `text`, without terminators.
    #[must_use]
    pub fn extract(self, text: &str) -> Vec<&str> {
        text.lines()
            .skip(usize::try_from(self.start).unwrap_or(usize::MAX))
            .take(usize::try_from(self.len()).unwrap_or(usize::MAX))
            .collect()
    }
}

/// One-based, inclusive rendering used in user-facing output.
impl fmt::Display for LineSelection {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "lines {}-{}", self.start.saturating_add(1), self.end)
    }
}
