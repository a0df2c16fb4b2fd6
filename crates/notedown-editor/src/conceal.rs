//! Conceal marks for wikilink targets.

use std::collections::HashMap;

use lsp_types::Uri;
use notedown_lsp_host::{ConcealKind, ConcealRange};
use tracing::debug;

const CONCEAL_TARGET: &str = "notedown_editor::conceal";

/// A concealed span on one line, in UTF-16 columns, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConcealMark {
    /// Zero-based line.
    pub line: u32,
    /// First concealed column.
    pub start: u32,
    /// Column after the concealed span.
    pub end: u32,
}

/// Converts server ranges into per-line marks.
///
/// Only wikilink targets are concealed. Ranges spanning several lines are
/// split so each mark stays on one line; empty spans are dropped.
#[must_use]
pub fn marks_for_ranges(text: &str, ranges: &[ConcealRange]) -> Vec<ConcealMark> {
    let widths: Vec<u32> = text
        .lines()
        .map(|line| u32::try_from(line.encode_utf16().count()).unwrap_or(u32::MAX))
        .collect();
    let width_of = |line: u32| {
        usize::try_from(line)
            .ok()
            .and_then(|index| widths.get(index).copied())
            .unwrap_or(0)
    };

    let mut marks = Vec::new();
    for range in ranges
        .iter()
        .filter(|range| range.kind == ConcealKind::WikilinkTarget)
    {
        let (start, end) = (range.range.start, range.range.end);
        if end.line < start.line {
            continue;
        }
        for line in start.line..=end.line {
            let from = if line == start.line { start.character } else { 0 };
            let to = if line == end.line {
                end.character
            } else {
                width_of(line)
            };
            if to > from {
                marks.push(ConcealMark {
                    line,
                    start: from,
                    end: to,
                });
            }
        }
    }
    marks.sort_by_key(|mark| (mark.line, mark.start));
    marks
}

#[derive(Debug, Clone)]
struct PaintedMarks {
    version: i32,
    marks: Vec<ConcealMark>,
}

/// Holds the conceal marks currently shown for each document.
#[derive(Debug, Clone, Default)]
pub struct ConcealPainter {
    painted: HashMap<Uri, PaintedMarks>,
}

impl ConcealPainter {
    /// Painter with no marks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the marks for `uri` when the reply matches the document.
    ///
    /// `reply_version` is the version the ranges were computed for and
    /// `current_version` the document's version now. Stale replies are
    /// discarded and `false` is returned.
    pub fn paint(
        &mut self,
        uri: &Uri,
        text: &str,
        current_version: i32,
        reply_version: i32,
        ranges: &[ConcealRange],
    ) -> bool {
        if reply_version != current_version {
            debug!(
                target: CONCEAL_TARGET,
                uri = uri.as_str(),
                reply_version,
                current_version,
                "discarding stale conceal ranges"
            );
            return false;
        }
        let marks = marks_for_ranges(text, ranges);
        debug!(target: CONCEAL_TARGET, uri = uri.as_str(), marks = marks.len(), "painted conceal marks");
        self.painted.insert(
            uri.clone(),
            PaintedMarks {
                version: reply_version,
                marks,
            },
        );
        true
    }

    /// Marks currently painted for `uri`.
    #[must_use]
    pub fn marks(&self, uri: &Uri) -> &[ConcealMark] {
        self.painted
            .get(uri)
            .map_or(&[], |painted| painted.marks.as_slice())
    }

    /// Document version the current marks were painted for.
    #[must_use]
    pub fn painted_version(&self, uri: &Uri) -> Option<i32> {
        self.painted.get(uri).map(|painted| painted.version)
    }

    /// Removes the marks for `uri`.
    pub fn clear(&mut self, uri: &Uri) {
        self.painted.remove(uri);
    }
}
