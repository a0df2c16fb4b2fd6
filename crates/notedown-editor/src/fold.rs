//! Fold levels in `foldexpr` notation.

use std::fmt;

use lsp_types::FoldingRange;

/// Fold level of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FoldLevel {
    /// A fold of this level starts on the line (`">N"`).
    Start(u32),
    /// The line sits at this level (`"N"`).
    Level(u32),
}

impl FoldLevel {
    /// Numeric level regardless of whether a fold starts here.
    #[must_use]
    pub const fn depth(self) -> u32 {
        match self {
            Self::Start(depth) | Self::Level(depth) => depth,
        }
    }
}

impl fmt::Display for FoldLevel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start(depth) => write!(formatter, ">{depth}"),
            Self::Level(depth) => write!(formatter, "{depth}"),
        }
    }
}

/// Per-line fold levels for a document of `line_count` lines.
///
/// A line's level is the number of ranges enclosing it. Ranges that end on
/// or before their start line are ignored and ranges running past the end of
/// the document are clipped.
#[must_use]
pub fn fold_levels(ranges: &[FoldingRange], line_count: u32) -> Vec<FoldLevel> {
    let count = usize::try_from(line_count).unwrap_or(0);
    let mut depths = vec![0_u32; count];
    let mut starts = vec![false; count];

    for range in ranges.iter().filter(|range| range.end_line > range.start_line) {
        let (Ok(start), Ok(end)) = (
            usize::try_from(range.start_line),
            usize::try_from(range.end_line),
        ) else {
            continue;
        };
        if let Some(flag) = starts.get_mut(start) {
            *flag = true;
        }
        for depth in depths.iter_mut().take(end.saturating_add(1)).skip(start) {
            *depth += 1;
        }
    }

    depths
        .into_iter()
        .zip(starts)
        .map(|(depth, starts_here)| {
            if starts_here {
                FoldLevel::Start(depth)
            } else {
                FoldLevel::Level(depth)
            }
        })
        .collect()
}
