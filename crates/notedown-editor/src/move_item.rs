//! Moving a list item past its neighbouring sibling.
//!
//! The coordinator asks the server for the boundaries of the item under the
//! cursor, uses [`sibling_line`] to find a line inside the adjacent sibling,
//! asks for that sibling's boundaries, and then swaps the two blocks with
//! [`move_block`].

use strum::{Display, EnumString};

use crate::selection::LineSelection;

/// Direction a list item moves in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Direction {
    /// Towards the start of the document.
    Up,
    /// Towards the end of the document.
    Down,
}

/// Result of a successful move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedItem {
    /// Document text after the swap.
    pub text: String,
    /// Where the moved item now starts.
    pub item: LineSelection,
    /// Cursor line after the move, keeping its offset within the item.
    pub cursor_line: u32,
}

/// Indentation width of a list item line, or `None` for other lines.
#[must_use]
pub fn list_item_indent(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let indent = line.len() - trimmed.len();
    let bullet = ["- ", "* ", "+ "]
        .iter()
        .any(|marker| trimmed.starts_with(marker))
        || matches!(trimmed, "-" | "*" | "+");
    if bullet || is_ordered_marker(trimmed) {
        Some(indent)
    } else {
        None
    }
}

fn is_ordered_marker(trimmed: &str) -> bool {
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 || digits > 9 {
        return false;
    }
    let rest = trimmed.get(digits..).unwrap_or_default();
    rest.starts_with(". ") || rest.starts_with(") ") || rest == "." || rest == ")"
}

/// A line inside the sibling adjacent to `item`, if one exists.
///
/// Down looks at the line right after the item. Up walks back over deeper
/// lines and blank lines to the nearest item at the same indentation.
#[must_use]
pub fn sibling_line(text: &str, item: LineSelection, direction: Direction) -> Option<u32> {
    let lines: Vec<&str> = text.lines().collect();
    let line_at = |index: u32| lines.get(usize::try_from(index).ok()?).copied();
    let indent = line_at(item.start).and_then(list_item_indent)?;

    match direction {
        Direction::Down => {
            let candidate = line_at(item.end)?;
            (list_item_indent(candidate) == Some(indent)).then_some(item.end)
        }
        Direction::Up => {
            for index in (0..item.start).rev() {
                let line = line_at(index)?;
                if line.trim().is_empty() {
                    continue;
                }
                let line_indent = line.len() - line.trim_start().len();
                match list_item_indent(line) {
                    Some(found) if found == indent => return Some(index),
                    _ if line_indent > indent => {}
                    _ => return None,
                }
            }
            None
        }
    }
}

/// Swaps `item` with the adjacent `sibling`.
///
/// Returns `None` when the blocks are not adjacent in `direction` or do not
/// fit in `text`. Line endings and a trailing newline are preserved.
#[must_use]
pub fn move_block(
    text: &str,
    item: LineSelection,
    sibling: LineSelection,
    direction: Direction,
    cursor_line: u32,
) -> Option<MovedItem> {
    let (upper, lower) = match direction {
        Direction::Down if sibling.start == item.end => (item, sibling),
        Direction::Up if sibling.end == item.start => (sibling, item),
        _ => return None,
    };

    let mut lines: Vec<&str> = text.lines().collect();
    let start = usize::try_from(upper.start).ok()?;
    let middle = usize::try_from(lower.start).ok()?;
    let end = usize::try_from(lower.end).ok()?;
    if end > lines.len() {
        return None;
    }
    lines.get_mut(start..end)?.rotate_left(middle - start);

    let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
    let mut moved = lines.join(newline);
    if text.ends_with('\n') {
        moved.push_str(newline);
    }

    let (item, cursor_line) = match direction {
        Direction::Down => (
            LineSelection::new(item.start + sibling.len(), item.end + sibling.len()),
            cursor_line.saturating_add(sibling.len()),
        ),
        Direction::Up => (
            LineSelection::new(sibling.start, sibling.start + item.len()),
            cursor_line.saturating_sub(sibling.len()),
        ),
    };
    Some(MovedItem {
        text: moved,
        item,
        cursor_line,
    })
}
