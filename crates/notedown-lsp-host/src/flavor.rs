//! Parser-mode selection.

use std::fmt;
use std::path::Path;

use crate::workspace::{WorkspaceLocator, WorkspaceRoot};

/// Dialect a document is parsed with.
///
/// Documents inside a workspace use the Notedown dialect; everything else is
/// treated as plain Markdown. The label doubles as the LSP `languageId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentFlavor {
    /// Workspace documents.
    Notedown,
    /// Documents outside any workspace.
    Markdown,
}

impl ContentFlavor {
    /// Chooses the flavor for a file by locating its workspace.
    #[must_use]
    pub fn select(locator: &WorkspaceLocator, path: &Path) -> Self {
        Self::for_root(locator.locate(path).as_ref())
    }

    /// Flavor implied by an already-located root.
    #[must_use]
    pub const fn for_root(root: Option<&WorkspaceRoot>) -> Self {
        match root {
            Some(_) => Self::Notedown,
            None => Self::Markdown,
        }
    }

    /// LSP `languageId` for the flavor.
    #[must_use]
    pub const fn language_id(self) -> &'static str {
        match self {
            Self::Notedown => "notedown",
            Self::Markdown => "markdown",
        }
    }
}

impl fmt::Display for ContentFlavor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.language_id())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    #[rstest]
    fn workspace_documents_use_notedown() {
        let dir = TempDir::new().expect("temp dir");
        fs::create_dir(dir.path().join(".notedown")).expect("marker");

        let flavor = ContentFlavor::select(&WorkspaceLocator::default(), &dir.path().join("a.md"));

        assert_eq!(flavor, ContentFlavor::Notedown);
    }

    #[rstest]
    fn loose_documents_use_markdown() {
        let dir = TempDir::new().expect("temp dir");

        let flavor = ContentFlavor::select(&WorkspaceLocator::default(), &dir.path().join("a.md"));

        assert_eq!(flavor, ContentFlavor::Markdown);
        assert_eq!(flavor.to_string(), "markdown");
    }

    #[rstest]
    fn marker_two_levels_up_still_selects_notedown() {
        let dir = TempDir::new().expect("temp dir");
        fs::create_dir(dir.path().join(".notedown")).expect("marker");
        let nested = dir.path().join("journal/2024");
        fs::create_dir_all(&nested).expect("nested folders");

        let flavor = ContentFlavor::select(&WorkspaceLocator::default(), &nested.join("jan.md"));

        assert_eq!(flavor, ContentFlavor::Notedown);
    }
}
