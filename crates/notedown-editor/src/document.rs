//! In-memory documents tracked by the coordinator.

use std::path::{Path, PathBuf};

use lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    TextDocumentContentChangeEvent, TextDocumentIdentifier, TextDocumentItem, Uri,
    VersionedTextDocumentIdentifier,
};
use notedown_lsp_host::{ContentFlavor, WorkspaceRoot};

/// An open document and the flavor it was opened with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    uri: Uri,
    path: PathBuf,
    text: String,
    version: i32,
    flavor: ContentFlavor,
    root: Option<WorkspaceRoot>,
}

impl Document {
    /// Opens a document at version 1.
    #[must_use]
    pub fn new(uri: Uri, path: PathBuf, text: String, root: Option<WorkspaceRoot>) -> Self {
        let flavor = ContentFlavor::for_root(root.as_ref());
        Self {
            uri,
            path,
            text,
            version: 1,
            flavor,
            root,
        }
    }

    /// Document URI.
    #[must_use]
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Path on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Current version; starts at 1 and grows with every change.
    #[must_use]
    pub const fn version(&self) -> i32 {
        self.version
    }

    /// Flavor chosen when the document was opened.
    #[must_use]
    pub const fn flavor(&self) -> ContentFlavor {
        self.flavor
    }

    /// Workspace the document belongs to.
    #[must_use]
    pub const fn root(&self) -> Option<&WorkspaceRoot> {
        self.root.as_ref()
    }

    /// Replaces the text and returns the new version.
    pub fn replace_text(&mut self, text: String) -> i32 {
        self.text = text;
        self.version = self.version.saturating_add(1);
        self.version
    }

    /// Line `index` without its terminator.
    #[must_use]
    pub fn line(&self, index: u32) -> Option<&str> {
        self.text.lines().nth(usize::try_from(index).ok()?)
    }

    /// Number of lines.
    #[must_use]
    pub fn line_count(&self) -> u32 {
        u32::try_from(self.text.lines().count()).unwrap_or(u32::MAX)
    }

    pub(crate) fn did_open_params(&self) -> DidOpenTextDocumentParams {
        DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: self.uri.clone(),
                language_id: String::from(self.flavor.language_id()),
                version: self.version,
                text: self.text.clone(),
            },
        }
    }

    pub(crate) fn did_change_params(&self) -> DidChangeTextDocumentParams {
        DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: self.uri.clone(),
                version: self.version,
            },
            content_changes: vec![TextDocumentContentChangeEvent {
                range: None,
                range_length: None,
                text: self.text.clone(),
            }],
        }
    }

    pub(crate) fn did_close_params(&self) -> DidCloseTextDocumentParams {
        DidCloseTextDocumentParams {
            text_document: TextDocumentIdentifier {
                uri: self.uri.clone(),
            },
        }
    }
}
