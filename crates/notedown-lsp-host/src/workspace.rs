//! Workspace discovery.
//!
//! A workspace is any directory that contains the marker directory
//! (`.notedown` unless configured otherwise). Discovery walks from a
//! document's directory towards the filesystem root and stops at the first
//! match, so nested workspaces shadow their ancestors.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use lsp_types::Uri;
use tracing::{debug, trace};

use crate::uri::{UriConversionError, path_to_uri};

const WORKSPACE_TARGET: &str = "notedown_lsp_host::workspace";

/// Default name of the directory marking a workspace root.
pub const DEFAULT_MARKER: &str = ".notedown";

/// Absolute directory that contains the workspace marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkspaceRoot(PathBuf);

impl WorkspaceRoot {
    /// Wraps a directory path without checking for the marker.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Directory path of the root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// `file://` URI of the root, as sent in `rootUri`.
    ///
    /// # Errors
    ///
    /// Returns [`UriConversionError`] when the root is not absolute.
    pub fn uri(&self) -> Result<Uri, UriConversionError> {
        path_to_uri(&self.0)
    }

    /// Final path component, used as the workspace folder name.
    #[must_use]
    pub fn name(&self) -> String {
        self.0.file_name().map_or_else(
            || self.0.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        )
    }
}

impl fmt::Display for WorkspaceRoot {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0.display())
    }
}

/// Finds the workspace root enclosing a path.
///
/// Results are never cached; every call consults the filesystem so a marker
/// created mid-session is honoured by the next lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLocator {
    marker: String,
}

impl Default for WorkspaceLocator {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER)
    }
}

impl WorkspaceLocator {
    /// Builds a locator that looks for `marker` directories.
    #[must_use]
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// Marker directory name.
    #[must_use]
    pub fn marker(&self) -> &str {
        self.marker.as_str()
    }

    /// Returns the nearest root above the file at `path`.
    ///
    /// The search starts from the file's parent directory. The file itself
    /// need not exist. An empty path yields `None` without any filesystem
    /// access.
    #[must_use]
    pub fn locate(&self, path: &Path) -> Option<WorkspaceRoot> {
        if path.as_os_str().is_empty() {
            return None;
        }
        let resolved = resolve(path);
        let start = resolved.parent()?;
        self.walk(start)
    }

    /// Returns the nearest root at or above the directory `dir`.
    #[must_use]
    pub fn locate_from_dir(&self, dir: &Path) -> Option<WorkspaceRoot> {
        if dir.as_os_str().is_empty() {
            return None;
        }
        self.walk(&resolve(dir))
    }

    /// Whether `dir` itself carries the marker.
    #[must_use]
    pub fn is_root(&self, dir: &Path) -> bool {
        dir.join(&self.marker).is_dir()
    }

    fn walk(&self, start: &Path) -> Option<WorkspaceRoot> {
        let mut current = Some(start);
        while let Some(dir) = current {
            trace!(target: WORKSPACE_TARGET, dir = %dir.display(), "checking for marker");
            if self.is_root(dir) {
                debug!(
                    target: WORKSPACE_TARGET,
                    root = %dir.display(),
                    marker = %self.marker,
                    "workspace root found"
                );
                return Some(WorkspaceRoot::new(dir));
            }
            current = dir.parent();
        }
        None
    }
}

/// Canonical form of `path`, tolerating files that do not exist yet.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }

    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Ok(canonical) = fs::canonicalize(parent) {
            return canonical.join(name);
        }
    }

    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
