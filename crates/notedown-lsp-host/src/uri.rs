//! Conversion between filesystem paths and `file://` URIs.

use std::path::{Path, PathBuf};

use lsp_types::Uri;
use thiserror::Error;
use url::Url;

/// A path or URI that cannot be expressed in the other form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriConversionError {
    /// Relative paths have no `file://` representation.
    #[error("path '{path}' cannot be expressed as a file URI")]
    NotAbsolute {
        /// Offending path.
        path: PathBuf,
    },
    /// The URI produced by `url` was rejected by `lsp-types`.
    #[error("'{uri}' is not a valid URI")]
    Invalid {
        /// Offending URI text.
        uri: String,
    },
}

/// Converts an absolute path to a `file://` URI.
///
/// Percent-encoding follows the `url` crate.
///
/// # Errors
///
/// Returns [`UriConversionError`] when the path is relative or the encoded
/// URI does not parse.
pub fn path_to_uri(path: &Path) -> Result<Uri, UriConversionError> {
    let url = Url::from_file_path(path).map_err(|()| UriConversionError::NotAbsolute {
        path: path.to_path_buf(),
    })?;
    url.as_str()
        .parse()
        .map_err(|_| UriConversionError::Invalid {
            uri: String::from(url.as_str()),
        })
}

/// Converts a `file://` URI back to a path.
///
/// Returns `None` for non-file schemes.
#[must_use]
pub fn uri_to_path(uri: &Uri) -> Option<PathBuf> {
    let url = Url::parse(uri.as_str()).ok()?;
    url.to_file_path().ok()
}
