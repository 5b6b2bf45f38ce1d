//! Request path resolution
//!
//! Turns the raw request path into a filesystem path confined to the root directory.

use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf};

use crate::config::{AccessPolicy, TransferConfig};
use crate::error::TransferError;

/// A request path that passed every check and is guaranteed to lie below the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafePath {
    path: PathBuf,
    trailing_slash: bool,
    raw: String,
}

impl SafePath {
    /// Absolute filesystem path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the request path ended with a separator
    pub const fn has_trailing_slash(&self) -> bool {
        self.trailing_slash
    }

    /// The request path as received, still percent-encoded
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

const fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Resolve a raw request path against the configured root.
///
/// The lexical parent check runs on the decoded path before it touches the root, the
/// structural check after normalization. Both must pass.
pub fn resolve(raw_path: &str, config: &TransferConfig) -> Result<SafePath, TransferError> {
    if !raw_path.starts_with('/') {
        return Err(TransferError::BadRequest("path is not absolute"));
    }

    if !has_valid_escapes(raw_path) {
        return Err(TransferError::BadRequest("malformed percent-encoding"));
    }
    let decoded = percent_decode_str(raw_path)
        .decode_utf8()
        .map_err(|_| TransferError::BadRequest("path is not valid UTF-8"))?;

    if decoded.contains('\0') {
        return Err(TransferError::BadRequest("path contains a NUL byte"));
    }

    if decoded.split(is_separator).any(|segment| segment == "..") {
        return Err(TransferError::Forbidden("parent directory reference"));
    }

    let root = config.root();
    let mut joined = root.to_path_buf();
    for segment in decoded.split(is_separator) {
        if !segment.is_empty() {
            joined.push(segment);
        }
    }

    let path = normalize(&joined);
    let Ok(relative) = path.strip_prefix(root) else {
        return Err(TransferError::Forbidden("path escapes the root directory"));
    };

    let has_dot_segment = relative
        .components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'));
    if has_dot_segment {
        match config.dot_files {
            AccessPolicy::Allow => {}
            AccessPolicy::Deny => return Err(TransferError::Forbidden("dot file access denied")),
            AccessPolicy::Ignore => return Err(TransferError::NotFound),
        }
    }

    Ok(SafePath {
        path,
        trailing_slash: decoded.ends_with(is_separator),
        raw: raw_path.to_string(),
    })
}

/// Every `%` has to be followed by two hex digits
fn has_valid_escapes(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

/// Lexical normalization, the filesystem is not consulted
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
