//! Resource lookup
//!
//! Finds the concrete file behind a resolved request path: the path itself, an index document
//! or an extension fallback. Directories are classified by the configured policy.

use std::ffi::OsString;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;

use crate::config::{AccessPolicy, TransferConfig};
use crate::error::{is_not_found, TransferError};
use crate::http::SafePath;

/// Filesystem entry picked to answer a request, taken from a fresh stat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResource {
    pub path: PathBuf,
    pub size: u64,
    pub mtime: SystemTime,
    pub is_directory: bool,
}

impl ResolvedResource {
    fn new(path: PathBuf, meta: &Metadata) -> Self {
        Self {
            path,
            size: meta.len(),
            mtime: meta.modified().unwrap_or(UNIX_EPOCH),
            is_directory: meta.is_dir(),
        }
    }
}

/// Result of the lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    File(ResolvedResource),
    /// Directory whose listing may be shown
    Listing(ResolvedResource),
    /// Location to send the client to, relative to the server (query string not included)
    Redirect(String),
}

pub async fn locate(safe: &SafePath, config: &TransferConfig) -> Result<Located, TransferError> {
    let path = safe.path();

    if safe.has_trailing_slash() && !config.index.is_empty() {
        let meta = stat(path).await?;
        if !meta.is_dir() {
            log::debug!("{} is not a directory", path.display());
            return Err(TransferError::NotFound);
        }
        let candidates = config.index.iter().map(|name| path.join(name));
        if let Some(found) = probe(candidates).await {
            log::debug!("Serving index document {}", found.path.display());
            return Ok(Located::File(found));
        }
        return directory_policy(ResolvedResource::new(path.to_path_buf(), &meta), config);
    }

    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => {
            if safe.has_trailing_slash() {
                directory_policy(ResolvedResource::new(path.to_path_buf(), &meta), config)
            } else {
                Ok(Located::Redirect(redirect_location(safe.raw())))
            }
        }
        Ok(_) if safe.has_trailing_slash() => {
            log::debug!("{} is not a directory", path.display());
            Err(TransferError::NotFound)
        }
        Ok(meta) => Ok(Located::File(ResolvedResource::new(path.to_path_buf(), &meta))),
        Err(e) => {
            if is_not_found(&e) && !safe.has_trailing_slash() && !config.extensions.is_empty() {
                let candidates = config.extensions.iter().map(|ext| with_extension(path, ext));
                if let Some(found) = probe(candidates).await {
                    log::debug!("Serving extension fallback {}", found.path.display());
                    return Ok(Located::File(found));
                }
            }
            Err(TransferError::from_io(path, e))
        }
    }
}

/// First candidate that exists and is not a directory
async fn probe(candidates: impl Iterator<Item = PathBuf>) -> Option<ResolvedResource> {
    for candidate in candidates {
        match fs::metadata(&candidate).await {
            Ok(meta) if !meta.is_dir() => return Some(ResolvedResource::new(candidate, &meta)),
            Ok(_) => {}
            Err(e) => log::trace!("Candidate {} rejected: {e}", candidate.display()),
        }
    }
    None
}

async fn stat(path: &Path) -> Result<Metadata, TransferError> {
    fs::metadata(path)
        .await
        .map_err(|e| TransferError::from_io(path, e))
}

fn directory_policy(
    directory: ResolvedResource,
    config: &TransferConfig,
) -> Result<Located, TransferError> {
    match config.directory {
        AccessPolicy::Allow => Ok(Located::Listing(directory)),
        AccessPolicy::Deny => Err(TransferError::Forbidden("directory access denied")),
        AccessPolicy::Ignore => Err(TransferError::NotFound),
    }
}

/// Slash-terminated location for a directory. Leading slashes and backslashes collapse to one
/// slash, a `//host/` location would leave the server.
fn redirect_location(raw: &str) -> String {
    format!("/{}/", raw.trim_start_matches(['/', '\\']))
}

/// `file` + `html` gives `file.html`
fn with_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ext.trim_start_matches('.'));
    PathBuf::from(name)
}
