// Engine configuration module
// Immutable settings shared by every transfer, resolved once at startup

use hyper::StatusCode;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::types::{AccessPolicy, FilesConfig};
use crate::error::StartupError;

/// One year in seconds, the upper bound for `max-age`
pub const MAX_MAX_AGE: u64 = 31_536_000;

/// Settings of the file-transfer engine.
///
/// `root` is canonical and absolute; it is fixed once the value is built.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    root: PathBuf,
    pub etag: bool,
    pub last_modified: bool,
    /// Seconds, already clamped to `MAX_MAX_AGE`
    pub max_age: u64,
    pub dot_files: AccessPolicy,
    pub directory: AccessPolicy,
    pub index: Vec<String>,
    pub extensions: Vec<String>,
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub error_pages: HashMap<StatusCode, String>,
    pub favicon: Option<String>,
}

impl TransferConfig {
    /// Engine settings with the library defaults: validators on, no caching,
    /// dot files ignored, directories ignored, no index documents.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StartupError> {
        Ok(Self {
            root: canonical_root(root.as_ref())?,
            etag: true,
            last_modified: true,
            max_age: 0,
            dot_files: AccessPolicy::Ignore,
            directory: AccessPolicy::Ignore,
            index: Vec::new(),
            extensions: Vec::new(),
            start: None,
            end: None,
            error_pages: HashMap::new(),
            favicon: None,
        })
    }

    /// Resolve the `[files]` configuration section
    pub fn from_files(files: &FilesConfig) -> Result<Self, StartupError> {
        let mut error_pages = HashMap::with_capacity(files.error_pages.len());
        for (code, page) in &files.error_pages {
            let status = code
                .trim()
                .parse::<u16>()
                .ok()
                .and_then(|c| StatusCode::from_u16(c).ok())
                .filter(|s| s.is_client_error() || s.is_server_error())
                .ok_or_else(|| StartupError::ErrorPageStatus(code.clone()))?;
            error_pages.insert(status, page.clone());
        }

        Ok(Self {
            root: canonical_root(&files.root)?,
            etag: files.etag,
            last_modified: files.last_modified,
            max_age: clamp_max_age(files.max_age),
            dot_files: files.dot_files,
            directory: files.directory,
            index: files.index.clone(),
            extensions: files.extensions.clone(),
            start: files.start,
            end: files.end,
            error_pages,
            favicon: files.favicon.clone().filter(|f| !f.is_empty()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Negative values mean "as long as possible"
pub fn clamp_max_age(max_age: i64) -> u64 {
    u64::try_from(max_age).map_or(MAX_MAX_AGE, |age| age.min(MAX_MAX_AGE))
}

fn canonical_root(root: &Path) -> Result<PathBuf, StartupError> {
    let canonical = std::fs::canonicalize(root).map_err(|source| StartupError::Root {
        path: root.to_path_buf(),
        source,
    })?;
    if !canonical.is_dir() {
        return Err(StartupError::RootNotDirectory(canonical));
    }
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files_config(root: &Path) -> FilesConfig {
        FilesConfig {
            root: root.to_path_buf(),
            etag: true,
            last_modified: false,
            max_age: 60,
            dot_files: AccessPolicy::Deny,
            directory: AccessPolicy::Allow,
            index: vec!["index.html".to_string()],
            extensions: vec!["html".to_string()],
            start: None,
            end: None,
            error_pages: HashMap::from([("404".to_string(), "/404.html".to_string())]),
            favicon: Some(String::new()),
        }
    }

    #[test]
    fn test_max_age_clamping() {
        assert_eq!(clamp_max_age(0), 0);
        assert_eq!(clamp_max_age(3600), 3600);
        assert_eq!(clamp_max_age(-1), MAX_MAX_AGE);
        assert_eq!(clamp_max_age(i64::MAX), MAX_MAX_AGE);
    }

    #[test]
    fn test_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = TransferConfig::from_files(&files_config(dir.path())).unwrap();

        assert!(config.root().is_absolute());
        assert_eq!(config.root(), dir.path().canonicalize().unwrap());
        assert!(!config.last_modified);
        assert_eq!(config.max_age, 60);
        assert_eq!(config.dot_files, AccessPolicy::Deny);
        assert_eq!(
            config.error_pages.get(&StatusCode::NOT_FOUND).map(String::as_str),
            Some("/404.html")
        );
        assert!(config.favicon.is_none());
    }

    #[test]
    fn test_relative_root_is_canonicalized() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("site")).unwrap();
        let config = TransferConfig::new(dir.path().join("site/../site/.")).unwrap();
        assert_eq!(config.root(), dir.path().join("site").canonicalize().unwrap());
    }

    #[test]
    fn test_invalid_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            TransferConfig::new(dir.path().join("missing")),
            Err(StartupError::Root { .. })
        ));

        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(
            TransferConfig::new(&file),
            Err(StartupError::RootNotDirectory(_))
        ));
    }

    #[test]
    fn test_invalid_error_page_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = files_config(dir.path());
        files.error_pages = HashMap::from([("200".to_string(), "/ok.html".to_string())]);
        assert!(matches!(
            TransferConfig::from_files(&files),
            Err(StartupError::ErrorPageStatus(_))
        ));
    }
}
