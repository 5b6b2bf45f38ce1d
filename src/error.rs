//! Error types
//!
//! `TransferError` is what every engine stage returns; the error policy turns it into a response.
//! `StartupError` covers everything that can go wrong before the server accepts connections.

use hyper::StatusCode;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single transfer, classified by the HTTP status it maps to
#[derive(Debug, Error)]
pub enum TransferError {
    /// Malformed percent-encoding, invalid UTF-8 or a NUL byte in the path
    #[error("bad request: {0}")]
    BadRequest(&'static str),

    /// Traversal attempt, denied dot file or denied directory
    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    /// Missing resource, ignored dot file or ignored directory
    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    /// The requested byte range lies outside of the resource
    #[error("range not satisfiable, resource length {length}")]
    RangeNotSatisfiable { length: u64 },

    /// Unexpected filesystem failure or misuse of the response; never shown to the client
    #[error("internal error: {context}")]
    Internal {
        context: String,
        #[source]
        source: Option<io::Error>,
    },
}

impl TransferError {
    pub fn internal(context: impl Into<String>, source: io::Error) -> Self {
        Self::Internal {
            context: context.into(),
            source: Some(source),
        }
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Classifies a failed stat/open call: missing entries become 404, anything else 500.
    pub fn from_io(path: &std::path::Path, err: io::Error) -> Self {
        if is_not_found(&err) {
            Self::NotFound
        } else {
            Self::internal(format!("failed accessing {}", path.display()), err)
        }
    }
}

/// "Entry not found", "name too long" and "not a directory" all mean the resource does not exist.
pub fn is_not_found(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory | io::ErrorKind::InvalidFilename
    )
}

/// Errors preventing the server from starting
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed loading configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("root directory {path:?} is not accessible: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("root path {0:?} is not a directory")]
    RootNotDirectory(PathBuf),

    #[error("invalid status code {0:?} in files.error_pages")]
    ErrorPageStatus(String),

    #[error("invalid listen address {0}")]
    Address(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}
