//! Access log writer module
//!
//! Provides thread-safe writing of access log lines to a file or stdout.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Log output target
#[derive(Debug)]
enum LogTarget {
    /// Write to stdout
    Stdout,
    /// Write to file
    File(File),
}

/// Thread-safe log writer
#[derive(Debug)]
pub struct LogWriter {
    access: Mutex<LogTarget>,
}

impl LogWriter {
    /// Stdout unless a file path is given
    pub fn open(access_log_file: Option<&str>) -> io::Result<Self> {
        let access = match access_log_file {
            Some(path) => LogTarget::File(open_log_file(path)?),
            None => LogTarget::Stdout,
        };

        Ok(Self {
            access: Mutex::new(access),
        })
    }

    /// Write one access log line
    pub fn write_access(&self, message: &str) {
        let mut target = self.access.lock().unwrap_or_else(PoisonError::into_inner);
        let result = match &mut *target {
            LogTarget::Stdout => writeln!(io::stdout().lock(), "{message}"),
            LogTarget::File(file) => writeln!(file, "{message}"),
        };
        if let Err(e) = result {
            log::warn!("Failed writing access log: {e}");
        }
    }
}

/// Open or create a log file for appending
pub fn open_log_file(path: &str) -> io::Result<File> {
    // Create parent directories if they don't exist
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}
