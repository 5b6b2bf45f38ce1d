//! Logger module
//!
//! Provides logging utilities for the HTTP server including:
//! - Diagnostic logging through the `log` facade, backed by `env_logger`
//! - Access logging with multiple formats
//! - File-based logging support

mod format;
pub mod writer;

pub use format::AccessLogEntry;
pub use writer::LogWriter;

use crate::config::{Config, LoggingConfig};
use crate::handler::{TransferObserver, TransferReport};
use std::net::SocketAddr;

/// Initialize diagnostic logging
///
/// Should be called once at application startup. `RUST_LOG` takes precedence over the
/// configured level.
pub fn init(config: &LoggingConfig) -> std::io::Result<()> {
    let env = env_logger::Env::default().default_filter_or(config.level.as_str());
    let mut builder = env_logger::Builder::from_env(env);
    if let Some(path) = &config.error_log_file {
        let file = writer::open_log_file(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    if let Err(e) = builder.try_init() {
        log::warn!("Logger already initialized: {e}");
    }
    Ok(())
}

pub fn log_server_start(addr: &SocketAddr, config: &Config, root: &std::path::Path) {
    log::info!("Server started, listening on http://{addr}");
    log::info!("Serving files from {}", root.display());
    log::info!("Log level: {}", config.logging.level);
    if let Some(workers) = config.server.workers {
        log::info!("Worker threads: {workers}");
    }
    if let Some(ref path) = config.logging.access_log_file {
        log::info!("Access log: {path}");
    }
    if let Some(ref path) = config.logging.error_log_file {
        log::info!("Error log: {path}");
    }
}

/// Observer writing one access log line per finished transfer
#[derive(Debug)]
pub struct AccessLog {
    format: String,
    writer: LogWriter,
}

impl AccessLog {
    pub fn new(format: impl Into<String>, writer: LogWriter) -> Self {
        Self {
            format: format.into(),
            writer,
        }
    }

    /// Access log as configured, `None` when disabled
    pub fn from_config(config: &LoggingConfig) -> std::io::Result<Option<Self>> {
        if !config.access_log {
            return Ok(None);
        }
        let writer = LogWriter::open(config.access_log_file.as_deref())?;
        Ok(Some(Self::new(config.access_log_format.clone(), writer)))
    }
}

impl TransferObserver for AccessLog {
    fn finished(&self, report: &TransferReport) {
        self.writer
            .write_access(&AccessLogEntry::from_report(report).format(&self.format));
    }
}
