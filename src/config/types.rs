// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub files: FilesConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    /// Value of the `Server` response header, empty to omit it
    pub name: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive: bool,
    /// Upper bound for the lifetime of a single connection, in seconds
    pub connection_timeout: u64,
    pub max_connections: Option<u64>,
}

/// Access policy for dot files and directories
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessPolicy {
    /// Serve normally
    Allow,
    /// Respond with 403 Forbidden
    Deny,
    /// Pretend the entry does not exist (404 Not Found)
    #[default]
    Ignore,
}

/// File serving configuration, turned into a `TransferConfig` at startup
#[derive(Debug, Deserialize, Clone)]
pub struct FilesConfig {
    pub root: PathBuf,
    pub etag: bool,
    pub last_modified: bool,
    /// Cache lifetime in seconds; negative means the one year maximum
    pub max_age: i64,
    pub dot_files: AccessPolicy,
    pub directory: AccessPolicy,
    pub index: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
    /// First byte offset to serve from every file
    #[serde(default)]
    pub start: Option<u64>,
    /// Last byte offset (inclusive) to serve from every file
    #[serde(default)]
    pub end: Option<u64>,
    /// Status code to URI path of a custom error page, e.g. `404 = "/404.html"`
    #[serde(default)]
    pub error_pages: HashMap<String, String>,
    /// URI path of the icon served in place of a missing `/favicon.ico`
    #[serde(default)]
    pub favicon: Option<String>,
}
