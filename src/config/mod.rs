// Configuration module entry point
// Loads the layered configuration and resolves it into engine settings

mod state;
mod transfer;
mod types;

use std::net::SocketAddr;

use crate::cli::Opt;
use crate::error::StartupError;

// Re-export public types
pub use state::AppState;
pub use transfer::{TransferConfig, MAX_MAX_AGE};
pub use types::{
    AccessPolicy, Config, FilesConfig, LoggingConfig, PerformanceConfig, ServerConfig,
};

/// Config file looked up when none is given on the command line (extension optional)
pub const DEFAULT_CONFIG_FILE: &str = "filesend";

impl Config {
    /// Load configuration from specified file path (without extension).
    /// Missing files are not an error, every setting has a default.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("FILESEND").separator("__"))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default(
                "server.name",
                concat!("filesend/", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.connection_timeout", 300)?
            .set_default("files.root", ".")?
            .set_default("files.etag", true)?
            .set_default("files.last_modified", true)?
            .set_default("files.max_age", 0)?
            .set_default("files.dot_files", "ignore")?
            .set_default("files.directory", "deny")?
            .set_default("files.index", vec!["index.htm", "index.html"])?
            .build()?;

        settings.try_deserialize()
    }

    /// Loads the configuration file named on the command line (or the default one) and applies
    /// the remaining command line options on top of it.
    pub fn load(opt: &Opt) -> Result<Self, StartupError> {
        let path = opt.config.as_deref().unwrap_or(DEFAULT_CONFIG_FILE);
        let mut config = Self::load_from(path)?;
        config.merge_with_opt(opt);
        Ok(config)
    }

    /// Merges the command line options into the current configuration. Any command line options
    /// present overwrite existing settings.
    pub fn merge_with_opt(&mut self, opt: &Opt) {
        if let Some(root) = &opt.root {
            self.files.root.clone_from(root);
        }

        if let Some(port) = opt.port {
            self.server.port = port;
        }

        if opt.verbose {
            "debug".clone_into(&mut self.logging.level);
        }
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, StartupError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse().map_err(|_| StartupError::Address(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = Config::load_from("does-not-exist/filesend").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.files.index, vec!["index.htm", "index.html"]);
        assert_eq!(config.files.dot_files, AccessPolicy::Ignore);
        assert_eq!(config.files.directory, AccessPolicy::Deny);
        assert!(config.files.etag);
        assert!(config.files.extensions.is_empty());
        assert_eq!(config.logging.access_log_format, "combined");
    }

    #[test]
    fn test_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 9000

[files]
max_age = 600
dot_files = "allow"
extensions = ["html"]
error_pages = { "404" = "/missing.html" }
"#,
        )
        .unwrap();

        let base = dir.path().join("site");
        let config = Config::load_from(base.to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.files.max_age, 600);
        assert_eq!(config.files.dot_files, AccessPolicy::Allow);
        assert_eq!(config.files.extensions, vec!["html"]);
        assert_eq!(
            config.files.error_pages.get("404").map(String::as_str),
            Some("/missing.html")
        );
    }

    #[test]
    fn test_merge_with_opt() {
        let mut config = Config::load_from("does-not-exist/filesend").unwrap();
        let opt = Opt {
            root: Some("/srv/www".into()),
            port: Some(3000),
            config: None,
            verbose: true,
        };
        config.merge_with_opt(&opt);
        assert_eq!(config.files.root, std::path::PathBuf::from("/srv/www"));
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.get_socket_addr().unwrap(),
            "127.0.0.1:3000".parse().unwrap()
        );
    }
}
