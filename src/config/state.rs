// Application state module
// Runtime state shared by every connection

use std::sync::atomic::AtomicUsize;

use super::types::Config;
use crate::handler::TransferEngine;

/// Application state
pub struct AppState {
    pub config: Config,
    pub engine: TransferEngine,
    /// Value of the `Server` header, `None` when disabled
    pub server_name: Option<hyper::header::HeaderValue>,
    pub active_connections: AtomicUsize,
}

impl AppState {
    pub fn new(config: Config, engine: TransferEngine) -> Self {
        let server_name = Some(config.server.name.trim())
            .filter(|name| !name.is_empty())
            .and_then(|name| hyper::header::HeaderValue::from_str(name).ok());

        Self {
            config,
            engine,
            server_name,
            active_connections: AtomicUsize::new(0),
        }
    }
}
