//! Static file transfer over HTTP.
//!
//! The [`handler::TransferEngine`] maps a request path onto a file below a configured root and
//! streams it back, honoring conditional requests, byte ranges and directory policies. The
//! [`server`] module wraps it in a tokio/hyper HTTP/1.1 server.

pub mod cli;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
