// Connection handling module
// Accepts and serves single TCP connections

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::config::AppState;
use crate::handler;

/// Accept a connection unless the connection limit is reached.
pub fn accept_connection(stream: TcpStream, peer_addr: SocketAddr, state: &Arc<AppState>) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = state.active_connections.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            // Exceeded limit: rollback counter and reject
            state.active_connections.fetch_sub(1, Ordering::SeqCst);
            log::warn!("Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected.");
            drop(stream);
            return;
        }
    }

    log::debug!("Accepted connection from {peer_addr}");
    handle_connection(stream, peer_addr, Arc::clone(state));
}

/// Serve a single connection in a spawned task.
///
/// HTTP/1.1 with optional keep-alive, bounded by the configured connection timeout (0 means
/// unbounded). The connection counter is decremented when the task ends.
fn handle_connection(stream: TcpStream, peer_addr: SocketAddr, state: Arc<AppState>) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);
        let timeout_secs = state.config.performance.connection_timeout;

        let mut builder = http1::Builder::new();
        builder.keep_alive(state.config.performance.keep_alive);

        let service_state = Arc::clone(&state);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| handler::handle_request(req, Arc::clone(&service_state), peer_addr)),
        );

        let result = if timeout_secs > 0 {
            tokio::time::timeout(Duration::from_secs(timeout_secs), conn).await
        } else {
            Ok(conn.await)
        };

        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => log::debug!("Connection from {peer_addr} failed: {err}"),
            Err(_) => log::warn!("Connection from {peer_addr} timed out after {timeout_secs} seconds"),
        }

        state.active_connections.fetch_sub(1, Ordering::SeqCst);
    });
}
