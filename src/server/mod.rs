// Server module entry
// Accept loop, connection handling and graceful shutdown

pub mod connection;
pub mod listener;
pub mod signal;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

use crate::config::AppState;

pub use listener::create_reusable_listener;
pub use signal::{start_signal_handler, SignalHandler};

/// Poll interval while waiting for in-flight connections
const DRAIN_POLL: Duration = Duration::from_millis(100);

/// Accept connections until shutdown is requested, then wait for in-flight connections.
///
/// In-flight connections get at most the configured connection timeout to finish.
pub async fn run(listener: TcpListener, state: Arc<AppState>, signals: Arc<SignalHandler>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => connection::accept_connection(stream, peer_addr, &state),
                Err(e) => log::error!("Failed to accept connection: {e}"),
            },
            () = signals.shutdown.notified() => break,
        }
    }

    drop(listener);
    log::info!("Stopped accepting connections");
    drain(&state).await;
}

async fn drain(state: &AppState) {
    let grace = Duration::from_secs(state.config.performance.connection_timeout);
    let deadline = Instant::now() + grace;

    loop {
        let active = state.active_connections.load(Ordering::SeqCst);
        if active == 0 {
            log::info!("All connections closed, shutting down");
            return;
        }
        if Instant::now() >= deadline {
            log::warn!("Shutting down with {active} connection(s) still open");
            return;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, TransferConfig};
    use crate::handler::TransferEngine;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn start(config: Config) -> (tempfile::TempDir, std::net::SocketAddr, Arc<SignalHandler>, tokio::task::JoinHandle<()>) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hello world").unwrap();
        let engine = TransferEngine::new(TransferConfig::new(dir.path()).unwrap());
        let state = Arc::new(AppState::new(config, engine));

        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let signals = Arc::new(SignalHandler::new());
        let task = tokio::spawn(run(listener, state, Arc::clone(&signals)));
        (dir, addr, signals, task)
    }

    async fn roundtrip(addr: std::net::SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn config() -> Config {
        Config::load_from("does-not-exist/filesend").unwrap()
    }

    #[tokio::test]
    async fn test_serves_file_over_tcp() {
        let (_dir, addr, signals, task) = start(config()).await;

        let response = roundtrip(
            addr,
            "GET /hello.txt HTTP/1.1\r\nHost: localhost\r\nRange: bytes=6-\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 206 Partial Content\r\n"));
        assert!(response.to_ascii_lowercase().contains("content-range: bytes 6-10/11"));
        assert!(response.to_ascii_lowercase().contains("server: filesend/"));
        assert!(response.ends_with("\r\n\r\nworld"));

        signals.request_shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let mut config = config();
        config.performance.max_connections = Some(0);
        let (_dir, addr, signals, task) = start(config).await;

        // Rejected connections are closed without a response
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut buf = Vec::new();
        let read = stream.read_to_end(&mut buf).await.unwrap_or(0);
        assert_eq!(read, 0);

        signals.request_shutdown();
        task.await.unwrap();
    }
}
