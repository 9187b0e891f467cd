// Server loop module
// Accepts connections until shutdown, then drains open connections

use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::connection::{accept_connection, ConnectionTracker};
use super::signal::SignalHandler;
use crate::config::AppState;

/// Accept connections until `signals` requests shutdown.
///
/// After the listener closes, open connections get
/// `performance.shutdown_grace_period` to finish their current responses.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    signals: Arc<SignalHandler>,
) -> io::Result<()> {
    let tracker = Arc::new(ConnectionTracker::new());

    loop {
        let shutdown = signals.shutdown.notified();
        if signals.is_shutdown_requested() {
            break;
        }

        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &tracker, &signals);
                    }
                    Err(e) => {
                        state.logger.error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            () = shutdown => break,
        }
    }

    let addr = listener.local_addr()?;
    drop(listener);

    let grace = state.config.performance.shutdown_grace_period();
    let open = tracker.active();
    state.logger.info(&format!(
        "Stopped listening on {addr}; waiting up to {}s for {open} open connection(s)",
        grace.as_secs()
    ));

    if tokio::time::timeout(grace, tracker.wait_idle()).await.is_err() {
        state.logger.warn(&format!(
            "Shutdown grace period elapsed with {} connection(s) still open",
            tracker.active()
        ));
    } else {
        state.logger.info("All connections closed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::logger::{Level, LogBuffer, Logger};
    use crate::server::create_reusable_listener;
    use crate::storage::testing::{fixed_time, pattern, RecordingStore, BUCKET};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::task::JoinHandle;

    struct Running {
        addr: SocketAddr,
        signals: Arc<SignalHandler>,
        store: Arc<RecordingStore>,
        buffer: LogBuffer,
        task: JoinHandle<io::Result<()>>,
    }

    async fn start(max_connections: Option<usize>) -> Running {
        let store = Arc::new(RecordingStore::new(8));
        store
            .inner()
            .insert(BUCKET, "clip.mp4", pattern(1000), None, fixed_time())
            .await;

        let mut config = Config::for_tests(BUCKET);
        config.performance.max_connections = max_connections;
        let (logger, buffer) = Logger::capture(Level::Debug);
        let state = Arc::new(AppState::new(config, store.clone(), Arc::new(logger)));

        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let signals = Arc::new(SignalHandler::new());
        let task = tokio::spawn(start_server_loop(listener, state, Arc::clone(&signals)));
        Running {
            addr,
            signals,
            store,
            buffer,
            task,
        }
    }

    async fn roundtrip(addr: SocketAddr, request: &str) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serves_range_over_tcp() {
        let server = start(None).await;
        let response = roundtrip(
            server.addr,
            "GET /clip.mp4 HTTP/1.1\r\nHost: test\r\nRange: bytes=100-109\r\nConnection: close\r\n\r\n",
        )
        .await;

        let text = String::from_utf8_lossy(&response);
        assert!(text.starts_with("HTTP/1.1 206 Partial Content\r\n"), "{text}");
        assert!(text.to_ascii_lowercase().contains("content-range: bytes 100-109/1000"));
        assert!(response.ends_with(&pattern(1000)[100..110]));
        assert_eq!(server.store.opened_at(), vec![100]);

        server.signals.request_shutdown();
        tokio::time::timeout(Duration::from_secs(2), server.task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(server.buffer.contains("All connections closed"));
        assert_eq!(server.store.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_idle_keep_alive_connection_closes_on_shutdown() {
        let server = start(None).await;
        let mut stream = TcpStream::connect(server.addr).await.unwrap();
        stream
            .write_all(b"HEAD /clip.mp4 HTTP/1.1\r\nHost: test\r\n\r\n")
            .await
            .unwrap();
        let mut buf = [0u8; 512];
        let n = stream.read(&mut buf).await.unwrap();
        assert!(buf[..n].starts_with(b"HTTP/1.1 200 OK\r\n"));

        server.signals.request_shutdown();
        tokio::time::timeout(Duration::from_secs(2), server.task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        // The server side has hung up
        assert_eq!(stream.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let server = start(Some(1)).await;
        let mut held = TcpStream::connect(server.addr).await.unwrap();
        held.write_all(b"HEAD /clip.mp4 HTTP/1.1\r\nHost: test\r\n\r\n")
            .await
            .unwrap();
        let mut buf = [0u8; 512];
        assert!(held.read(&mut buf).await.unwrap() > 0);

        // Second connection is accepted by the kernel, then dropped unanswered
        let mut rejected = TcpStream::connect(server.addr).await.unwrap();
        let read = tokio::time::timeout(Duration::from_secs(2), rejected.read(&mut buf))
            .await
            .unwrap();
        assert!(matches!(read, Ok(0) | Err(_)));
        assert!(server.buffer.contains("[WARN] Max connections reached (1)"));

        server.signals.request_shutdown();
        server.task.await.unwrap().unwrap();
    }
}
