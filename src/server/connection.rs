// Connection handling module
// Accepts a single TCP connection and serves HTTP/1.1 on it

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Notify;

use super::signal::SignalHandler;
use crate::config::AppState;
use crate::handler;

/// Counts open connections and wakes waiters when the count drops to zero
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    active: AtomicUsize,
    idle: Notify,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Reserve a slot, or `None` when `max` connections are already open
    pub fn try_acquire(self: &Arc<Self>, max: Option<usize>) -> Option<ConnectionGuard> {
        // Increment first, then check limit, so concurrent accepts cannot both pass
        let prev = self.active.fetch_add(1, Ordering::SeqCst);
        if max.is_some_and(|max| prev >= max) {
            self.release();
            return None;
        }
        Some(ConnectionGuard(Arc::clone(self)))
    }

    fn release(&self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Resolve once no connection is open
    pub async fn wait_idle(&self) {
        loop {
            let idle = self.idle.notified();
            if self.active() == 0 {
                return;
            }
            idle.await;
        }
    }
}

/// Open-connection slot, released on drop
#[derive(Debug)]
pub struct ConnectionGuard(Arc<ConnectionTracker>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Accept a connection if the limit allows and serve it on its own task
pub fn accept_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    tracker: &Arc<ConnectionTracker>,
    signals: &Arc<SignalHandler>,
) {
    let max = state.config.performance.max_connections;
    let Some(guard) = tracker.try_acquire(max) else {
        state.logger.warn(&format!(
            "Max connections reached ({}). Connection from {peer_addr} rejected.",
            max.unwrap_or_default()
        ));
        drop(stream);
        return;
    };

    state
        .logger
        .debug(&format!("Accepted connection from {peer_addr}"));

    handle_connection(
        stream,
        peer_addr,
        Arc::clone(state),
        Arc::clone(signals),
        guard,
    );
}

/// Serve HTTP/1.1 on `stream` until the client leaves or shutdown completes.
///
/// On shutdown the connection finishes its in-flight response and then
/// closes instead of waiting for the next keep-alive request.
fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    signals: Arc<SignalHandler>,
    guard: ConnectionGuard,
) {
    tokio::spawn(async move {
        let _guard = guard;
        let io = TokioIo::new(stream);

        let mut builder = http1::Builder::new();
        builder
            .keep_alive(state.config.performance.keep_alive)
            .timer(TokioTimer::new())
            .header_read_timeout(state.config.performance.header_read_timeout());

        let service_state = Arc::clone(&state);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| {
                handler::handle_request(req, peer_addr, Arc::clone(&service_state))
            }),
        );
        tokio::pin!(conn);

        let shutdown = signals.shutdown.notified();
        let result = if signals.is_shutdown_requested() {
            conn.as_mut().graceful_shutdown();
            conn.await
        } else {
            tokio::select! {
                result = conn.as_mut() => result,
                () = shutdown => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            }
        };

        if let Err(err) = result {
            // Clients that vanish mid-request are routine
            if err.is_incomplete_message() || err.is_canceled() {
                state
                    .logger
                    .debug(&format!("Connection from {peer_addr} closed early: {err}"));
            } else {
                state.logger.connection_error(&peer_addr, &err);
            }
        }
    });
}
