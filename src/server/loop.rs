// Server loop module
// Explicit server object: owns the listener and accepts until shutdown

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// How long in-flight connections get after the listener closes
const DRAIN_GRACE: Duration = Duration::from_secs(5);
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Redirect server bound to a single listener
pub struct Server {
    listener: TcpListener,
    state: Arc<AppState>,
    active_connections: Arc<AtomicUsize>,
}

impl Server {
    pub fn new(listener: TcpListener, state: Arc<AppState>) -> Self {
        Self {
            listener,
            state,
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` is notified, then drain.
    ///
    /// Accept errors are logged and do not stop the loop.
    #[allow(clippy::ignored_unit_patterns)]
    pub async fn run(self, shutdown: Arc<Notify>) {
        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            accept_connection(
                                stream,
                                peer_addr,
                                &self.state,
                                &self.active_connections,
                            );
                        }
                        Err(e) => {
                            logger::log_error(&format!("Failed to accept connection: {e}"));
                        }
                    }
                }

                _ = shutdown.notified() => {
                    break;
                }
            }
        }

        drop(self.listener);
        logger::log_shutdown(self.active_connections.load(Ordering::SeqCst));
        drain(&self.active_connections).await;
    }
}

/// Wait for active connections to finish, up to `DRAIN_GRACE`
async fn drain(active_connections: &AtomicUsize) {
    let deadline = tokio::time::Instant::now() + DRAIN_GRACE;
    while active_connections.load(Ordering::SeqCst) > 0 {
        if tokio::time::Instant::now() >= deadline {
            logger::log_warning(&format!(
                "Drain period elapsed with {} connection(s) still open",
                active_connections.load(Ordering::SeqCst)
            ));
            return;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
}
