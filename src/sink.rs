//! Sink listener: a local target for the exerciser.
//!
//! Accepts TCP connections and drains whatever arrives without
//! interpreting it. Each connection gets a correlation id, an overall
//! deadline, and an idle read timeout; the listener caps how many
//! connections are in flight at once.

use crate::config::Config;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

/// Why a drained connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainEnd {
    /// Peer closed the connection
    Eof,
    /// No data arrived within the idle read timeout
    IdleTimeout,
    /// The overall per-connection deadline expired
    Deadline,
    /// Read error (reset, aborted, ...)
    Error,
}

/// Sink listener instance
pub struct Sink {
    listen: String,
    connection_deadline: Duration,
    read_wait: Duration,
    buffer_size: usize,
    connection_limit: Arc<Semaphore>,
    next_id: AtomicUsize,
}

impl Sink {
    /// Create a sink bound to the configured host/port
    pub fn new(config: &Config) -> Self {
        Sink {
            listen: format!("{}:{}", config.host, config.port),
            connection_deadline: Duration::from_secs(config.max_connection_secs),
            read_wait: Duration::from_secs(config.read_wait_secs),
            buffer_size: config.buffer_kb * 1024,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Listen and drain connections until ctrl-c
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.listen).await?;
        info!(address = %self.listen, "Sink listening");

        tokio::select! {
            result = self.serve(listener) => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                Ok(())
            }
        }
    }

    /// Accept loop. Each accepted connection runs on its own task; a
    /// semaphore permit is held for the connection's lifetime.
    async fn serve(
        &self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        loop {
            // Wait for a connection slot
            let permit = self.connection_limit.clone().acquire_owned().await?;

            match listener.accept().await {
                Ok((stream, addr)) => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    debug!(id, peer = %addr, "Connection established");

                    let deadline = self.connection_deadline;
                    let read_wait = self.read_wait;
                    let buffer_size = self.buffer_size;

                    tokio::spawn(async move {
                        let (bytes, end) =
                            drain_connection(stream, id, deadline, read_wait, buffer_size).await;
                        match end {
                            DrainEnd::Eof => info!(id, bytes, "Connection closed by peer"),
                            DrainEnd::IdleTimeout => warn!(id, bytes, "Connection idle, closing"),
                            DrainEnd::Deadline => warn!(id, bytes, "Connection deadline reached"),
                            DrainEnd::Error => debug!(id, bytes, "Connection errored"),
                        }
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Read a connection to completion. Returns the byte count and how the
/// connection ended. The stream closes when this scope unwinds.
async fn drain_connection(
    mut stream: TcpStream,
    id: usize,
    deadline: Duration,
    read_wait: Duration,
    buffer_size: usize,
) -> (usize, DrainEnd) {
    let started = tokio::time::Instant::now();
    let mut buffer = vec![0u8; buffer_size];
    let mut total = 0usize;

    loop {
        if started.elapsed() >= deadline {
            return (total, DrainEnd::Deadline);
        }
        let wait = read_wait.min(deadline - started.elapsed());

        match timeout(wait, stream.read(&mut buffer)).await {
            Ok(Ok(0)) => return (total, DrainEnd::Eof),
            Ok(Ok(n)) => {
                total += n;
                trace!(id, n, "drained bytes");
            }
            Ok(Err(e)) => {
                debug!(id, error = %e, "read error");
                return (total, DrainEnd::Error);
            }
            Err(_) => {
                let end = if started.elapsed() >= deadline {
                    DrainEnd::Deadline
                } else {
                    DrainEnd::IdleTimeout
                };
                return (total, end);
            }
        }
    }
}
