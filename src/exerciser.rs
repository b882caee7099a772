//! Single TCP connection attempt.
//!
//! Opens a stream socket to the target, optionally holds it open to
//! simulate a slow client, writes the payload, and closes. Every error is
//! caught at the attempt boundary; nothing propagates to the caller.

use bytes::Bytes;
use std::io;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Read-only target shared by every attempt
#[derive(Debug, Clone)]
pub struct Target {
    pub host: String,
    pub port: u16,
    /// Bound on the TCP connect
    pub connect_timeout: Duration,
    /// Bound on writing the payload
    pub write_timeout: Duration,
}

impl Target {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// One connection attempt, owned exclusively by the task executing it
#[derive(Debug)]
pub struct Attempt {
    pub target: Target,
    pub payload: Bytes,
    pub hold: Duration,
    /// Correlation id for logging only
    pub id: usize,
}

/// Terminal state of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Connected, held, and wrote the full payload
    Delivered,
    /// Remote actively rejected the connection
    Refused,
    /// Any other I/O failure (timeout, reset, resolution, ...)
    Failed,
}

impl Outcome {
    pub fn delivered(self) -> bool {
        self == Outcome::Delivered
    }
}

/// Internal failure classification, two variants only
#[derive(Debug)]
enum AttemptError {
    Refused,
    Other(io::Error),
}

impl From<io::Error> for AttemptError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::ConnectionRefused {
            AttemptError::Refused
        } else {
            AttemptError::Other(e)
        }
    }
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptError::Refused => write!(f, "connection refused"),
            AttemptError::Other(e) => write!(f, "{e}"),
        }
    }
}

impl Attempt {
    pub fn new(target: Target, payload: Bytes, hold: Duration, id: usize) -> Self {
        Attempt {
            target,
            payload,
            hold,
            id,
        }
    }

    /// Run the attempt to a terminal state. Never returns an error: failures
    /// are logged and folded into the outcome.
    pub async fn run(self) -> Outcome {
        debug!(id = self.id, addr = %self.target.addr(), "trying connection");

        match self.connect_and_send().await {
            Ok(()) => {
                info!(id = self.id, "payload delivered");
                Outcome::Delivered
            }
            Err(AttemptError::Refused) => {
                warn!(
                    id = self.id,
                    addr = %self.target.addr(),
                    "connection refused"
                );
                Outcome::Refused
            }
            Err(AttemptError::Other(e)) => {
                warn!(
                    id = self.id,
                    addr = %self.target.addr(),
                    error = %e,
                    "connection attempt failed"
                );
                Outcome::Failed
            }
        }
    }

    /// Connect, hold, send. The stream is dropped (closed) on every exit
    /// path when this scope unwinds.
    async fn connect_and_send(&self) -> Result<(), AttemptError> {
        let mut stream = timeout(
            self.target.connect_timeout,
            TcpStream::connect(self.target.addr()),
        )
        .await
        .map_err(|_| AttemptError::Other(timed_out("connect timed out")))??;

        debug!(id = self.id, "connected");

        if !self.hold.is_zero() {
            tokio::time::sleep(self.hold).await;
        }

        timeout(self.target.write_timeout, stream.write_all(&self.payload))
            .await
            .map_err(|_| AttemptError::Other(timed_out("write timed out")))??;

        timeout(self.target.write_timeout, stream.shutdown())
            .await
            .map_err(|_| AttemptError::Other(timed_out("shutdown timed out")))??;

        Ok(())
    }
}

fn timed_out(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, msg)
}
