//! Scenario drivers.
//!
//! Two scenarios exercise the target endpoint:
//! - `run_long`: a single connection with a long slow-client hold.
//! - `run_burst`: N concurrent connections on a bounded worker pool.
//!
//! The burst driver waits for every attempt to reach a terminal state and
//! never lets one attempt's failure abort the others.

use crate::config::Config;
use crate::exerciser::{Attempt, Outcome, Target};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, info};

/// Tally of terminal outcomes from a burst
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BurstReport {
    pub delivered: usize,
    pub refused: usize,
    pub failed: usize,
}

impl BurstReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Delivered => self.delivered += 1,
            Outcome::Refused => self.refused += 1,
            Outcome::Failed => self.failed += 1,
        }
    }

    /// Total attempts that reached a terminal state
    pub fn total(&self) -> usize {
        self.delivered + self.refused + self.failed
    }
}

fn target_from(config: &Config) -> Target {
    Target {
        host: config.host.clone(),
        port: config.port,
        connect_timeout: Duration::from_secs(config.connect_timeout),
        write_timeout: Duration::from_secs(config.write_timeout),
    }
}

/// Scenario A: one synchronous attempt with a long hold. Verifies the
/// target tolerates a slow/idle client.
pub async fn run_long(config: &Config) -> Outcome {
    let target = target_from(config);
    info!(
        addr = %target.addr(),
        hold_secs = config.long_hold,
        "running long-connection scenario"
    );

    let attempt = Attempt::new(
        target,
        Bytes::from(config.long_payload.clone().into_bytes()),
        Duration::from_secs(config.long_hold),
        0,
    );
    attempt.run().await
}

/// Scenario B: a burst of concurrent attempts on a bounded pool. Returns
/// only after all attempts are terminal.
pub async fn run_burst(config: &Config) -> BurstReport {
    let target = target_from(config);
    let payload = Bytes::from(config.burst_payload.clone().into_bytes());
    let hold = Duration::from_secs(config.burst_hold);

    info!(
        addr = %target.addr(),
        attempts = config.attempts,
        pool_size = config.pool_size,
        hold_secs = config.burst_hold,
        "running burst scenario"
    );

    let pool = Arc::new(Semaphore::new(config.pool_size.max(1)));
    let mut handles = Vec::with_capacity(config.attempts);

    for id in 0..config.attempts {
        let attempt = Attempt::new(target.clone(), payload.clone(), hold, id);
        let pool = Arc::clone(&pool);

        handles.push(tokio::spawn(async move {
            // Closed semaphore is unreachable here, treat it as a failure
            let permit = match pool.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return Outcome::Failed,
            };
            let outcome = attempt.run().await;
            drop(permit);
            outcome
        }));
    }

    // Join barrier: collect every task's outcome independently
    let mut report = BurstReport::default();
    for handle in handles {
        match handle.await {
            Ok(outcome) => report.record(outcome),
            Err(e) => {
                error!(error = %e, "attempt task panicked");
                report.record(Outcome::Failed);
            }
        }
    }

    info!(
        delivered = report.delivered,
        refused = report.refused,
        failed = report.failed,
        "burst complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn test_config(port: u16) -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port,
            mode: Mode::Burst,
            attempts: 11,
            burst_hold: 0,
            burst_payload: "hello world".to_string(),
            pool_size: 11,
            long_hold: 0,
            long_payload: "test message".to_string(),
            max_connections: 16,
            max_connection_secs: 1000,
            read_wait_secs: 5,
            buffer_kb: 1,
            connect_timeout: 5,
            write_timeout: 5,
            log_level: "info".to_string(),
        }
    }

    async fn ephemeral_listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    /// Accept `count` connections concurrently and drain each to EOF
    fn drain_all(listener: TcpListener, count: usize) -> tokio::task::JoinHandle<Vec<Vec<u8>>> {
        tokio::spawn(async move {
            let mut readers = Vec::new();
            for _ in 0..count {
                let (mut stream, _) = listener.accept().await.unwrap();
                readers.push(tokio::spawn(async move {
                    let mut received = Vec::new();
                    stream.read_to_end(&mut received).await.unwrap();
                    received
                }));
            }
            let mut payloads = Vec::new();
            for reader in readers {
                payloads.push(reader.await.unwrap());
            }
            payloads
        })
    }

    #[tokio::test]
    async fn test_burst_delivers_all_eleven() {
        let (listener, port) = ephemeral_listener().await;
        let server = drain_all(listener, 11);

        let report = run_burst(&test_config(port)).await;
        assert_eq!(report.total(), 11);
        assert_eq!(report.delivered, 11);

        let payloads = server.await.unwrap();
        assert_eq!(payloads.len(), 11);
        for payload in payloads {
            assert_eq!(payload, b"hello world");
        }
    }

    #[tokio::test]
    async fn test_burst_with_no_listener_returns() {
        let (listener, port) = ephemeral_listener().await;
        drop(listener);

        // Must terminate, not hang, with every attempt refused
        let report = tokio::time::timeout(Duration::from_secs(30), run_burst(&test_config(port)))
            .await
            .expect("burst driver hung");
        assert_eq!(report.total(), 11);
        assert_eq!(report.refused, 11);
    }

    #[tokio::test]
    async fn test_burst_respects_pool_bound() {
        let (listener, port) = ephemeral_listener().await;
        let server = drain_all(listener, 4);

        let mut config = test_config(port);
        config.attempts = 4;
        config.pool_size = 2;

        let report = run_burst(&config).await;
        assert_eq!(report.delivered, 4);
        assert_eq!(server.await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_long_connection_holds_before_sending() {
        let (listener, port) = ephemeral_listener().await;

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let accepted_at = tokio::time::Instant::now();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).await.unwrap();
            (accepted_at.elapsed(), received)
        });

        let mut config = test_config(port);
        config.long_hold = 1;

        assert!(run_long(&config).await.delivered());

        let (elapsed, received) = server.await.unwrap();
        assert!(elapsed >= Duration::from_secs(1));
        assert_eq!(received, b"test message");
    }
}
