//! poke-a-port: a concurrent TCP connection exerciser
//!
//! Opens TCP connections to a configured endpoint, optionally holds them
//! open to simulate a slow client, sends a short payload, and closes.
//!
//! Modes:
//! - burst (default): a burst of concurrent short-lived connections
//! - long: a single long-lived connection
//! - sink: a local listener that accepts and drains connections
//!
//! Configuration via CLI arguments or TOML file.

mod config;
mod exerciser;
mod scenario;
mod sink;

use config::{Config, Mode};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        mode = ?config.mode,
        "Starting poke-a-port"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    // Individual attempt failures never affect the exit code
    match config.mode {
        Mode::Burst => {
            runtime.block_on(scenario::run_burst(&config));
            Ok(())
        }
        Mode::Long => {
            let outcome = runtime.block_on(scenario::run_long(&config));
            info!(?outcome, "long-connection scenario finished");
            Ok(())
        }
        Mode::Sink => {
            let sink = sink::Sink::new(&config);
            runtime.block_on(sink.run())?;
            Ok(())
        }
    }
}
