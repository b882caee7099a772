//! Configuration module for the connection exerciser.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the exerciser
#[derive(Parser, Debug)]
#[command(name = "poke-a-port")]
#[command(author = "poke-a-port authors")]
#[command(version = "0.1.0")]
#[command(about = "A concurrent TCP connection exerciser", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Target host to connect to (e.g., localhost)
    #[arg(long)]
    pub host: Option<String>,

    /// Target port to connect to (1-65535)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// What to run: a connection burst, a single long connection, or a sink listener
    #[arg(short, long, value_enum)]
    pub mode: Option<Mode>,

    /// Number of concurrent attempts in burst mode
    #[arg(short = 'n', long)]
    pub attempts: Option<usize>,

    /// Seconds to hold each connection open before sending the payload
    #[arg(long)]
    pub hold: Option<u64>,

    /// Payload sent on each connection
    #[arg(long)]
    pub payload: Option<String>,

    /// Worker pool size for burst mode (defaults to the attempt count)
    #[arg(short = 'w', long)]
    pub pool_size: Option<usize>,

    /// Connect timeout in seconds
    #[arg(long)]
    pub connect_timeout: Option<u64>,

    /// Write timeout in seconds
    #[arg(long)]
    pub write_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Execution mode selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// A burst of concurrent short-lived connections
    Burst,
    /// One long-lived connection with a slow-client hold
    Long,
    /// Accept and drain connections so the exerciser has a local target
    Sink,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub burst: BurstConfig,
    #[serde(default)]
    pub long: LongConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Target endpoint configuration
#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    /// Host to connect to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to connect to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Write timeout in seconds
    #[serde(default = "default_write_timeout")]
    pub write_timeout: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout: default_connect_timeout(),
            write_timeout: default_write_timeout(),
        }
    }
}

/// Burst scenario configuration
#[derive(Debug, Deserialize)]
pub struct BurstConfig {
    /// Number of concurrent connection attempts
    #[serde(default = "default_attempts")]
    pub attempts: usize,
    /// Seconds each connection is held open before the payload is sent
    #[serde(default = "default_burst_hold")]
    pub hold: u64,
    /// Payload sent on each connection
    #[serde(default = "default_burst_payload")]
    pub payload: String,
    /// Worker pool size (defaults to the attempt count)
    pub pool_size: Option<usize>,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            hold: default_burst_hold(),
            payload: default_burst_payload(),
            pool_size: None,
        }
    }
}

/// Long-connection scenario configuration
#[derive(Debug, Deserialize)]
pub struct LongConfig {
    /// Seconds the connection is held open before the payload is sent
    #[serde(default = "default_long_hold")]
    pub hold: u64,
    /// Payload sent once the hold elapses
    #[serde(default = "default_long_payload")]
    pub payload: String,
}

impl Default for LongConfig {
    fn default() -> Self {
        Self {
            hold: default_long_hold(),
            payload: default_long_payload(),
        }
    }
}

/// Sink listener configuration
#[derive(Debug, Deserialize)]
pub struct SinkConfig {
    /// Maximum number of simultaneous connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Overall per-connection deadline in seconds
    #[serde(default = "default_max_connection_secs")]
    pub max_connection_secs: u64,
    /// Idle read timeout in seconds
    #[serde(default = "default_read_wait_secs")]
    pub read_wait_secs: u64,
    /// Read buffer size in KiB
    #[serde(default = "default_buffer_kb")]
    pub buffer_kb: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            max_connection_secs: default_max_connection_secs(),
            read_wait_secs: default_read_wait_secs(),
            buffer_kb: default_buffer_kb(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_write_timeout() -> u64 {
    5
}

fn default_attempts() -> usize {
    11
}

fn default_burst_hold() -> u64 {
    4
}

fn default_burst_payload() -> String {
    "hello world".to_string()
}

fn default_long_hold() -> u64 {
    10
}

fn default_long_payload() -> String {
    "test message".to_string()
}

fn default_max_connections() -> usize {
    16
}

fn default_max_connection_secs() -> u64 {
    1000
}

fn default_read_wait_secs() -> u64 {
    5
}

fn default_buffer_kb() -> usize {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub mode: Mode,
    pub attempts: usize,
    pub burst_hold: u64,
    pub burst_payload: String,
    pub pool_size: usize,
    pub long_hold: u64,
    pub long_payload: String,
    pub max_connections: usize,
    pub max_connection_secs: u64,
    pub read_wait_secs: u64,
    pub buffer_kb: usize,
    pub connect_timeout: u64,
    pub write_timeout: u64,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();
        Self::resolve(cli)
    }

    /// Merge parsed CLI args with the TOML config they point at.
    fn resolve(cli: CliArgs) -> Result<Self, ConfigError> {
        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let host = cli.host.unwrap_or(toml_config.target.host);
        if host.is_empty() {
            return Err(ConfigError::EmptyHost);
        }

        let port = cli.port.unwrap_or(toml_config.target.port);
        if port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        let attempts = cli.attempts.unwrap_or(toml_config.burst.attempts);
        if attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }

        // --hold and --payload apply to whichever scenario runs
        Ok(Config {
            host,
            port,
            mode: cli.mode.unwrap_or(Mode::Burst),
            attempts,
            burst_hold: cli.hold.unwrap_or(toml_config.burst.hold),
            burst_payload: cli
                .payload
                .clone()
                .unwrap_or(toml_config.burst.payload),
            pool_size: cli
                .pool_size
                .or(toml_config.burst.pool_size)
                .unwrap_or(attempts),
            long_hold: cli.hold.unwrap_or(toml_config.long.hold),
            long_payload: cli.payload.unwrap_or(toml_config.long.payload),
            max_connections: toml_config.sink.max_connections,
            max_connection_secs: toml_config.sink.max_connection_secs,
            read_wait_secs: toml_config.sink.read_wait_secs,
            buffer_kb: toml_config.sink.buffer_kb,
            connect_timeout: cli
                .connect_timeout
                .unwrap_or(toml_config.target.connect_timeout),
            write_timeout: cli
                .write_timeout
                .unwrap_or(toml_config.target.write_timeout),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    EmptyHost,
    InvalidPort,
    NoAttempts,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::EmptyHost => write!(f, "Target host must not be empty"),
            ConfigError::InvalidPort => write!(f, "Target port must be in 1-65535"),
            ConfigError::NoAttempts => write!(f, "Burst attempt count must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with(args: &[&str]) -> CliArgs {
        let mut full = vec!["poke-a-port"];
        full.extend_from_slice(args);
        CliArgs::parse_from(full)
    }

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.target.host, "localhost");
        assert_eq!(config.target.port, 8080);
        assert_eq!(config.burst.attempts, 11);
        assert_eq!(config.burst.hold, 4);
        assert_eq!(config.burst.payload, "hello world");
        assert_eq!(config.long.hold, 10);
        assert_eq!(config.long.payload, "test message");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [target]
            host = "10.0.0.5"
            port = 9090
            connect_timeout = 2

            [burst]
            attempts = 4
            hold = 1
            payload = "ping"
            pool_size = 2

            [sink]
            max_connections = 3
            read_wait_secs = 1

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.target.host, "10.0.0.5");
        assert_eq!(config.target.port, 9090);
        assert_eq!(config.target.connect_timeout, 2);
        assert_eq!(config.burst.attempts, 4);
        assert_eq!(config.burst.pool_size, Some(2));
        assert_eq!(config.sink.max_connections, 3);
        assert_eq!(config.sink.read_wait_secs, 1);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_defaults() {
        let cli = cli_with(&["--host", "example.com", "-p", "9999", "-n", "3"]);
        let config = Config::resolve(cli).unwrap();
        assert_eq!(config.host, "example.com");
        assert_eq!(config.port, 9999);
        assert_eq!(config.attempts, 3);
        // pool size follows the attempt count when unset
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.mode, Mode::Burst);
    }

    #[test]
    fn test_rejects_bad_values() {
        let cli = cli_with(&["--host", ""]);
        assert!(matches!(Config::resolve(cli), Err(ConfigError::EmptyHost)));

        let cli = cli_with(&["-p", "0"]);
        assert!(matches!(Config::resolve(cli), Err(ConfigError::InvalidPort)));

        let cli = cli_with(&["-n", "0"]);
        assert!(matches!(Config::resolve(cli), Err(ConfigError::NoAttempts)));
    }
}
