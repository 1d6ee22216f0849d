//! Configuration module for the line-echo server.
//!
//! The listen address and the connection ceiling are fixed constants. Only
//! ambient knobs (log level, worker threads, drain timeout) can be set, from
//! the command line or a TOML file. CLI arguments take precedence over config
//! file values.

use crate::error::ConfigError;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Address the server listens on.
pub const LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Maximum number of concurrently running connection handlers.
pub const MAX_CONNECTIONS: usize = 10_000;

/// Command-line arguments for the echo server
#[derive(Parser, Debug)]
#[command(name = "line-echo")]
#[command(version)]
#[command(about = "A concurrent TCP line-echo server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of runtime worker threads (defaults to number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Seconds to wait for in-flight connections on shutdown (unbounded if unset)
    #[arg(long)]
    pub drain_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize, Default)]
pub struct ServerConfig {
    /// Number of worker threads
    pub workers: Option<usize>,
}

/// Shutdown-related configuration
#[derive(Debug, Deserialize, Default)]
pub struct ShutdownConfig {
    /// Upper bound on the drain, in seconds
    pub drain_timeout: Option<u64>,
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

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub max_connections: usize,
    pub workers: Option<usize>,
    pub drain_timeout: Option<Duration>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: LISTEN_ADDR.to_string(),
            max_connections: MAX_CONNECTIONS,
            workers: None,
            drain_timeout: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::merge(cli, toml_config))
    }

    /// Merge CLI args with TOML config (CLI takes precedence).
    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        Config {
            workers: cli.workers.or(toml_config.server.workers),
            drain_timeout: cli
                .drain_timeout
                .or(toml_config.shutdown.drain_timeout)
                .map(Duration::from_secs),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
            ..Config::default()
        }
    }
}
