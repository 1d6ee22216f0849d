//! Error types for the echo server.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can stop the acceptor.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The listening socket could not be created, bound or put into listen mode.
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// The configured listen address does not parse.
    #[error("invalid listen address '{0}'")]
    InvalidAddress(String),
    /// The admission gate was closed while the acceptor waited on it.
    #[error("admission gate closed")]
    GateClosed,
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] io::Error),
    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
}
