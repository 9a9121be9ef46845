//! Configuration error types.

use thiserror::Error;

/// Errors that occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying loader error (missing variables, type mismatches).
    #[error("Configuration loading failed: {0}")]
    Load(#[from] config::ConfigError),
}

/// Errors that occur while validating loaded configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid Redis URL: must start with redis:// or rediss://")]
    InvalidRedisUrl,

    #[error("Invalid database URL: must start with postgres:// or postgresql://")]
    InvalidDatabaseUrl,

    #[error("Invalid port: must be non-zero")]
    InvalidPort,

    #[error("Heartbeat deadline ({deadline_secs}s) must exceed the probe interval ({interval_secs}s)")]
    HeartbeatDeadlineTooShort {
        interval_secs: u64,
        deadline_secs: u64,
    },
}
