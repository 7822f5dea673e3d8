//! Core error types for hiit-core.
//!
//! The interval timer itself never fails; these errors cover the layers
//! around it (configuration files, settings validation, runtime setup).

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for hiit-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No async runtime available to drive a real timer
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// No usable data directory
    #[error("Cannot determine data directory: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Value must be strictly positive
    #[error("'{field}' must be greater than zero")]
    NotPositive { field: String },

    /// Value exceeds an upper limit
    #[error("'{field}' must be at most {max} (got {value})")]
    TooLarge { field: String, value: u64, max: u64 },

    /// Operation not allowed while a workout is in progress
    #[error("Cannot {action} while the timer is {state}")]
    Busy { action: String, state: String },
}

impl From<tokio::runtime::TryCurrentError> for CoreError {
    fn from(err: tokio::runtime::TryCurrentError) -> Self {
        CoreError::Runtime(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
