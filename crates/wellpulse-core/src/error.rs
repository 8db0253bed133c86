//! Core error types for wellpulse-core.
//!
//! This module defines the error hierarchy using thiserror. Nothing here is
//! fatal to the engine: fetch failures degrade to partial results, persistence
//! failures degrade to in-memory operation, and validation failures drop the
//! offending item.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Core error type for wellpulse-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Content source errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// State persistence errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

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

/// Failures reported by an external content source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Transport-level failure (DNS, connect, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status other than 429
    #[error("Content source returned HTTP {status}")]
    Http { status: u16 },

    /// The source asked us to back off
    #[error("Rate limited by content source, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// Response body could not be decoded
    #[error("Failed to decode content response: {0}")]
    Decode(String),

    /// Caller abandoned the request before it was admitted
    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether this failure is a rate-limit signal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited { .. })
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Http {
                status: status.as_u16(),
            }
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// State persistence errors.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Serialized state does not fit the store's quota
    #[error("State of {size} bytes exceeds storage quota of {limit} bytes")]
    QuotaExceeded { size: usize, limit: usize },

    /// Failed to read or write the backing file
    #[error("Failed to access state at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to encode or decode the state document
    #[error("State serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Document was written by a newer schema
    #[error("Unsupported state schema version {found} (supported up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Document shape is not recognisable
    #[error("Corrupt state document: {0}")]
    Corrupt(String),
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

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors for externally supplied data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required field missing or blank
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    /// Category key not in the known set
    #[error("Unknown category '{0}'")]
    UnknownCategory(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
