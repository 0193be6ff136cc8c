//! Error types for the resource cache
//!
//! Provides unified error handling using thiserror.
//!
//! The cache store itself never returns these for a missing or expired key;
//! those are modeled as `None`/`false`. Errors surface from the fetch wrapper,
//! from explicit persistence flushes and from pattern compilation.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the resource cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Reading or writing the durable storage slot failed, or its content is unusable
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A preload or refresh loader failed
    #[error("Loader failed for key '{key}': {message}")]
    Loader { key: String, message: String },

    /// Network retrieval failed or returned a non-success status
    #[error("Network error{}: {message}", status_suffix(.status))]
    Network {
        status: Option<u16>,
        message: String,
    },

    /// Response body could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalidation pattern failed to compile
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Filesystem error from a storage backend
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CacheError {
    /// Builds a network error carrying an HTTP status.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        CacheError::Network {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Builds a network error for a transport failure (no status received).
    pub fn transport(message: impl Into<String>) -> Self {
        CacheError::Network {
            status: None,
            message: message.into(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {})", code),
        None => String::new(),
    }
}

// == Result Type Alias ==
/// Convenience Result type for the resource cache.
pub type Result<T> = std::result::Result<T, CacheError>;
