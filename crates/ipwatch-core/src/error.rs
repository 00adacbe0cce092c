//! Error types for the IP watcher
//!
//! This module defines all error types used throughout the crate.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for watcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the IP watcher
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// IP lookup capability failed (transient upstream failure)
    #[error("IP lookup error: {0}")]
    Lookup(String),

    /// Every resolution attempt was rejected
    #[error("no acceptable external IP after {attempts} attempt(s)")]
    ExhaustedAttempts {
        /// Number of lookups performed
        attempts: u32,
    },

    /// Mail submission failed for one message
    #[error("mail error: {0}")]
    Mail(String),

    /// Saving the new IP failed
    #[error("failed to write saved IP to {}: {source}", path.display())]
    Write {
        /// Save file path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Configuration load failures
///
/// Each variant maps to its own process exit status.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Path does not reference a readable file
    #[error("config file not found: {}", path.display())]
    NotFound {
        /// Path that was tried
        path: PathBuf,
    },

    /// A line carried a key the watcher does not know
    #[error("unexpected line {line_no} in config file: {line}")]
    UnrecognizedKey {
        /// 1-based line number
        line_no: usize,
        /// The offending line, trailing whitespace stripped
        line: String,
    },

    /// A recognized key had an unusable value, or a required key was missing
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Error {
    /// Create an IP lookup error
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    /// Create a mail error
    pub fn mail(msg: impl Into<String>) -> Self {
        Self::Mail(msg.into())
    }

    /// Create an invalid-configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::Config(ConfigError::Invalid(msg.into()))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
