//! Error types for configuration parsing and validation.

use std::path::PathBuf;

use thiserror::Error;

use crate::monitor::PrefixWatchParseError;

/// Error type for configuration operations.
///
/// Covers errors from parsing, validation, and file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file '{}': {source}", path.display())]
    FileRead {
        /// Path to the config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("Failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to write configuration file (for init command).
    #[error("Failed to write config file '{}': {source}", path.display())]
    FileWrite {
        /// Path to the config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Invalid regex pattern for interface filtering.
    #[error("Invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        /// The invalid pattern
        pattern: String,
        /// Underlying regex error
        #[source]
        source: regex::Error,
    },

    /// Invalid duration value (zero or out of range).
    #[error("Invalid duration for {field}: {reason}")]
    InvalidDuration {
        /// Name of the field
        field: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Listen address is not a socket address.
    #[error("Invalid listen address '{value}': {reason}")]
    InvalidAddress {
        /// The rejected value
        value: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Metrics path is malformed or collides with another route.
    #[error("Invalid metrics path '{value}': {reason}")]
    InvalidPath {
        /// The rejected value
        value: String,
        /// Reason for invalidity
        reason: &'static str,
    },

    /// Malformed IPv6 prefix watch.
    #[error(transparent)]
    InvalidPrefixWatch(#[from] PrefixWatchParseError),
}

/// Well-known field names for `InvalidDuration` errors.
pub mod field {
    /// The poll interval field.
    pub const POLL_INTERVAL: &str = "poll_interval";
    /// The read timeout field.
    pub const READ_TIMEOUT: &str = "read_timeout";
}

impl ConfigError {
    /// Creates an `InvalidDuration` error.
    #[must_use]
    pub fn duration(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidDuration {
            field,
            reason: reason.into(),
        }
    }
}
