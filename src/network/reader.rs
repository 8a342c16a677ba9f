//! Snapshot reading trait and error types.

use std::io;

use super::Snapshot;
use thiserror::Error;

/// Error type for snapshot capture.
///
/// Describes what went wrong without dictating recovery strategy.
/// The poller treats every variant as transient and retries next cycle.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Windows API call failed.
    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    WindowsApi(#[from] windows::core::Error),

    /// The interface inventory could not be enumerated.
    #[error("Failed to enumerate interfaces: {0}")]
    Enumerate(#[source] io::Error),

    /// A per-interface attribute could not be read or parsed.
    #[error("Failed to read {attribute} of interface '{interface}': {source}")]
    Attribute {
        /// Interface whose attribute failed.
        interface: String,
        /// Attribute name (e.g., "mtu", "operstate").
        attribute: &'static str,
        /// Underlying I/O or parse error.
        #[source]
        source: io::Error,
    },

    /// Permission denied to access network information.
    #[error("Permission denied: {context}")]
    PermissionDenied {
        /// Additional context about what permission was denied.
        context: String,
    },

    /// Platform-specific error with a generic message.
    #[error("Platform error: {message}")]
    Platform {
        /// Error message describing the platform-specific failure.
        message: String,
    },
}

impl ReadError {
    /// Maps an enumeration I/O error, singling out permission failures.
    #[must_use]
    pub fn from_enumerate(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::PermissionDenied {
            Self::PermissionDenied {
                context: error.to_string(),
            }
        } else {
            Self::Enumerate(error)
        }
    }
}

/// Source of interface snapshots.
///
/// # Contract
///
/// `capture` returns either a complete, internally consistent [`Snapshot`]
/// or an error, never a partially populated snapshot. It has no side effects.
///
/// Implementations are synchronous; the poller runs them on the blocking
/// thread pool under a timeout.
pub trait SnapshotReader: Send + Sync {
    /// Captures the current state of all network interfaces.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError`] when the OS inventory cannot be enumerated
    /// (syscall failure, permission denied, unreadable attributes).
    fn capture(&self) -> Result<Snapshot, ReadError>;
}
