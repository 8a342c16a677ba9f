//! Error types for the monitor layer.

use std::time::Duration;

use crate::network::ReadError;
use thiserror::Error;

/// Error type for a failed poll cycle.
///
/// Every variant is transient: the cycle is abandoned, the previous snapshot
/// is kept, and the next tick retries.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The reader returned an error.
    #[error("Failed to read interfaces: {0}")]
    Read(#[from] ReadError),

    /// The reader did not finish within the read timeout.
    #[error("Interface read timed out after {timeout:?}")]
    Timeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// An earlier timed-out read is still running, so no new one was started.
    #[error("Previous interface read is still running")]
    CaptureInFlight,

    /// The blocking reader task panicked or was cancelled.
    #[error("Reader task failed: {0}")]
    ReaderTask(String),
}
