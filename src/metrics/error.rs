//! Error types for metrics collection and serving.

use std::io;

use thiserror::Error;

/// Errors raised while setting up or serving metrics.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The listen address could not be bound.
    #[error("Failed to bind metrics server to {address}: {source}")]
    BindAddress {
        /// The address that failed to bind.
        address: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The HTTP server stopped with an error.
    #[error("Metrics server error: {0}")]
    Serve(#[source] io::Error),

    /// A collector could not be created or registered.
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

impl MetricsError {
    /// Creates a bind address error.
    pub fn bind_address(address: impl Into<String>, source: io::Error) -> Self {
        Self::BindAddress {
            address: address.into(),
            source,
        }
    }
}

/// Errors raised while rendering the exposition text.
///
/// Both variants indicate a bug rather than a transient condition.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A writer panicked while holding the registry lock.
    #[error("Metrics registry lock poisoned")]
    Poisoned,

    /// Text encoding failed.
    #[error("Failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),
}
