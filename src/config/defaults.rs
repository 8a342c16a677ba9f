//! Default values for configuration options.
//!
//! Centralized constants to avoid magic numbers scattered across the codebase.

use std::time::Duration;

/// Default polling interval in seconds.
pub const POLL_INTERVAL_SECS: u64 = 15;

/// Default listen address of the metrics endpoint.
///
/// 9101 sits next to `node_exporter`'s 9100.
pub const LISTEN: &str = "0.0.0.0:9101";

/// Default path of the Prometheus scrape route.
pub const METRICS_PATH: &str = "/metrics";

/// Default output path of `init`.
pub const CONFIG_FILE: &str = "netif-exporter.toml";

/// Default polling interval as Duration.
#[must_use]
pub const fn poll_interval() -> Duration {
    Duration::from_secs(POLL_INTERVAL_SECS)
}
