//! Prometheus metrics derived from interface change events.
//!
//! ## Exported series
//!
//! - **Per-interface gauges**: `netif_interface_oper_state`,
//!   `netif_interface_mtu_bytes`, `netif_interface_address_info`
//! - **Change counters**: `netif_interface_added_total`,
//!   `netif_interface_removed_total`, `netif_address_added_total`,
//!   `netif_address_removed_total`, `netif_state_changes_total`,
//!   `netif_mtu_changes_total`
//! - **Poll health**: `netif_polls_total`, `netif_poll_consecutive_failures`,
//!   `netif_last_successful_poll_timestamp_seconds`
//! - **Prefix watches**: `netif_ipv6_prefix_changed`, `netif_ipv6_prefix_info`

mod error;
mod registry;

pub use error::{MetricsError, RenderError};
pub use registry::MetricsRegistry;
