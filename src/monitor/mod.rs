//! Monitor layer: change detection and the poll loop.
//!
//! This module provides:
//! - Change events and snapshot diffing ([`ChangeEvent`], [`diff`])
//! - IPv6 prefix watches ([`PrefixWatch`], [`observe`])
//! - The fixed-interval poll loop ([`Poller`])
//! - Error handling ([`MonitorError`])

mod change;
mod error;
mod poller;
mod prefix;

pub use change::{ChangeEvent, ChangeKind, diff};
pub use error::MonitorError;
pub use poller::{CycleReport, Phase, Poller, default_read_timeout};
pub use prefix::{PrefixObservation, PrefixWatch, PrefixWatchParseError, observe};
