//! IPv6 prefix tracking for selected interfaces.
//!
//! Delegated prefixes change without the interface itself changing state.
//! A [`PrefixWatch`] derives the network prefix of an interface's first
//! global IPv6 address each cycle and flags when it moves.

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;

use thiserror::Error;

use crate::network::Snapshot;

/// A watched `(interface, prefix length)` pair, written `eth0/64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrefixWatch {
    /// Interface name.
    pub interface: String,
    /// Prefix length in bits, 1..=128.
    pub prefix_len: u8,
}

/// Error returned when a prefix watch cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid prefix watch '{value}': expected INTERFACE/LENGTH with LENGTH in 1..=128")]
pub struct PrefixWatchParseError {
    /// The rejected input.
    pub value: String,
}

impl PrefixWatch {
    /// Creates a watch, validating the prefix length.
    ///
    /// # Errors
    ///
    /// Returns an error if the interface is empty or `prefix_len` is outside 1..=128.
    pub fn new(interface: impl Into<String>, prefix_len: u8) -> Result<Self, PrefixWatchParseError> {
        let interface = interface.into();
        if interface.is_empty() || !(1..=128).contains(&prefix_len) {
            return Err(PrefixWatchParseError {
                value: format!("{interface}/{prefix_len}"),
            });
        }
        Ok(Self {
            interface,
            prefix_len,
        })
    }

    /// Returns the current prefix for this watch, if the interface has a
    /// global IPv6 address.
    #[must_use]
    pub fn current(&self, snapshot: &Snapshot) -> Option<Ipv6Addr> {
        let iface = snapshot.get(&self.interface)?;
        iface
            .addresses
            .iter()
            .find_map(|a| match a.address {
                IpAddr::V6(v6) if is_global_candidate(&v6) => Some(v6),
                _ => None,
            })
            .map(|v6| mask(v6, self.prefix_len))
    }
}

impl FromStr for PrefixWatch {
    type Err = PrefixWatchParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PrefixWatchParseError {
            value: s.to_string(),
        };
        // Interface names may not contain '/', so split from the right.
        let (interface, len) = s.trim().rsplit_once('/').ok_or_else(invalid)?;
        let len: u8 = len.parse().map_err(|_| invalid())?;
        Self::new(interface, len).map_err(|_| invalid())
    }
}

impl fmt::Display for PrefixWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.interface, self.prefix_len)
    }
}

/// The result of evaluating one watch for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixObservation {
    /// The watch evaluated.
    pub watch: PrefixWatch,
    /// Prefix in the current snapshot, if any.
    pub current: Option<Ipv6Addr>,
    /// Whether the prefix differs from the previous snapshot.
    pub changed: bool,
}

/// Evaluates every watch against the previous and current snapshots.
///
/// With no previous snapshot nothing counts as changed.
#[must_use]
pub fn observe(
    watches: &[PrefixWatch],
    previous: Option<&Snapshot>,
    current: &Snapshot,
) -> Vec<PrefixObservation> {
    watches
        .iter()
        .map(|watch| {
            let now = watch.current(current);
            let changed = previous.is_some_and(|p| watch.current(p) != now);
            PrefixObservation {
                watch: watch.clone(),
                current: now,
                changed,
            }
        })
        .collect()
}

/// Excludes link-local, loopback, multicast and unspecified addresses.
const fn is_global_candidate(address: &Ipv6Addr) -> bool {
    !(address.is_unicast_link_local()
        || address.is_loopback()
        || address.is_multicast()
        || address.is_unspecified())
}

/// Zeroes all bits beyond `prefix_len`.
fn mask(address: Ipv6Addr, prefix_len: u8) -> Ipv6Addr {
    let bits = u128::from(address);
    let masked = match prefix_len {
        0 => 0,
        len if len >= 128 => bits,
        len => bits & (u128::MAX << (128 - u32::from(len))),
    };
    Ipv6Addr::from(masked)
}
