//! Core network types for interface representation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// IP version of an interface address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IpVersion {
    /// IPv4 address.
    V4,
    /// IPv6 address.
    V6,
}

impl IpVersion {
    /// Returns the version of the given address.
    #[must_use]
    pub const fn of(address: &IpAddr) -> Self {
        match address {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }

    /// Returns the label value used in exported metrics ("4" or "6").
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::V4 => "4",
            Self::V6 => "6",
        }
    }

    /// Returns the maximum prefix length for this version.
    #[must_use]
    pub const fn max_prefix_len(self) -> u8 {
        match self {
            Self::V4 => 32,
            Self::V6 => 128,
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => write!(f, "IPv4"),
            Self::V6 => write!(f, "IPv6"),
        }
    }
}

/// Operational state of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperState {
    /// Interface is operationally up.
    Up,
    /// Interface is down (administratively or at a lower layer).
    Down,
    /// The platform does not report a definite state.
    Unknown,
}

impl OperState {
    /// Parses a Linux `operstate` value (RFC 2863 naming).
    ///
    /// `dormant`, `lowerlayerdown` and `notpresent` count as down;
    /// `testing` and anything unrecognized map to [`OperState::Unknown`].
    #[must_use]
    pub fn from_operstate(value: &str) -> Self {
        match value.trim() {
            "up" => Self::Up,
            "down" | "lowerlayerdown" | "notpresent" | "dormant" => Self::Down,
            _ => Self::Unknown,
        }
    }

    /// Value exported by the state gauge: 1 = up, 0 = down, -1 = unknown.
    #[must_use]
    pub const fn gauge_value(self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => 0,
            Self::Unknown => -1,
        }
    }

    /// Returns true if the interface is up.
    #[must_use]
    pub const fn is_up(self) -> bool {
        matches!(self, Self::Up)
    }
}

impl fmt::Display for OperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// An address assigned to an interface, with its prefix length.
///
/// Identity is the `(address, prefix_len)` pair: the same address with a
/// different prefix is a different entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterfaceAddress {
    /// The IP address.
    pub address: IpAddr,
    /// Network prefix length (CIDR notation).
    pub prefix_len: u8,
}

impl InterfaceAddress {
    /// Creates a new interface address.
    #[must_use]
    pub const fn new(address: IpAddr, prefix_len: u8) -> Self {
        Self {
            address,
            prefix_len,
        }
    }

    /// Returns the IP version of this address.
    #[must_use]
    pub const fn version(&self) -> IpVersion {
        IpVersion::of(&self.address)
    }
}

impl fmt::Display for InterfaceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

/// Error returned when parsing an [`InterfaceAddress`] from `addr/len` notation.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid interface address '{value}': expected ADDRESS/PREFIX")]
pub struct AddressParseError {
    /// The rejected input.
    pub value: String,
}

impl FromStr for InterfaceAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AddressParseError {
            value: s.to_string(),
        };

        let (address, prefix) = s.split_once('/').ok_or_else(invalid)?;
        let address: IpAddr = address.trim().parse().map_err(|_| invalid())?;
        let prefix_len: u8 = prefix.trim().parse().map_err(|_| invalid())?;

        if prefix_len > IpVersion::of(&address).max_prefix_len() {
            return Err(invalid());
        }

        Ok(Self::new(address, prefix_len))
    }
}

/// A single network interface as observed at capture time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    /// Interface name (e.g., "eth0", "Ethernet").
    pub name: String,
    /// Operational state.
    pub state: OperState,
    /// Maximum transmission unit in bytes.
    pub mtu: u32,
    /// Whether this is a loopback interface.
    #[serde(default)]
    pub loopback: bool,
    /// Assigned addresses, ordered by `(address, prefix_len)`.
    #[serde(default)]
    pub addresses: BTreeSet<InterfaceAddress>,
}

impl Interface {
    /// Creates an interface with no addresses.
    #[must_use]
    pub fn new(name: impl Into<String>, state: OperState, mtu: u32) -> Self {
        Self {
            name: name.into(),
            state,
            mtu,
            loopback: false,
            addresses: BTreeSet::new(),
        }
    }

    /// Adds an address (builder style).
    #[must_use]
    pub fn with_address(mut self, address: InterfaceAddress) -> Self {
        self.addresses.insert(address);
        self
    }

    /// Marks this interface as loopback (builder style).
    #[must_use]
    pub fn with_loopback(mut self, loopback: bool) -> Self {
        self.loopback = loopback;
        self
    }

    /// Returns true if the interface has any addresses.
    #[must_use]
    pub fn has_addresses(&self) -> bool {
        !self.addresses.is_empty()
    }

    /// Iterates over addresses of the given IP version.
    pub fn addresses_of(&self, version: IpVersion) -> impl Iterator<Item = &InterfaceAddress> {
        self.addresses
            .iter()
            .filter(move |a| a.version() == version)
    }
}

/// An immutable point-in-time view of all interfaces on the host.
///
/// Interfaces are keyed and iterated by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    captured_at: SystemTime,
    interfaces: BTreeMap<String, Interface>,
}

impl Snapshot {
    /// Creates a snapshot from a set of interfaces.
    ///
    /// If two interfaces share a name, the later one wins.
    #[must_use]
    pub fn new(captured_at: SystemTime, interfaces: impl IntoIterator<Item = Interface>) -> Self {
        Self {
            captured_at,
            interfaces: interfaces
                .into_iter()
                .map(|iface| (iface.name.clone(), iface))
                .collect(),
        }
    }

    /// Creates a snapshot with no interfaces.
    #[must_use]
    pub const fn empty(captured_at: SystemTime) -> Self {
        Self {
            captured_at,
            interfaces: BTreeMap::new(),
        }
    }

    /// Returns the capture timestamp.
    #[must_use]
    pub const fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    /// Looks up an interface by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Interface> {
        self.interfaces.get(name)
    }

    /// Returns true if an interface with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
    }

    /// Iterates over interfaces in name order.
    pub fn interfaces(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces.values()
    }

    /// Returns the number of interfaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    /// Returns true if the snapshot holds no interfaces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    /// Returns a new snapshot keeping only interfaces matching the predicate.
    #[must_use]
    pub fn retain(self, mut keep: impl FnMut(&Interface) -> bool) -> Self {
        Self {
            captured_at: self.captured_at,
            interfaces: self
                .interfaces
                .into_iter()
                .filter(|(_, iface)| keep(iface))
                .collect(),
        }
    }
}
