//! Network layer: interface snapshots and how they are read from the OS.
//!
//! This module provides:
//! - The interface data model ([`Interface`], [`InterfaceAddress`], [`Snapshot`])
//! - The reader abstraction ([`SnapshotReader`], [`ReadError`])
//! - Name/loopback filtering ([`filter`])
//! - Platform-specific readers ([`platform`])

pub mod filter;
mod interface;
pub mod platform;
mod reader;

pub use interface::{AddressParseError, Interface, InterfaceAddress, IpVersion, OperState, Snapshot};
pub use reader::{ReadError, SnapshotReader};

#[cfg(test)]
pub(crate) use reader::mock;
