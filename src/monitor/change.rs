//! Change detection between interface snapshots.

use std::fmt;

use crate::network::{Interface, InterfaceAddress, OperState, Snapshot};

/// The kind of a [`ChangeEvent`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// An interface appeared.
    InterfaceAdded,
    /// An interface disappeared.
    InterfaceRemoved,
    /// An address was assigned to an existing interface.
    AddressAdded,
    /// An address was removed from an existing interface.
    AddressRemoved,
    /// Operational state changed.
    StateChanged,
    /// MTU changed.
    MtuChanged,
}

impl ChangeKind {
    /// Returns a stable `snake_case` name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InterfaceAdded => "interface_added",
            Self::InterfaceRemoved => "interface_removed",
            Self::AddressAdded => "address_added",
            Self::AddressRemoved => "address_removed",
            Self::StateChanged => "state_changed",
            Self::MtuChanged => "mtu_changed",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single difference between two snapshots.
///
/// Events are ephemeral: produced by [`diff`], consumed by the metrics
/// registry, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// An interface present now but not before. Carries the full interface;
    /// no per-address events accompany it.
    InterfaceAdded(Interface),
    /// An interface present before but not now.
    InterfaceRemoved(Interface),
    /// An address appeared on an interface present in both snapshots.
    AddressAdded {
        /// Interface name.
        interface: String,
        /// The new address.
        address: InterfaceAddress,
    },
    /// An address disappeared from an interface present in both snapshots.
    AddressRemoved {
        /// Interface name.
        interface: String,
        /// The removed address.
        address: InterfaceAddress,
    },
    /// Operational state differs.
    StateChanged {
        /// Interface name.
        interface: String,
        /// Previous state.
        old: OperState,
        /// Current state.
        new: OperState,
    },
    /// MTU differs.
    MtuChanged {
        /// Interface name.
        interface: String,
        /// Previous MTU.
        old: u32,
        /// Current MTU.
        new: u32,
    },
}

impl ChangeEvent {
    /// Returns the name of the interface this event concerns.
    #[must_use]
    pub fn interface(&self) -> &str {
        match self {
            Self::InterfaceAdded(iface) | Self::InterfaceRemoved(iface) => &iface.name,
            Self::AddressAdded { interface, .. }
            | Self::AddressRemoved { interface, .. }
            | Self::StateChanged { interface, .. }
            | Self::MtuChanged { interface, .. } => interface,
        }
    }

    /// Returns the event kind.
    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::InterfaceAdded(_) => ChangeKind::InterfaceAdded,
            Self::InterfaceRemoved(_) => ChangeKind::InterfaceRemoved,
            Self::AddressAdded { .. } => ChangeKind::AddressAdded,
            Self::AddressRemoved { .. } => ChangeKind::AddressRemoved,
            Self::StateChanged { .. } => ChangeKind::StateChanged,
            Self::MtuChanged { .. } => ChangeKind::MtuChanged,
        }
    }

    /// Returns the address for address events.
    #[must_use]
    pub const fn address(&self) -> Option<&InterfaceAddress> {
        match self {
            Self::AddressAdded { address, .. } | Self::AddressRemoved { address, .. } => {
                Some(address)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InterfaceAdded(iface) => write!(
                f,
                "interface {} added ({}, mtu {}, {} addresses)",
                iface.name,
                iface.state,
                iface.mtu,
                iface.addresses.len()
            ),
            Self::InterfaceRemoved(iface) => write!(f, "interface {} removed", iface.name),
            Self::AddressAdded { interface, address } => {
                write!(f, "address {address} added on {interface}")
            }
            Self::AddressRemoved { interface, address } => {
                write!(f, "address {address} removed from {interface}")
            }
            Self::StateChanged {
                interface,
                old,
                new,
            } => write!(f, "{interface} state {old} -> {new}"),
            Self::MtuChanged {
                interface,
                old,
                new,
            } => write!(f, "{interface} mtu {old} -> {new}"),
        }
    }
}

/// Compares two snapshots and returns the ordered list of changes.
///
/// This is a pure function. With no previous snapshot, every interface in
/// `current` yields one [`ChangeEvent::InterfaceAdded`] and nothing else.
///
/// # Ordering
///
/// 1. Removed interfaces, by name
/// 2. Added interfaces, by name
/// 3. For each interface present in both, by name: `StateChanged`,
///    `MtuChanged`, `AddressRemoved` (address order), `AddressAdded`
///    (address order)
///
/// Address identity is `(address, prefix_len)`, so a prefix change shows up
/// as one removal plus one addition.
#[must_use]
pub fn diff(previous: Option<&Snapshot>, current: &Snapshot) -> Vec<ChangeEvent> {
    let Some(previous) = previous else {
        return current
            .interfaces()
            .cloned()
            .map(ChangeEvent::InterfaceAdded)
            .collect();
    };

    let mut changes: Vec<ChangeEvent> = previous
        .interfaces()
        .filter(|iface| !current.contains(&iface.name))
        .cloned()
        .map(ChangeEvent::InterfaceRemoved)
        .collect();

    changes.extend(
        current
            .interfaces()
            .filter(|iface| !previous.contains(&iface.name))
            .cloned()
            .map(ChangeEvent::InterfaceAdded),
    );

    for new in current.interfaces() {
        if let Some(old) = previous.get(&new.name) {
            diff_interface(&mut changes, old, new);
        }
    }

    changes
}

/// Appends the changes of one interface present in both snapshots.
fn diff_interface(changes: &mut Vec<ChangeEvent>, old: &Interface, new: &Interface) {
    if old.state != new.state {
        changes.push(ChangeEvent::StateChanged {
            interface: new.name.clone(),
            old: old.state,
            new: new.state,
        });
    }

    if old.mtu != new.mtu {
        changes.push(ChangeEvent::MtuChanged {
            interface: new.name.clone(),
            old: old.mtu,
            new: new.mtu,
        });
    }

    changes.extend(
        old.addresses
            .difference(&new.addresses)
            .map(|address| ChangeEvent::AddressRemoved {
                interface: new.name.clone(),
                address: *address,
            }),
    );

    changes.extend(
        new.addresses
            .difference(&old.addresses)
            .map(|address| ChangeEvent::AddressAdded {
                interface: new.name.clone(),
                address: *address,
            }),
    );
}

#[cfg(test)]
#[path = "change_tests.rs"]
mod tests;
