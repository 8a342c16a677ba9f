//! Unix interface reading using `getifaddrs` and Linux sysfs.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::CStr;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

use crate::network::{
    Interface, InterfaceAddress, IpVersion, OperState, ReadError, Snapshot, SnapshotReader,
};
use crate::time::{Clock, SystemClock};

/// Default location of per-interface attributes on Linux.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/net";

/// Unix implementation of [`SnapshotReader`].
///
/// Names, flags and addresses come from `getifaddrs(3)`. Operational state and
/// MTU come from `<sysfs_root>/<name>/{operstate,mtu}`; when the sysfs root does
/// not exist (non-Linux systems) state is derived from `IFF_UP`/`IFF_RUNNING`
/// and MTU is reported as 0.
///
/// # Example
///
/// ```no_run
/// use netif_exporter::network::SnapshotReader;
/// use netif_exporter::network::platform::UnixReader;
///
/// let reader = UnixReader::new();
/// let snapshot = reader.capture().expect("capture failed");
///
/// for iface in snapshot.interfaces() {
///     println!("{} {} mtu={}", iface.name, iface.state, iface.mtu);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct UnixReader<C = SystemClock> {
    clock: C,
    sysfs_root: PathBuf,
}

impl UnixReader<SystemClock> {
    /// Creates a reader using the system clock and `/sys/class/net`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for UnixReader<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> UnixReader<C> {
    /// Creates a reader stamping snapshots with the given clock.
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
        }
    }

    /// Overrides the directory holding per-interface attributes.
    #[must_use]
    pub fn with_sysfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = root.into();
        self
    }

    /// Returns the sysfs root in use.
    #[must_use]
    pub fn sysfs_root(&self) -> &Path {
        &self.sysfs_root
    }

    fn build(&self, entries: Vec<RawEntry>) -> Result<Vec<Interface>, ReadError> {
        let use_sysfs = self.sysfs_root.is_dir();
        let mut interfaces = Vec::new();

        for (name, pending) in group_entries(entries) {
            let attributes = if use_sysfs {
                read_sysfs_attributes(&self.sysfs_root, &name)?
            } else {
                Some((state_from_flags(pending.flags), 0))
            };

            // Gone between getifaddrs and the sysfs read.
            let Some((state, mtu)) = attributes else {
                continue;
            };

            let mut iface = Interface::new(name, state, mtu).with_loopback(is_loopback(pending.flags));
            iface.addresses = pending.addresses;
            interfaces.push(iface);
        }

        Ok(interfaces)
    }
}

impl<C: Clock> SnapshotReader for UnixReader<C> {
    fn capture(&self) -> Result<Snapshot, ReadError> {
        let entries = enumerate()?;
        let interfaces = self.build(entries)?;
        Ok(Snapshot::new(self.clock.now(), interfaces))
    }
}

/// One `ifaddrs` list entry, copied out of libc memory.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawEntry {
    name: String,
    flags: u32,
    address: Option<InterfaceAddress>,
}

#[derive(Debug, Default)]
struct PendingInterface {
    flags: u32,
    addresses: BTreeSet<InterfaceAddress>,
}

/// Owns the list returned by `getifaddrs` and frees it on drop.
struct IfAddrs(*mut libc::ifaddrs);

impl IfAddrs {
    fn load() -> io::Result<Self> {
        let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
        // SAFETY: `head` is a valid out-pointer; on success getifaddrs stores the
        // head of a list that must be released with freeifaddrs.
        let ret = unsafe { libc::getifaddrs(&raw mut head) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self(head))
    }
}

impl Drop for IfAddrs {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: the pointer came from a successful getifaddrs call and is
            // freed exactly once.
            unsafe { libc::freeifaddrs(self.0) };
        }
    }
}

fn enumerate() -> Result<Vec<RawEntry>, ReadError> {
    let list = IfAddrs::load().map_err(ReadError::from_enumerate)?;
    let mut entries = Vec::new();
    let mut cursor = list.0;

    while !cursor.is_null() {
        // SAFETY: `cursor` walks the list owned by `list`, which outlives the loop.
        let entry = unsafe { &*cursor };
        cursor = entry.ifa_next;

        if entry.ifa_name.is_null() {
            continue;
        }
        // SAFETY: getifaddrs guarantees a NUL-terminated name.
        let name = unsafe { CStr::from_ptr(entry.ifa_name) }
            .to_string_lossy()
            .into_owned();

        // SAFETY: address and netmask are null or point into the live list.
        let address = unsafe { sockaddr_to_ip(entry.ifa_addr) }.map(|ip| {
            // SAFETY: as above.
            let prefix_len = unsafe { sockaddr_to_ip(entry.ifa_netmask) }
                .and_then(|mask| prefix_from_netmask(&mask))
                .unwrap_or_else(|| IpVersion::of(&ip).max_prefix_len());
            InterfaceAddress::new(ip, prefix_len)
        });

        entries.push(RawEntry {
            name,
            flags: entry.ifa_flags,
            address,
        });
    }

    Ok(entries)
}

/// Reads an IPv4/IPv6 address out of a `sockaddr`.
///
/// # Safety
///
/// `addr` must be null or point to a socket address whose storage matches its
/// `sa_family` and stays valid for the duration of the call.
unsafe fn sockaddr_to_ip(addr: *const libc::sockaddr) -> Option<IpAddr> {
    if addr.is_null() {
        return None;
    }

    // SAFETY: non-null and valid per the caller contract.
    let family = i32::from(unsafe { (*addr).sa_family });
    match family {
        libc::AF_INET => {
            // SAFETY: AF_INET storage is a sockaddr_in; read_unaligned tolerates
            // the sockaddr alignment.
            let sin = unsafe { std::ptr::read_unaligned(addr.cast::<libc::sockaddr_in>()) };
            Some(IpAddr::V4(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr))))
        }
        libc::AF_INET6 => {
            // SAFETY: AF_INET6 storage is a sockaddr_in6.
            let sin6 = unsafe { std::ptr::read_unaligned(addr.cast::<libc::sockaddr_in6>()) };
            Some(IpAddr::V6(Ipv6Addr::from(sin6.sin6_addr.s6_addr)))
        }
        _ => None,
    }
}

/// Converts a netmask to a prefix length by counting set bits.
fn prefix_from_netmask(mask: &IpAddr) -> Option<u8> {
    let bits = match mask {
        IpAddr::V4(m) => u32::from(*m).count_ones(),
        IpAddr::V6(m) => u128::from(*m).count_ones(),
    };
    u8::try_from(bits).ok()
}

/// Merges entries by name: flags are OR'd, addresses collected.
fn group_entries(entries: Vec<RawEntry>) -> BTreeMap<String, PendingInterface> {
    let mut grouped: BTreeMap<String, PendingInterface> = BTreeMap::new();
    for entry in entries {
        let pending = grouped.entry(base_name(&entry.name).to_string()).or_default();
        pending.flags |= entry.flags;
        if let Some(address) = entry.address {
            pending.addresses.insert(address);
        }
    }
    grouped
}

/// Strips a Linux address label (`eth0:1`) down to the device name.
///
/// Labelled addresses have no sysfs directory of their own.
fn base_name(name: &str) -> &str {
    name.split_once(':').map_or(name, |(base, _)| base)
}

#[allow(clippy::cast_sign_loss)] // IFF_* constants are small positive c_ints
const fn is_loopback(flags: u32) -> bool {
    flags & (libc::IFF_LOOPBACK as u32) != 0
}

#[allow(clippy::cast_sign_loss)]
const fn state_from_flags(flags: u32) -> OperState {
    let up = flags & (libc::IFF_UP as u32) != 0;
    let running = flags & (libc::IFF_RUNNING as u32) != 0;
    if up && running {
        OperState::Up
    } else {
        OperState::Down
    }
}

/// Reads `operstate` and `mtu` for one interface.
///
/// Returns `Ok(None)` if the interface directory no longer exists.
fn read_sysfs_attributes(root: &Path, name: &str) -> Result<Option<(OperState, u32)>, ReadError> {
    let dir = root.join(name);

    let Some(operstate) = read_attribute(&dir, name, "operstate")? else {
        return Ok(None);
    };
    let Some(mtu) = read_attribute(&dir, name, "mtu")? else {
        return Ok(None);
    };

    let mtu = mtu.trim().parse::<u32>().map_err(|e| ReadError::Attribute {
        interface: name.to_string(),
        attribute: "mtu",
        source: io::Error::new(io::ErrorKind::InvalidData, e),
    })?;

    Ok(Some((OperState::from_operstate(&operstate), mtu)))
}

fn read_attribute(
    dir: &Path,
    name: &str,
    attribute: &'static str,
) -> Result<Option<String>, ReadError> {
    match std::fs::read_to_string(dir.join(attribute)) {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ReadError::Attribute {
            interface: name.to_string(),
            attribute,
            source,
        }),
    }
}
