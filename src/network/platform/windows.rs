//! Windows interface reading using `GetAdaptersAddresses`.

use crate::network::{
    Interface, InterfaceAddress, OperState, ReadError, Snapshot, SnapshotReader,
};
use crate::time::{Clock, SystemClock};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use windows::Win32::Foundation::WIN32_ERROR;
use windows::Win32::NetworkManagement::IpHelper::{
    GAA_FLAG_SKIP_ANYCAST, GAA_FLAG_SKIP_DNS_SERVER, GAA_FLAG_SKIP_MULTICAST,
    GET_ADAPTERS_ADDRESSES_FLAGS, GetAdaptersAddresses, IF_TYPE_SOFTWARE_LOOPBACK,
    IP_ADAPTER_ADDRESSES_LH,
};
use windows::Win32::NetworkManagement::Ndis::{
    IF_OPER_STATUS, IfOperStatusDormant, IfOperStatusDown, IfOperStatusLowerLayerDown,
    IfOperStatusNotPresent, IfOperStatusUp,
};
use windows::Win32::Networking::WinSock::{AF_INET, AF_INET6, AF_UNSPEC, SOCKADDR_IN, SOCKADDR_IN6};

/// Initial buffer size for `GetAdaptersAddresses`; the API reports the
/// required size if this is too small.
const INITIAL_BUFFER_SIZE: u32 = 16384;

/// Windows implementation of [`SnapshotReader`].
///
/// Interfaces are keyed by adapter friendly name. State comes from
/// `OperStatus`, MTU from `Mtu` and prefix lengths from `OnLinkPrefixLength`.
#[derive(Debug, Clone, Default)]
pub struct WindowsReader<C = SystemClock> {
    clock: C,
}

impl WindowsReader<SystemClock> {
    /// Creates a reader using the system clock.
    #[must_use]
    pub const fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl<C: Clock> WindowsReader<C> {
    /// Creates a reader stamping snapshots with the given clock.
    pub const fn with_clock(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> SnapshotReader for WindowsReader<C> {
    fn capture(&self) -> Result<Snapshot, ReadError> {
        let interfaces = read_adapters()?;
        Ok(Snapshot::new(self.clock.now(), interfaces))
    }
}

fn read_adapters() -> Result<Vec<Interface>, ReadError> {
    let raw = get_adapter_addresses()?;

    let mut interfaces = Vec::new();
    // GetAdaptersAddresses fills the buffer with properly aligned structures.
    #[allow(clippy::cast_ptr_alignment)]
    let mut current = raw.as_ptr().cast::<IP_ADAPTER_ADDRESSES_LH>();

    while !current.is_null() {
        // SAFETY: linked list inside `raw`, which outlives the loop.
        let adapter = unsafe { &*current };

        if let Some(iface) = parse_adapter(adapter) {
            interfaces.push(iface);
        }

        current = adapter.Next;
    }

    Ok(interfaces)
}

fn get_adapter_addresses() -> Result<Vec<u8>, ReadError> {
    let flags = GAA_FLAG_SKIP_ANYCAST | GAA_FLAG_SKIP_MULTICAST | GAA_FLAG_SKIP_DNS_SERVER;
    let family = u32::from(AF_UNSPEC.0);

    let mut buffer: Vec<u8> = vec![0u8; INITIAL_BUFFER_SIZE as usize];
    let mut size = INITIAL_BUFFER_SIZE;

    // SAFETY: valid buffer and size; the call updates `size` with the required length.
    let result = unsafe {
        GetAdaptersAddresses(
            family,
            flags,
            None,
            Some(buffer.as_mut_ptr().cast()),
            &raw mut size,
        )
    };

    handle_api_result(result, &mut buffer, &mut size, flags, family)?;

    Ok(buffer)
}

/// Retries once with the reported size on `ERROR_BUFFER_OVERFLOW`.
#[cfg(not(tarpaulin_include))]
fn handle_api_result(
    result: u32,
    buffer: &mut Vec<u8>,
    size: &mut u32,
    flags: GET_ADAPTERS_ADDRESSES_FLAGS,
    family: u32,
) -> Result<(), ReadError> {
    use windows::Win32::Foundation::{ERROR_ACCESS_DENIED, ERROR_BUFFER_OVERFLOW, NO_ERROR};

    let result = if result == ERROR_BUFFER_OVERFLOW.0 {
        buffer.resize(*size as usize, 0);

        // SAFETY: same call with a correctly sized buffer.
        unsafe {
            GetAdaptersAddresses(
                family,
                flags,
                None,
                Some(buffer.as_mut_ptr().cast()),
                &raw mut *size,
            )
        }
    } else {
        result
    };

    if result == ERROR_ACCESS_DENIED.0 {
        return Err(ReadError::PermissionDenied {
            context: "GetAdaptersAddresses".to_string(),
        });
    }
    if result != NO_ERROR.0 {
        return Err(windows::core::Error::from(WIN32_ERROR(result)).into());
    }

    Ok(())
}

fn parse_adapter(adapter: &IP_ADAPTER_ADDRESSES_LH) -> Option<Interface> {
    // SAFETY: FriendlyName is a NUL-terminated wide string owned by the buffer.
    let name = unsafe { adapter.FriendlyName.to_string().ok()? };

    let mut iface = Interface::new(name, map_oper_status(adapter.OperStatus), adapter.Mtu)
        .with_loopback(adapter.IfType == IF_TYPE_SOFTWARE_LOOPBACK);
    iface.addresses = collect_addresses(adapter).into_iter().collect();

    Some(iface)
}

fn map_oper_status(status: IF_OPER_STATUS) -> OperState {
    match status {
        s if s == IfOperStatusUp => OperState::Up,
        s if s == IfOperStatusDown
            || s == IfOperStatusLowerLayerDown
            || s == IfOperStatusNotPresent
            || s == IfOperStatusDormant =>
        {
            OperState::Down
        }
        _ => OperState::Unknown,
    }
}

// Windows aligns the SOCKADDR_IN/SOCKADDR_IN6 structures it returns.
#[allow(clippy::cast_ptr_alignment)]
fn collect_addresses(adapter: &IP_ADAPTER_ADDRESSES_LH) -> Vec<InterfaceAddress> {
    let mut addresses = Vec::new();
    let mut unicast = adapter.FirstUnicastAddress;

    while !unicast.is_null() {
        // SAFETY: unicast list entries live inside the adapter buffer.
        let entry = unsafe { &*unicast };

        // SAFETY: lpSockaddr points to a SOCKADDR_IN or SOCKADDR_IN6.
        if let Some(sockaddr) = unsafe { entry.Address.lpSockaddr.as_ref() } {
            let address = match sockaddr.sa_family {
                f if f == AF_INET => {
                    // SAFETY: family checked above.
                    let sin = unsafe { &*(std::ptr::from_ref(sockaddr).cast::<SOCKADDR_IN>()) };
                    // SAFETY: every view of the union is four bytes.
                    let o = unsafe { sin.sin_addr.S_un.S_un_b };
                    Some(IpAddr::V4(Ipv4Addr::new(o.s_b1, o.s_b2, o.s_b3, o.s_b4)))
                }
                f if f == AF_INET6 => {
                    // SAFETY: family checked above.
                    let sin6 = unsafe { &*(std::ptr::from_ref(sockaddr).cast::<SOCKADDR_IN6>()) };
                    // SAFETY: every view of the union is sixteen bytes.
                    let octets = unsafe { sin6.sin6_addr.u.Byte };
                    Some(IpAddr::V6(Ipv6Addr::from(octets)))
                }
                _ => None,
            };

            if let Some(address) = address {
                addresses.push(InterfaceAddress::new(address, entry.OnLinkPrefixLength));
            }
        }

        unicast = entry.Next;
    }

    addresses
}
