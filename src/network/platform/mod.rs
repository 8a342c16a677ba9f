//! Platform-specific [`SnapshotReader`](super::SnapshotReader) implementations.
//!
//! # Platform Support
//!
//! - **Unix**: `getifaddrs` via `libc`, with state and MTU from sysfs on Linux.
//! - **Windows**: `GetAdaptersAddresses` via the `windows` crate.

#[cfg(unix)]
mod unix;

#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::{DEFAULT_SYSFS_ROOT, UnixReader};

#[cfg(windows)]
pub use windows::WindowsReader;

/// The reader for the compilation target.
#[cfg(unix)]
pub use unix::UnixReader as PlatformReader;

/// The reader for the compilation target.
#[cfg(windows)]
pub use windows::WindowsReader as PlatformReader;
