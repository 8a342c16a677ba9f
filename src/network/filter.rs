//! Interface filtering for selective monitoring.
//!
//! # Design
//!
//! - **Pure Matchers**: [`NameRegexFilter`] and [`LoopbackFilter`] only answer
//!   "does this interface match?" without include/exclude semantics.
//! - **Filter Chain**: [`FilterChain`] combines matchers:
//!   - Exclude filters: any match rejects the interface
//!   - Include filters: any match accepts it (empty = match all)
//! - **Decorator**: [`FilteredReader`] applies filtering transparently
//!   to any [`SnapshotReader`] implementation.

use regex::Regex;

use super::{Interface, ReadError, Snapshot, SnapshotReader};

/// Trait for filtering network interfaces.
///
/// Filters must be `Send + Sync` so the reader can run on the blocking pool.
pub trait InterfaceFilter: Send + Sync {
    /// Returns `true` if the interface matches this filter.
    fn matches(&self, interface: &Interface) -> bool;
}

/// Matches interfaces by name pattern.
///
/// # Examples
///
/// ```
/// use netif_exporter::network::filter::{InterfaceFilter, NameRegexFilter};
/// use netif_exporter::network::{Interface, OperState};
///
/// let filter = NameRegexFilter::new(r"^eth").unwrap();
///
/// assert!(filter.matches(&Interface::new("eth0", OperState::Up, 1500)));
/// assert!(!filter.matches(&Interface::new("wlan0", OperState::Up, 1500)));
/// ```
#[derive(Debug, Clone)]
pub struct NameRegexFilter {
    pattern: Regex,
}

impl NameRegexFilter {
    /// Creates a name filter with the given regex pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    /// Returns the regex pattern.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Regex is not a const type
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }
}

impl InterfaceFilter for NameRegexFilter {
    fn matches(&self, interface: &Interface) -> bool {
        self.pattern.is_match(&interface.name)
    }
}

/// Matches loopback interfaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackFilter;

impl InterfaceFilter for LoopbackFilter {
    fn matches(&self, interface: &Interface) -> bool {
        interface.loopback
    }
}

/// Filter chain with include/exclude semantics.
///
/// Evaluation order:
/// 1. **Exclude filters**: any match rejects.
/// 2. **Include filters**: any match accepts. Empty includes = match all.
///
/// # Examples
///
/// ```
/// use netif_exporter::network::filter::{FilterChain, InterfaceFilter, LoopbackFilter, NameRegexFilter};
/// use netif_exporter::network::{Interface, OperState};
///
/// let chain = FilterChain::new()
///     .exclude(LoopbackFilter)
///     .include(NameRegexFilter::new("^eth").unwrap());
///
/// let eth = Interface::new("eth0", OperState::Up, 1500);
/// let docker = Interface::new("docker0", OperState::Up, 1500);
/// let lo = Interface::new("lo", OperState::Unknown, 65536).with_loopback(true);
///
/// assert!(chain.matches(&eth));
/// assert!(!chain.matches(&docker));
/// assert!(!chain.matches(&lo));
/// ```
#[derive(Default)]
pub struct FilterChain {
    includes: Vec<Box<dyn InterfaceFilter>>,
    excludes: Vec<Box<dyn InterfaceFilter>>,
}

impl FilterChain {
    /// Creates an empty filter chain (matches all interfaces).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an include filter.
    #[must_use]
    pub fn include<F: InterfaceFilter + 'static>(mut self, filter: F) -> Self {
        self.includes.push(Box::new(filter));
        self
    }

    /// Adds an exclude filter.
    #[must_use]
    pub fn exclude<F: InterfaceFilter + 'static>(mut self, filter: F) -> Self {
        self.excludes.push(Box::new(filter));
        self
    }

    /// Returns the number of include filters.
    #[must_use]
    pub fn include_count(&self) -> usize {
        self.includes.len()
    }

    /// Returns the number of exclude filters.
    #[must_use]
    pub fn exclude_count(&self) -> usize {
        self.excludes.len()
    }

    /// Returns the total number of filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.includes.len() + self.excludes.len()
    }

    /// Returns true if no filters are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }
}

impl InterfaceFilter for FilterChain {
    fn matches(&self, interface: &Interface) -> bool {
        if self.excludes.iter().any(|f| f.matches(interface)) {
            return false;
        }

        self.includes.is_empty() || self.includes.iter().any(|f| f.matches(interface))
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("include_count", &self.includes.len())
            .field("exclude_count", &self.excludes.len())
            .finish()
    }
}

/// A reader decorator that drops interfaces rejected by a filter.
///
/// Filtering happens before the snapshot leaves the reader, so filtered-out
/// interfaces never reach the differ and produce no events or series.
#[derive(Debug)]
pub struct FilteredReader<R, F> {
    inner: R,
    filter: F,
}

impl<R, F> FilteredReader<R, F> {
    /// Wraps `inner`, keeping only interfaces accepted by `filter`.
    pub const fn new(inner: R, filter: F) -> Self {
        Self { inner, filter }
    }

    /// Returns the wrapped reader.
    pub const fn inner(&self) -> &R {
        &self.inner
    }

    /// Returns the filter.
    pub const fn filter(&self) -> &F {
        &self.filter
    }
}

impl<R, F> SnapshotReader for FilteredReader<R, F>
where
    R: SnapshotReader,
    F: InterfaceFilter,
{
    fn capture(&self) -> Result<Snapshot, ReadError> {
        let snapshot = self.inner.capture()?;
        Ok(snapshot.retain(|iface| self.filter.matches(iface)))
    }
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
