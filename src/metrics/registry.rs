//! The metrics registry shared by the poller and the HTTP endpoint.

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv6Addr;
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;

use prometheus::{IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

use super::{MetricsError, RenderError};
use crate::monitor::{ChangeEvent, PrefixObservation, PrefixWatch};
use crate::network::{Interface, InterfaceAddress, Snapshot};
use crate::time::unix_seconds;

const NAMESPACE: &str = "netif";

/// Holds every exported series and applies change events to them.
///
/// Writers take the inner lock for a whole cycle and the renderer gathers
/// under the read side, so a scrape never observes half a cycle.
pub struct MetricsRegistry {
    registry: Registry,
    inner: RwLock<Collectors>,
}

struct Collectors {
    oper_state: IntGaugeVec,
    mtu: IntGaugeVec,
    address_info: IntGaugeVec,
    interfaces: IntGauge,

    interface_added: IntCounterVec,
    interface_removed: IntCounterVec,
    address_added: IntCounterVec,
    address_removed: IntCounterVec,
    state_changes: IntCounterVec,
    mtu_changes: IntCounterVec,

    polls: IntCounterVec,
    consecutive_failures: IntGauge,
    last_success: IntGauge,

    prefix_changed: IntGaugeVec,
    prefix_info: IntGaugeVec,

    /// Addresses currently exported per interface.
    known: BTreeMap<String, BTreeSet<InterfaceAddress>>,
    /// Prefix currently exported per watch.
    prefixes: BTreeMap<PrefixWatch, Ipv6Addr>,
}

fn gauge_vec(name: &str, help: &str, labels: &[&str]) -> Result<IntGaugeVec, prometheus::Error> {
    IntGaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), labels)
}

fn counter_vec(
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<IntCounterVec, prometheus::Error> {
    IntCounterVec::new(Opts::new(name, help).namespace(NAMESPACE), labels)
}

/// Deletes one series. Deleting a series that was never set is not an error.
fn drop_series(vec: &IntGaugeVec, labels: &[&str]) {
    if vec.remove_label_values(labels).is_err() {
        tracing::trace!("No series to remove for {labels:?}");
    }
}

fn gauge(name: &str, help: &str) -> Result<IntGauge, prometheus::Error> {
    IntGauge::with_opts(Opts::new(name, help).namespace(NAMESPACE))
}

impl Collectors {
    fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            oper_state: gauge_vec(
                "interface_oper_state",
                "Operational state of the interface (1 = up, 0 = down, -1 = unknown)",
                &["interface"],
            )?,
            mtu: gauge_vec(
                "interface_mtu_bytes",
                "Maximum transmission unit of the interface in bytes",
                &["interface"],
            )?,
            address_info: gauge_vec(
                "interface_address_info",
                "Address assigned to an interface (always 1 while present)",
                &["interface", "address", "prefix_length", "ip_version"],
            )?,
            interfaces: gauge("interfaces", "Number of interfaces currently observed")?,
            interface_added: counter_vec(
                "interface_added_total",
                "Number of times the interface appeared",
                &["interface"],
            )?,
            interface_removed: counter_vec(
                "interface_removed_total",
                "Number of times the interface disappeared",
                &["interface"],
            )?,
            address_added: counter_vec(
                "address_added_total",
                "Addresses added to existing interfaces",
                &["interface", "ip_version"],
            )?,
            address_removed: counter_vec(
                "address_removed_total",
                "Addresses removed from existing interfaces",
                &["interface", "ip_version"],
            )?,
            state_changes: counter_vec(
                "state_changes_total",
                "Operational state transitions",
                &["interface"],
            )?,
            mtu_changes: counter_vec("mtu_changes_total", "MTU changes", &["interface"])?,
            polls: counter_vec(
                "polls_total",
                "Poll cycles by outcome (success, failure)",
                &["outcome"],
            )?,
            consecutive_failures: gauge(
                "poll_consecutive_failures",
                "Poll cycles failed in a row since the last success",
            )?,
            last_success: gauge(
                "last_successful_poll_timestamp_seconds",
                "Unix time of the last successful poll cycle",
            )?,
            prefix_changed: gauge_vec(
                "ipv6_prefix_changed",
                "1 if the watched IPv6 prefix changed in the last cycle, else 0",
                &["interface", "prefix_length"],
            )?,
            prefix_info: gauge_vec(
                "ipv6_prefix_info",
                "Current IPv6 prefix of a watched interface (always 1 while present)",
                &["interface", "prefix_length", "prefix"],
            )?,
            known: BTreeMap::new(),
            prefixes: BTreeMap::new(),
        })
    }

    fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.oper_state.clone()))?;
        registry.register(Box::new(self.mtu.clone()))?;
        registry.register(Box::new(self.address_info.clone()))?;
        registry.register(Box::new(self.interfaces.clone()))?;
        registry.register(Box::new(self.interface_added.clone()))?;
        registry.register(Box::new(self.interface_removed.clone()))?;
        registry.register(Box::new(self.address_added.clone()))?;
        registry.register(Box::new(self.address_removed.clone()))?;
        registry.register(Box::new(self.state_changes.clone()))?;
        registry.register(Box::new(self.mtu_changes.clone()))?;
        registry.register(Box::new(self.polls.clone()))?;
        registry.register(Box::new(self.consecutive_failures.clone()))?;
        registry.register(Box::new(self.last_success.clone()))?;
        registry.register(Box::new(self.prefix_changed.clone()))?;
        registry.register(Box::new(self.prefix_info.clone()))?;

        // Pre-create both outcomes so rate() works from the first scrape.
        self.polls.with_label_values(&["success"]);
        self.polls.with_label_values(&["failure"]);
        Ok(())
    }

    fn apply(&mut self, event: &ChangeEvent) {
        match event {
            ChangeEvent::InterfaceAdded(iface) => {
                self.interface_added
                    .with_label_values(&[iface.name.as_str()])
                    .inc();
                self.set_interface(iface);
            }
            ChangeEvent::InterfaceRemoved(iface) => {
                self.interface_removed
                    .with_label_values(&[iface.name.as_str()])
                    .inc();
                self.clear_interface(iface);
            }
            ChangeEvent::AddressAdded { interface, address } => {
                self.address_added
                    .with_label_values(&[interface.as_str(), address.version().label()])
                    .inc();
                self.set_address(interface, address);
                self.known
                    .entry(interface.clone())
                    .or_default()
                    .insert(*address);
            }
            ChangeEvent::AddressRemoved { interface, address } => {
                self.address_removed
                    .with_label_values(&[interface.as_str(), address.version().label()])
                    .inc();
                self.remove_address(interface, address);
                if let Some(addresses) = self.known.get_mut(interface) {
                    addresses.remove(address);
                }
            }
            ChangeEvent::StateChanged {
                interface, new, ..
            } => {
                self.state_changes
                    .with_label_values(&[interface.as_str()])
                    .inc();
                self.oper_state
                    .with_label_values(&[interface.as_str()])
                    .set(new.gauge_value());
            }
            ChangeEvent::MtuChanged {
                interface, new, ..
            } => {
                self.mtu_changes.with_label_values(&[interface.as_str()]).inc();
                self.mtu
                    .with_label_values(&[interface.as_str()])
                    .set(i64::from(*new));
            }
        }
    }

    fn set_interface(&mut self, iface: &Interface) {
        let name = iface.name.as_str();
        self.oper_state
            .with_label_values(&[name])
            .set(iface.state.gauge_value());
        self.mtu.with_label_values(&[name]).set(i64::from(iface.mtu));

        // Replace whatever was exported before for this name.
        if let Some(stale) = self.known.remove(name) {
            for address in &stale {
                self.remove_address(name, address);
            }
        }
        for address in &iface.addresses {
            self.set_address(name, address);
        }
        self.known.insert(iface.name.clone(), iface.addresses.clone());
        self.update_count();
    }

    fn clear_interface(&mut self, iface: &Interface) {
        let name = iface.name.as_str();
        drop_series(&self.oper_state, &[name]);
        drop_series(&self.mtu, &[name]);

        let mut addresses = self.known.remove(name).unwrap_or_default();
        addresses.extend(iface.addresses.iter().copied());
        for address in &addresses {
            self.remove_address(name, address);
        }
        self.update_count();
    }

    fn set_address(&self, interface: &str, address: &InterfaceAddress) {
        let (addr, prefix) = (address.address.to_string(), address.prefix_len.to_string());
        self.address_info
            .with_label_values(&[interface, &addr, &prefix, address.version().label()])
            .set(1);
    }

    fn remove_address(&self, interface: &str, address: &InterfaceAddress) {
        let (addr, prefix) = (address.address.to_string(), address.prefix_len.to_string());
        drop_series(
            &self.address_info,
            &[interface, &addr, &prefix, address.version().label()],
        );
    }

    #[allow(clippy::cast_possible_wrap)] // interface counts never approach i64::MAX
    fn update_count(&self) {
        self.interfaces.set(self.known.len() as i64);
    }

    fn apply_prefix(&mut self, observation: &PrefixObservation) {
        let watch = &observation.watch;
        let len = watch.prefix_len.to_string();
        let interface = watch.interface.as_str();

        self.prefix_changed
            .with_label_values(&[interface, &len])
            .set(i64::from(observation.changed));

        let previous = match observation.current {
            Some(prefix) => self.prefixes.insert(watch.clone(), prefix),
            None => self.prefixes.remove(watch),
        };
        if let Some(old) = previous.filter(|old| Some(*old) != observation.current) {
            drop_series(&self.prefix_info, &[interface, &len, &old.to_string()]);
        }
        if let Some(prefix) = observation.current {
            self.prefix_info
                .with_label_values(&[interface, &len, &prefix.to_string()])
                .set(1);
        }
    }
}

impl MetricsRegistry {
    /// Creates a registry with all collectors registered and no series.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Prometheus`] if a collector cannot be created
    /// or registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let collectors = Collectors::new()?;
        collectors.register(&registry)?;

        Ok(Self {
            registry,
            inner: RwLock::new(collectors),
        })
    }

    /// Applies one change event.
    ///
    /// Not idempotent: applying the same event twice double-counts.
    pub fn apply_event(&self, event: &ChangeEvent) {
        self.write().apply(event);
    }

    /// Applies a batch of events under a single lock acquisition.
    pub fn apply_batch(&self, events: &[ChangeEvent]) {
        let mut inner = self.write();
        for event in events {
            inner.apply(event);
        }
    }

    /// Applies the outcome of a successful poll cycle atomically: events,
    /// prefix observations and poll-health series.
    pub fn apply_cycle(
        &self,
        events: &[ChangeEvent],
        prefixes: &[PrefixObservation],
        completed_at: SystemTime,
    ) {
        let mut inner = self.write();
        for event in events {
            inner.apply(event);
        }
        for observation in prefixes {
            inner.apply_prefix(observation);
        }
        inner.polls.with_label_values(&["success"]).inc();
        inner.consecutive_failures.set(0);
        inner
            .last_success
            .set(i64::try_from(unix_seconds(completed_at)).unwrap_or(i64::MAX));
    }

    /// Records a failed poll cycle. Interface series are left untouched.
    pub fn record_failure(&self) {
        let inner = self.write();
        inner.polls.with_label_values(&["failure"]).inc();
        inner.consecutive_failures.inc();
    }

    /// Sets the per-interface gauges from a snapshot without touching counters.
    ///
    /// Used to restore a persisted baseline at startup.
    pub fn seed(&self, snapshot: &Snapshot) {
        let mut inner = self.write();
        for iface in snapshot.interfaces() {
            inner.set_interface(iface);
        }
    }

    /// Renders all series in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Poisoned`] if a writer panicked mid-update, or
    /// [`RenderError::Encode`] if encoding fails.
    pub fn render(&self) -> Result<String, RenderError> {
        let _consistent = self.inner.read().map_err(|_| RenderError::Poisoned)?;
        let families = self.registry.gather();
        Ok(TextEncoder::new().encode_to_string(&families)?)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Collectors> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
impl MetricsRegistry {
    /// Returns every series of a family as `labels -> value`.
    pub(crate) fn series(&self, name: &str) -> BTreeMap<Vec<(String, String)>, f64> {
        use prometheus::proto::MetricType;

        let mut out = BTreeMap::new();
        for family in self.registry.gather() {
            if family.get_name() != name {
                continue;
            }
            for metric in family.get_metric() {
                let labels = metric
                    .get_label()
                    .iter()
                    .map(|l| (l.get_name().to_string(), l.get_value().to_string()))
                    .collect();
                let value = match family.get_field_type() {
                    MetricType::COUNTER => metric.get_counter().get_value(),
                    _ => metric.get_gauge().get_value(),
                };
                out.insert(labels, value);
            }
        }
        out
    }

    /// Returns one sample, matching labels exactly.
    pub(crate) fn sample(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let mut wanted: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        wanted.sort();
        self.series(name)
            .into_iter()
            .find(|(labels, _)| {
                let mut sorted = labels.clone();
                sorted.sort();
                sorted == wanted
            })
            .map(|(_, value)| value)
    }

    /// Poisons the inner lock by panicking while holding it.
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.inner.write();
            panic!("poisoning registry lock");
        }));
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
