//! Fixed-interval poll loop: read, diff, apply.
//!
//! [`Poller`] owns the previous snapshot and drives one cycle per tick:
//!
//! ```text
//! Idle -> Capturing -> Diffing -> Applying -> Idle
//! ```
//!
//! A failed or timed-out capture abandons the cycle and keeps the previous
//! snapshot, so the next successful cycle reports the coalesced difference.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use super::change::diff;
use super::error::MonitorError;
use super::prefix::{PrefixWatch, observe};
use crate::metrics::MetricsRegistry;
use crate::network::{ReadError, Snapshot, SnapshotReader};
use crate::time::{Clock, SystemClock, unix_seconds};

/// Upper bound for the default read timeout.
const MAX_DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Returns the default read timeout: half the interval, capped at 5 s.
#[must_use]
pub fn default_read_timeout(poll_interval: Duration) -> Duration {
    (poll_interval / 2).min(MAX_DEFAULT_READ_TIMEOUT)
}

/// Where the poller is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the next tick.
    Idle,
    /// Reader running on the blocking pool.
    Capturing,
    /// Computing events against the previous snapshot.
    Diffing,
    /// Applying events to the registry.
    Applying,
}

/// Outcome of a successful cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// The snapshot now held as previous.
    pub snapshot: Arc<Snapshot>,
    /// Number of change events applied.
    pub events: usize,
    /// When the cycle finished applying.
    pub completed_at: SystemTime,
}

impl CycleReport {
    /// Returns true if the cycle produced any change event.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.events > 0
    }
}

/// Drives the read → diff → apply cycle on a fixed interval.
///
/// # Type Parameters
///
/// * `R` - The [`SnapshotReader`] to capture with
/// * `C` - The [`Clock`] stamping cycle completion (defaults to [`SystemClock`])
pub struct Poller<R, C = SystemClock> {
    reader: Arc<R>,
    clock: C,
    registry: Arc<MetricsRegistry>,
    interval: Interval,
    read_timeout: Duration,
    watches: Vec<PrefixWatch>,
    previous: Option<Arc<Snapshot>>,
    phase: Phase,
    published: watch::Sender<Option<Arc<Snapshot>>>,
    /// A timed-out read that has not returned yet.
    in_flight: Option<JoinHandle<Result<Snapshot, ReadError>>>,
}

impl<R> Poller<R, SystemClock>
where
    R: SnapshotReader + 'static,
{
    /// Creates a poller using the system clock.
    ///
    /// Must be called inside a Tokio runtime. The first tick fires one
    /// `poll_interval` from now.
    #[must_use]
    pub fn new(reader: R, registry: Arc<MetricsRegistry>, poll_interval: Duration) -> Self {
        Self::with_clock(reader, SystemClock, registry, poll_interval)
    }
}

impl<R, C> Poller<R, C>
where
    R: SnapshotReader + 'static,
    C: Clock,
{
    /// Creates a poller with a custom clock.
    #[must_use]
    pub fn with_clock(
        reader: R,
        clock: C,
        registry: Arc<MetricsRegistry>,
        poll_interval: Duration,
    ) -> Self {
        let mut interval = interval_at(Instant::now() + poll_interval, poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let (published, _) = watch::channel(None);

        Self {
            reader: Arc::new(reader),
            clock,
            registry,
            interval,
            read_timeout: default_read_timeout(poll_interval),
            watches: Vec::new(),
            previous: None,
            phase: Phase::Idle,
            published,
            in_flight: None,
        }
    }

    /// Sets how long a capture may run before the cycle is abandoned.
    #[must_use]
    pub const fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the IPv6 prefixes evaluated after each successful cycle.
    #[must_use]
    pub fn with_prefix_watches(mut self, watches: Vec<PrefixWatch>) -> Self {
        self.watches = watches;
        self
    }

    /// Installs a restored snapshot as the previous one.
    ///
    /// The registry's gauges are seeded from it (counters untouched) and it
    /// is published to subscribers.
    #[must_use]
    pub fn with_baseline(mut self, snapshot: Snapshot) -> Self {
        let snapshot = Arc::new(snapshot);
        self.registry.seed(&snapshot);
        self.published.send_replace(Some(Arc::clone(&snapshot)));
        self.previous = Some(snapshot);
        self
    }

    /// Returns a receiver for the last good snapshot (`None` before the first).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.published.subscribe()
    }

    /// Returns the current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the last good snapshot, if any.
    #[must_use]
    pub fn previous(&self) -> Option<&Snapshot> {
        self.previous.as_deref()
    }

    /// Returns the configured read timeout.
    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Returns how the interval handles ticks missed by a slow cycle.
    #[must_use]
    pub fn missed_tick_behavior(&self) -> MissedTickBehavior {
        self.interval.missed_tick_behavior()
    }

    /// Waits for the next tick, then runs one cycle.
    ///
    /// # Errors
    ///
    /// Returns the cycle's [`MonitorError`]; the poller stays usable.
    pub async fn next_cycle(&mut self) -> Result<CycleReport, MonitorError> {
        self.interval.tick().await;
        self.run_cycle().await
    }

    /// Runs one cycle immediately.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError`] if the capture fails or times out. The
    /// previous snapshot is left unchanged and the failure is recorded in
    /// the registry.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, MonitorError> {
        self.phase = Phase::Capturing;
        let current = match self.capture().await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                self.phase = Phase::Idle;
                self.registry.record_failure();
                tracing::warn!(
                    "Poll cycle at {} failed, keeping previous snapshot: {e}",
                    unix_seconds(self.clock.now())
                );
                return Err(e);
            }
        };

        self.phase = Phase::Diffing;
        let previous = self.previous.as_deref();
        let events = diff(previous, &current);
        let prefixes = observe(&self.watches, previous, &current);

        self.phase = Phase::Applying;
        for event in &events {
            tracing::info!("{event}");
        }
        for observation in prefixes.iter().filter(|o| o.changed) {
            match observation.current {
                Some(prefix) => tracing::info!("IPv6 prefix {} is now {prefix}", observation.watch),
                None => tracing::info!("IPv6 prefix {} is gone", observation.watch),
            }
        }

        let completed_at = self.clock.now();
        self.registry.apply_cycle(&events, &prefixes, completed_at);
        self.previous = Some(Arc::clone(&current));
        self.published.send_replace(Some(Arc::clone(&current)));
        self.phase = Phase::Idle;

        tracing::debug!(
            "Poll cycle complete: {} interfaces, {} events",
            current.len(),
            events.len()
        );

        Ok(CycleReport {
            snapshot: current,
            events: events.len(),
            completed_at,
        })
    }

    /// Runs the reader on the blocking pool under the read timeout.
    ///
    /// A timed-out read keeps running in the background and is parked in
    /// `in_flight`; until it returns, cycles fail without starting another
    /// read. Its late result is dropped.
    async fn capture(&mut self) -> Result<Snapshot, MonitorError> {
        if let Some(pending) = self.in_flight.take() {
            if !pending.is_finished() {
                self.in_flight = Some(pending);
                return Err(MonitorError::CaptureInFlight);
            }
        }

        let reader = Arc::clone(&self.reader);
        let mut task = tokio::task::spawn_blocking(move || reader.capture());

        match tokio::time::timeout(self.read_timeout, &mut task).await {
            Ok(Ok(result)) => Ok(result?),
            Ok(Err(join)) => Err(MonitorError::ReaderTask(join.to_string())),
            Err(_) => {
                self.in_flight = Some(task);
                Err(MonitorError::Timeout {
                    timeout: self.read_timeout,
                })
            }
        }
    }

    /// Returns true while a timed-out read is still running.
    #[must_use]
    pub fn capture_in_flight(&self) -> bool {
        self.in_flight.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl<R, C> std::fmt::Debug for Poller<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("read_timeout", &self.read_timeout)
            .field("watches", &self.watches)
            .field("phase", &self.phase)
            .field("has_previous", &self.previous.is_some())
            .field("capture_in_flight", &self.in_flight.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;
