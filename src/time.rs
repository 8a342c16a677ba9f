//! Wall-clock abstraction.
//!
//! Snapshots and exported timestamps read the time through [`Clock`] so tests
//! can pin `captured_at` instead of depending on the system clock.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock time.
///
/// # Example
///
/// ```
/// use netif_exporter::time::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// assert!(clock.now() >= std::time::SystemTime::UNIX_EPOCH);
/// ```
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> SystemTime;
}

/// Clock backed by [`SystemTime::now()`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Whole seconds since the Unix epoch; times before the epoch clamp to 0.
#[must_use]
pub fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    /// A clock that only moves when told to.
    #[derive(Debug)]
    pub struct ManualClock {
        secs: AtomicU64,
    }

    impl ManualClock {
        pub const fn new(initial_secs: u64) -> Self {
            Self {
                secs: AtomicU64::new(initial_secs),
            }
        }

        pub fn advance(&self, secs: u64) {
            self.secs.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> SystemTime {
            UNIX_EPOCH + Duration::from_secs(self.secs.load(Ordering::SeqCst))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::ManualClock;
    use super::*;
    use std::time::Duration;

    #[test]
    fn system_clock_returns_current_time() {
        let before = SystemTime::now();
        let result = SystemClock.now();
        let after = SystemTime::now();

        assert!(result >= before);
        assert!(result <= after);
    }

    #[test]
    fn manual_clock_advances_on_demand() {
        let clock = ManualClock::new(0);
        assert_eq!(clock.now(), UNIX_EPOCH);

        clock.advance(100);
        assert_eq!(clock.now(), UNIX_EPOCH + Duration::from_secs(100));
    }

    #[test]
    fn unix_seconds_truncates_subseconds() {
        let time = UNIX_EPOCH + Duration::from_millis(1_700_000_000_999);
        assert_eq!(unix_seconds(time), 1_700_000_000);
    }

    #[test]
    fn unix_seconds_clamps_pre_epoch() {
        let time = UNIX_EPOCH - Duration::from_secs(5);
        assert_eq!(unix_seconds(time), 0);
    }
}
