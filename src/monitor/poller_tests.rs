//! Tests for the poll cycle.
//!
//! These run on real time: the reader executes on the blocking pool, which
//! does not cooperate with a paused clock's auto-advance.

use super::*;
use crate::monitor::{ChangeEvent, ChangeKind};
use crate::network::mock::{MockReader, platform_error};
use crate::network::{Interface, OperState, ReadError};
use crate::time::mock::ManualClock;
use std::sync::Mutex;
use std::time::{Instant as StdInstant, UNIX_EPOCH};

const INTERVAL: Duration = Duration::from_millis(50);

fn iface(name: &str, state: OperState, mtu: u32, addresses: &[&str]) -> Interface {
    addresses.iter().fold(Interface::new(name, state, mtu), |i, a| {
        i.with_address(a.parse().unwrap())
    })
}

fn snapshot(interfaces: Vec<Interface>) -> Snapshot {
    Snapshot::new(UNIX_EPOCH, interfaces)
}

fn eth0(state: OperState) -> Interface {
    iface("eth0", state, 1500, &["10.0.0.1/24"])
}

fn poller(reader: MockReader) -> (Poller<MockReader, ManualClock>, Arc<MetricsRegistry>) {
    let registry = Arc::new(MetricsRegistry::new().unwrap());
    let poller = Poller::with_clock(reader, ManualClock::new(1_000), Arc::clone(&registry), INTERVAL);
    (poller, registry)
}

/// Reader that blocks longer than any test timeout.
struct SlowReader(Duration);

impl SnapshotReader for SlowReader {
    fn capture(&self) -> Result<Snapshot, ReadError> {
        std::thread::sleep(self.0);
        Ok(Snapshot::empty(UNIX_EPOCH))
    }
}

/// Reader that records when each read starts, then blocks.
struct RecordingReader {
    delay: Duration,
    starts: Arc<Mutex<Vec<StdInstant>>>,
}

impl RecordingReader {
    fn new(delay: Duration) -> (Self, Arc<Mutex<Vec<StdInstant>>>) {
        let starts = Arc::new(Mutex::new(Vec::new()));
        let reader = Self {
            delay,
            starts: Arc::clone(&starts),
        };
        (reader, starts)
    }
}

impl SnapshotReader for RecordingReader {
    fn capture(&self) -> Result<Snapshot, ReadError> {
        self.starts.lock().unwrap().push(StdInstant::now());
        std::thread::sleep(self.delay);
        Ok(Snapshot::empty(UNIX_EPOCH))
    }
}

#[test]
fn default_read_timeout_is_half_interval_capped() {
    assert_eq!(
        default_read_timeout(Duration::from_secs(4)),
        Duration::from_secs(2)
    );
    assert_eq!(
        default_read_timeout(Duration::from_secs(60)),
        Duration::from_secs(5)
    );
}

#[test]
fn cycle_report_has_changes() {
    let report = CycleReport {
        snapshot: Arc::new(Snapshot::empty(UNIX_EPOCH)),
        events: 0,
        completed_at: UNIX_EPOCH,
    };
    assert!(!report.has_changes());
}

mod first_cycle {
    use super::*;

    #[tokio::test]
    async fn adds_every_interface_once() {
        let reader = MockReader::returning(vec![snapshot(vec![
            eth0(OperState::Up),
            iface("lo", OperState::Unknown, 65536, &["127.0.0.1/8"]),
        ])]);
        let (mut poller, registry) = poller(reader);

        let report = poller.run_cycle().await.unwrap();

        assert_eq!(report.events, 2);
        assert_eq!(poller.phase(), Phase::Idle);
        assert!(poller.previous().is_some());
        assert_eq!(
            registry.sample("netif_interface_added_total", &[("interface", "lo")]),
            Some(1.0)
        );
        assert_eq!(
            registry.sample("netif_polls_total", &[("outcome", "success")]),
            Some(1.0)
        );
        assert_eq!(
            registry.sample("netif_last_successful_poll_timestamp_seconds", &[]),
            Some(1_000.0)
        );
    }

    #[tokio::test]
    async fn publishes_snapshot_to_subscribers() {
        let reader = MockReader::returning(vec![snapshot(vec![eth0(OperState::Up)])]);
        let (mut poller, _) = poller(reader);
        let receiver = poller.subscribe();

        assert!(receiver.borrow().is_none());
        poller.run_cycle().await.unwrap();

        let published = receiver.borrow().clone().expect("published snapshot");
        assert!(published.contains("eth0"));
    }
}

mod steady_state {
    use super::*;

    #[tokio::test]
    async fn unchanged_snapshot_yields_no_events() {
        let s = snapshot(vec![eth0(OperState::Up)]);
        let reader = MockReader::returning(vec![s.clone(), s]);
        let (mut poller, _) = poller(reader);

        poller.run_cycle().await.unwrap();
        let report = poller.run_cycle().await.unwrap();

        assert!(!report.has_changes());
    }

    #[tokio::test]
    async fn state_change_updates_gauge_and_counter() {
        let reader = MockReader::returning(vec![
            snapshot(vec![eth0(OperState::Up)]),
            snapshot(vec![eth0(OperState::Down)]),
        ]);
        let (mut poller, registry) = poller(reader);

        poller.run_cycle().await.unwrap();
        let report = poller.run_cycle().await.unwrap();

        assert_eq!(report.events, 1);
        assert_eq!(
            registry.sample("netif_interface_oper_state", &[("interface", "eth0")]),
            Some(0.0)
        );
        assert_eq!(
            registry.sample("netif_state_changes_total", &[("interface", "eth0")]),
            Some(1.0)
        );
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn failure_keeps_previous_and_counts() {
        let reader = MockReader::new(vec![
            Ok(snapshot(vec![eth0(OperState::Up)])),
            Err(platform_error("netlink busy")),
        ]);
        let (mut poller, registry) = poller(reader);

        poller.run_cycle().await.unwrap();
        let error = poller.run_cycle().await.unwrap_err();

        assert!(matches!(error, MonitorError::Read(_)));
        assert_eq!(poller.phase(), Phase::Idle);
        assert!(poller.previous().unwrap().contains("eth0"));
        assert_eq!(
            registry.sample("netif_poll_consecutive_failures", &[]),
            Some(1.0)
        );
        assert_eq!(
            registry.sample("netif_polls_total", &[("outcome", "failure")]),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn success_after_failure_diffs_against_last_good() {
        // N-1: up/1500/10.0.0.1; N: fails; N+1: down/9000/10.0.0.2
        let reader = MockReader::new(vec![
            Ok(snapshot(vec![eth0(OperState::Up)])),
            Err(platform_error("transient")),
            Ok(snapshot(vec![iface(
                "eth0",
                OperState::Down,
                9000,
                &["10.0.0.2/24"],
            )])),
        ]);
        let (mut poller, registry) = poller(reader);
        let expected = diff(
            Some(&snapshot(vec![eth0(OperState::Up)])),
            &snapshot(vec![iface("eth0", OperState::Down, 9000, &["10.0.0.2/24"])]),
        );

        poller.run_cycle().await.unwrap();
        assert!(poller.run_cycle().await.is_err());
        let report = poller.run_cycle().await.unwrap();

        assert_eq!(report.events, expected.len());
        assert_eq!(
            registry.sample("netif_poll_consecutive_failures", &[]),
            Some(0.0)
        );
        assert_eq!(
            registry.sample("netif_mtu_changes_total", &[("interface", "eth0")]),
            Some(1.0)
        );
        assert_eq!(
            registry.sample(
                "netif_address_removed_total",
                &[("interface", "eth0"), ("ip_version", "4")]
            ),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn failure_before_first_success_leaves_no_previous() {
        let reader = MockReader::new(vec![
            Err(platform_error("boom")),
            Ok(snapshot(vec![eth0(OperState::Up)])),
        ]);
        let (mut poller, _) = poller(reader);

        assert!(poller.run_cycle().await.is_err());
        assert!(poller.previous().is_none());

        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.events, 1);
    }

    #[tokio::test]
    async fn slow_reader_times_out() {
        let registry = Arc::new(MetricsRegistry::new().unwrap());
        let mut poller = Poller::new(
            SlowReader(Duration::from_millis(300)),
            Arc::clone(&registry),
            Duration::from_secs(1),
        )
        .with_read_timeout(Duration::from_millis(50));

        let error = poller.run_cycle().await.unwrap_err();

        assert!(matches!(error, MonitorError::Timeout { .. }));
        assert!(poller.previous().is_none());
        assert_eq!(
            registry.sample("netif_poll_consecutive_failures", &[]),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn hung_read_is_not_restarted_until_it_returns() {
        let registry = Arc::new(MetricsRegistry::new().unwrap());
        let (reader, starts) = RecordingReader::new(Duration::from_millis(400));
        let mut poller = Poller::new(reader, Arc::clone(&registry), Duration::from_secs(1))
            .with_read_timeout(Duration::from_millis(50));

        let first = poller.run_cycle().await.unwrap_err();
        assert!(matches!(first, MonitorError::Timeout { .. }));
        for _ in 0..4 {
            let error = poller.run_cycle().await.unwrap_err();
            assert!(matches!(error, MonitorError::CaptureInFlight));
        }

        assert_eq!(starts.lock().unwrap().len(), 1);
        assert!(poller.capture_in_flight());
        assert_eq!(
            registry.sample("netif_poll_consecutive_failures", &[]),
            Some(5.0)
        );

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!poller.capture_in_flight());

        // The stale result is dropped and a fresh read starts.
        let _ = poller.run_cycle().await;
        assert_eq!(starts.lock().unwrap().len(), 2);
    }
}

mod baseline {
    use super::*;

    #[tokio::test]
    async fn baseline_seeds_gauges_and_limits_first_diff() {
        let reader = MockReader::returning(vec![snapshot(vec![
            eth0(OperState::Down),
            iface("wlan0", OperState::Up, 1500, &[]),
        ])]);
        let (poller, registry) = poller(reader);
        let mut poller = poller.with_baseline(snapshot(vec![eth0(OperState::Up)]));

        assert_eq!(
            registry.sample("netif_interface_oper_state", &[("interface", "eth0")]),
            Some(1.0)
        );
        assert!(poller.subscribe().borrow().is_some());

        let report = poller.run_cycle().await.unwrap();

        assert_eq!(report.events, 2);
        assert_eq!(
            registry.sample("netif_interface_added_total", &[("interface", "eth0")]),
            None
        );
        assert_eq!(
            registry.sample("netif_interface_added_total", &[("interface", "wlan0")]),
            Some(1.0)
        );
    }
}

mod prefix_watches {
    use super::*;

    #[tokio::test]
    async fn prefix_change_sets_changed_gauge() {
        let reader = MockReader::returning(vec![
            snapshot(vec![iface("eth0", OperState::Up, 1500, &["2001:db8:0:100::1/64"])]),
            snapshot(vec![iface("eth0", OperState::Up, 1500, &["2001:db8:0:200::1/64"])]),
        ]);
        let (poller, registry) = poller(reader);
        let mut poller = poller.with_prefix_watches(vec!["eth0/56".parse().unwrap()]);
        let labels = [("interface", "eth0"), ("prefix_length", "56")];

        poller.run_cycle().await.unwrap();
        assert_eq!(registry.sample("netif_ipv6_prefix_changed", &labels), Some(0.0));

        poller.run_cycle().await.unwrap();
        assert_eq!(registry.sample("netif_ipv6_prefix_changed", &labels), Some(1.0));
    }
}

mod scheduling {
    use super::*;

    #[tokio::test]
    async fn missed_ticks_are_skipped() {
        let (poller, _) = poller(MockReader::returning(vec![]));
        assert_eq!(poller.missed_tick_behavior(), MissedTickBehavior::Skip);
    }

    #[tokio::test]
    async fn slow_cycles_wait_for_next_aligned_tick() {
        // Each read overruns the interval, so one tick is missed per cycle.
        let period = Duration::from_millis(100);
        let (reader, starts) = RecordingReader::new(Duration::from_millis(130));
        let registry = Arc::new(MetricsRegistry::new().unwrap());
        let mut poller =
            Poller::new(reader, registry, period).with_read_timeout(Duration::from_millis(400));

        for _ in 0..3 {
            poller.next_cycle().await.unwrap();
        }

        let starts = starts.lock().unwrap();
        assert_eq!(starts.len(), 3);
        for pair in starts.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(
                gap >= Duration::from_millis(180),
                "missed tick fired back to back after {gap:?}"
            );
        }
    }

    #[tokio::test]
    async fn next_cycle_waits_for_tick() {
        let reader = MockReader::returning(vec![snapshot(vec![eth0(OperState::Up)])]);
        let (mut poller, _) = poller(reader);

        let started = std::time::Instant::now();
        let report = poller.next_cycle().await.unwrap();

        assert!(started.elapsed() >= INTERVAL - Duration::from_millis(5));
        assert_eq!(report.events, 1);
    }

    #[tokio::test]
    async fn events_match_diff_kinds() {
        let reader = MockReader::returning(vec![
            snapshot(vec![eth0(OperState::Up)]),
            snapshot(vec![]),
        ]);
        let (mut poller, _) = poller(reader);

        poller.run_cycle().await.unwrap();
        let previous = poller.previous().cloned().unwrap();
        let report = poller.run_cycle().await.unwrap();

        let events = diff(Some(&previous), &report.snapshot);
        assert_eq!(events.len(), report.events);
        assert!(matches!(&events[0], ChangeEvent::InterfaceRemoved(i) if i.name == "eth0"));
        assert_eq!(events[0].kind(), ChangeKind::InterfaceRemoved);
    }
}
