//! Tests for snapshot diffing.

use super::*;
use std::time::{Duration, SystemTime};

fn addr(s: &str) -> InterfaceAddress {
    s.parse().unwrap()
}

fn iface(name: &str, state: OperState, mtu: u32, addresses: &[&str]) -> Interface {
    addresses
        .iter()
        .fold(Interface::new(name, state, mtu), |i, a| i.with_address(addr(a)))
}

fn snapshot_at(secs: u64, interfaces: Vec<Interface>) -> Snapshot {
    Snapshot::new(SystemTime::UNIX_EPOCH + Duration::from_secs(secs), interfaces)
}

fn snapshot(interfaces: Vec<Interface>) -> Snapshot {
    snapshot_at(0, interfaces)
}

fn eth0_up() -> Interface {
    iface("eth0", OperState::Up, 1500, &["10.0.0.1/24"])
}

mod change_event {
    use super::*;

    #[test]
    fn interface_accessor_covers_all_variants() {
        let events = vec![
            ChangeEvent::InterfaceAdded(eth0_up()),
            ChangeEvent::InterfaceRemoved(eth0_up()),
            ChangeEvent::AddressAdded {
                interface: "eth0".into(),
                address: addr("10.0.0.2/24"),
            },
            ChangeEvent::AddressRemoved {
                interface: "eth0".into(),
                address: addr("10.0.0.2/24"),
            },
            ChangeEvent::StateChanged {
                interface: "eth0".into(),
                old: OperState::Up,
                new: OperState::Down,
            },
            ChangeEvent::MtuChanged {
                interface: "eth0".into(),
                old: 1500,
                new: 9000,
            },
        ];

        for event in &events {
            assert_eq!(event.interface(), "eth0");
        }
    }

    #[test]
    fn address_only_for_address_events() {
        let added = ChangeEvent::AddressAdded {
            interface: "eth0".into(),
            address: addr("10.0.0.2/24"),
        };
        assert_eq!(added.address(), Some(&addr("10.0.0.2/24")));
        assert_eq!(ChangeEvent::InterfaceAdded(eth0_up()).address(), None);
    }

    #[test]
    fn display_is_human_readable() {
        let event = ChangeEvent::StateChanged {
            interface: "eth0".into(),
            old: OperState::Up,
            new: OperState::Down,
        };
        assert_eq!(event.to_string(), "eth0 state up -> down");

        let event = ChangeEvent::AddressRemoved {
            interface: "eth0".into(),
            address: addr("10.0.0.1/24"),
        };
        assert_eq!(event.to_string(), "address 10.0.0.1/24 removed from eth0");
    }

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(ChangeKind::InterfaceAdded.as_str(), "interface_added");
        assert_eq!(ChangeKind::MtuChanged.to_string(), "mtu_changed");
    }
}

mod first_cycle {
    use super::*;

    #[test]
    fn one_added_event_per_interface() {
        let current = snapshot(vec![
            iface("wlan0", OperState::Down, 1500, &[]),
            iface("eth0", OperState::Up, 1500, &["10.0.0.1/24", "2001:db8::1/64"]),
        ]);

        let events = diff(None, &current);

        assert_eq!(events.len(), 2);
        assert!(
            events
                .iter()
                .all(|e| e.kind() == ChangeKind::InterfaceAdded)
        );
        let names: Vec<_> = events.iter().map(ChangeEvent::interface).collect();
        assert_eq!(names, vec!["eth0", "wlan0"]);
    }

    #[test]
    fn empty_current_yields_nothing() {
        assert!(diff(None, &snapshot(vec![])).is_empty());
    }
}

mod unchanged {
    use super::*;

    #[test]
    fn identical_snapshots_yield_nothing() {
        let s = snapshot(vec![eth0_up(), iface("lo", OperState::Unknown, 65536, &["127.0.0.1/8"])]);
        assert!(diff(Some(&s), &s).is_empty());
    }

    #[test]
    fn timestamp_alone_is_not_a_change() {
        let previous = snapshot_at(0, vec![eth0_up()]);
        let current = snapshot_at(15, vec![eth0_up()]);
        assert!(diff(Some(&previous), &current).is_empty());
    }
}

mod interfaces {
    use super::*;

    #[test]
    fn removed_interface_yields_single_event() {
        let previous = snapshot(vec![eth0_up()]);
        let current = snapshot(vec![]);

        let events = diff(Some(&previous), &current);

        assert_eq!(events, vec![ChangeEvent::InterfaceRemoved(eth0_up())]);
    }

    #[test]
    fn added_interface_has_no_address_events() {
        let previous = snapshot(vec![]);
        let current = snapshot(vec![eth0_up()]);

        let events = diff(Some(&previous), &current);

        assert_eq!(events, vec![ChangeEvent::InterfaceAdded(eth0_up())]);
    }

    #[test]
    fn remove_then_readd_across_polls() {
        let p1 = snapshot(vec![eth0_up()]);
        let p2 = snapshot(vec![]);
        let p3 = snapshot(vec![eth0_up()]);

        let mut events = diff(Some(&p1), &p2);
        events.extend(diff(Some(&p2), &p3));

        let kinds: Vec<_> = events.iter().map(ChangeEvent::kind).collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::InterfaceRemoved, ChangeKind::InterfaceAdded]
        );
    }
}

mod per_interface {
    use super::*;

    #[test]
    fn state_change_only() {
        let previous = snapshot(vec![eth0_up()]);
        let current = snapshot(vec![iface("eth0", OperState::Down, 1500, &["10.0.0.1/24"])]);

        let events = diff(Some(&previous), &current);

        assert_eq!(
            events,
            vec![ChangeEvent::StateChanged {
                interface: "eth0".into(),
                old: OperState::Up,
                new: OperState::Down,
            }]
        );
    }

    #[test]
    fn mtu_change() {
        let previous = snapshot(vec![eth0_up()]);
        let current = snapshot(vec![iface("eth0", OperState::Up, 9000, &["10.0.0.1/24"])]);

        let events = diff(Some(&previous), &current);

        assert_eq!(
            events,
            vec![ChangeEvent::MtuChanged {
                interface: "eth0".into(),
                old: 1500,
                new: 9000,
            }]
        );
    }

    #[test]
    fn prefix_change_is_remove_plus_add() {
        let previous = snapshot(vec![eth0_up()]);
        let current = snapshot(vec![iface("eth0", OperState::Up, 1500, &["10.0.0.1/16"])]);

        let events = diff(Some(&previous), &current);

        assert_eq!(
            events,
            vec![
                ChangeEvent::AddressRemoved {
                    interface: "eth0".into(),
                    address: addr("10.0.0.1/24"),
                },
                ChangeEvent::AddressAdded {
                    interface: "eth0".into(),
                    address: addr("10.0.0.1/16"),
                },
            ]
        );
    }

    #[test]
    fn addresses_are_ordered_within_kind() {
        let previous = snapshot(vec![iface(
            "eth0",
            OperState::Up,
            1500,
            &["10.0.0.9/24", "10.0.0.3/24"],
        )]);
        let current = snapshot(vec![iface(
            "eth0",
            OperState::Up,
            1500,
            &["2001:db8::1/64", "10.0.0.5/24"],
        )]);

        let events = diff(Some(&previous), &current);

        let rendered: Vec<_> = events
            .iter()
            .map(|e| (e.kind(), e.address().unwrap().to_string()))
            .collect();
        assert_eq!(
            rendered,
            vec![
                (ChangeKind::AddressRemoved, "10.0.0.3/24".to_string()),
                (ChangeKind::AddressRemoved, "10.0.0.9/24".to_string()),
                (ChangeKind::AddressAdded, "10.0.0.5/24".to_string()),
                (ChangeKind::AddressAdded, "2001:db8::1/64".to_string()),
            ]
        );
    }
}

mod ordering {
    use super::*;

    #[test]
    fn removed_then_added_then_common_by_name() {
        let previous = snapshot(vec![
            iface("zz0", OperState::Up, 1500, &[]),
            iface("eth1", OperState::Up, 1500, &["10.1.0.1/24"]),
            iface("eth0", OperState::Up, 1500, &["10.0.0.1/24"]),
            iface("aa0", OperState::Up, 1500, &[]),
        ]);
        let current = snapshot(vec![
            iface("eth1", OperState::Down, 1400, &["10.1.0.2/24"]),
            iface("eth0", OperState::Up, 1500, &[]),
            iface("wlan0", OperState::Up, 1500, &[]),
            iface("bb0", OperState::Up, 1500, &[]),
        ]);

        let events = diff(Some(&previous), &current);

        let summary: Vec<_> = events
            .iter()
            .map(|e| (e.kind(), e.interface().to_string()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ChangeKind::InterfaceRemoved, "aa0".to_string()),
                (ChangeKind::InterfaceRemoved, "zz0".to_string()),
                (ChangeKind::InterfaceAdded, "bb0".to_string()),
                (ChangeKind::InterfaceAdded, "wlan0".to_string()),
                (ChangeKind::AddressRemoved, "eth0".to_string()),
                (ChangeKind::StateChanged, "eth1".to_string()),
                (ChangeKind::MtuChanged, "eth1".to_string()),
                (ChangeKind::AddressRemoved, "eth1".to_string()),
                (ChangeKind::AddressAdded, "eth1".to_string()),
            ]
        );
    }

    #[test]
    fn diff_is_deterministic() {
        let previous = snapshot(vec![eth0_up(), iface("b", OperState::Up, 1, &[])]);
        let current = snapshot(vec![iface("a", OperState::Up, 1, &[]), iface("eth0", OperState::Down, 1, &[])]);

        assert_eq!(
            diff(Some(&previous), &current),
            diff(Some(&previous), &current)
        );
    }
}

mod coalescing {
    use super::*;

    #[test]
    fn skipped_snapshot_coalesces_into_single_diff() {
        // N-1 good, N failed (never observed), N+1 good.
        let before = snapshot(vec![eth0_up()]);
        let after = snapshot(vec![iface("eth0", OperState::Down, 9000, &["10.0.0.2/24"])]);

        let events = diff(Some(&before), &after);

        let kinds: Vec<_> = events.iter().map(ChangeEvent::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChangeKind::StateChanged,
                ChangeKind::MtuChanged,
                ChangeKind::AddressRemoved,
                ChangeKind::AddressAdded,
            ]
        );
    }
}
