// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end scenarios against the public API: a tracker fed through
//! `add`/`remove`/`update`, diffed tick by tick through a `Reporter`.

use std::net::Ipv4Addr;

use conntrack_core::address::{Endpoint, Family, IPNet, L4Proto, L4ProtoPortPair};
use conntrack_core::connection::{Connection, Role};
use conntrack_core::delta::DeltaKind;
use conntrack_core::reporter::{DeltaSink, Reporter};
use conntrack_core::tracker::ConnectionTracker;

const AFTERGLOW: i64 = 1_000_000;

#[derive(Default)]
struct RecordingSink {
    conn_events: Vec<(Connection, bool, DeltaKind)>,
}

impl DeltaSink for RecordingSink {
    fn connection_changed(
        &mut self,
        conn: &Connection,
        status: conntrack_core::ConnStatus,
        kind: DeltaKind,
    ) {
        self.conn_events.push((conn.clone(), status.is_active(), kind));
    }

    fn endpoint_changed(
        &mut self,
        _endpoint: &conntrack_core::ContainerEndpoint,
        _status: conntrack_core::ConnStatus,
        _kind: DeltaKind,
    ) {
    }
}

fn v4(a: u8, b: u8, c: u8, d: u8) -> conntrack_core::Address {
    Ipv4Addr::new(a, b, c, d).into()
}

fn conn(container: &str, remote_port: u16) -> Connection {
    Connection::new(
        container,
        Endpoint::new(v4(10, 0, 0, 5), 51000),
        Endpoint::new(v4(8, 8, 8, 8), remote_port),
        L4Proto::Tcp,
        Role::Client,
    )
}

fn tracker_with_afterglow(afterglow_micros: i64) -> ConnectionTracker {
    let tracker = ConnectionTracker::new();
    let cfg = conntrack_core::TrackerConfig {
        afterglow_period_micros: afterglow_micros,
        ..Default::default()
    };
    tracker.apply_config(cfg).unwrap();
    tracker
}

#[test]
fn s1_new_connection_is_opened() {
    let tracker = tracker_with_afterglow(AFTERGLOW);
    let c = conn("C", 443);
    tracker.add_connection(c.clone(), 100).unwrap();

    let mut reporter = Reporter::new();
    let mut sink = RecordingSink::default();
    reporter.tick(&tracker, 200, &mut sink);

    assert_eq!(sink.conn_events.len(), 1);
    assert_eq!(sink.conn_events[0], (c, true, DeltaKind::Opened));
}

#[test]
fn s2_flap_suppression_reports_only_final_state() {
    let tracker = tracker_with_afterglow(AFTERGLOW);
    let c = conn("C", 443);
    tracker.add_connection(c.clone(), 0).unwrap();
    tracker.remove_connection(c.clone(), 10).unwrap();
    tracker.add_connection(c.clone(), 20).unwrap();
    tracker.remove_connection(c.clone(), 30).unwrap();

    let mut reporter = Reporter::new();
    let mut sink = RecordingSink::default();
    reporter.tick(&tracker, 100, &mut sink);

    // Flap settles on inactive at t=30, but still within afterglow of t=100,
    // so the first tick reports a single observation, not a flood of events.
    assert_eq!(sink.conn_events.len(), 1);
    assert_eq!(sink.conn_events[0], (c, false, DeltaKind::Opened));

    sink.conn_events.clear();
    reporter.tick(&tracker, 200, &mut sink);
    assert!(sink.conn_events.is_empty());
}

#[test]
fn s3_afterglow_gates_the_close_after_a_batch_demotion() {
    let tracker = tracker_with_afterglow(AFTERGLOW);
    let c = conn("C", 443);
    tracker.add_connection(c.clone(), 0).unwrap();

    let mut reporter = Reporter::new();
    let mut sink = RecordingSink::default();
    reporter.tick(&tracker, 500, &mut sink);
    assert_eq!(sink.conn_events, vec![(c.clone(), true, DeltaKind::Opened)]);

    // Nothing re-affirms C; a probe rescan that no longer sees it demotes it.
    tracker.update(&[], &[], 500).unwrap();

    sink.conn_events.clear();
    reporter.tick(&tracker, 500_000, &mut sink);
    assert!(sink.conn_events.is_empty(), "still within afterglow");

    sink.conn_events.clear();
    reporter.tick(&tracker, 1_000_001, &mut sink);
    assert_eq!(sink.conn_events, vec![(c, false, DeltaKind::Closed)]);
}

#[test]
fn s4_server_role_collapses_local_identity() {
    let tracker = tracker_with_afterglow(AFTERGLOW);
    tracker
        .update_known_ip_networks(vec![IPNet::new(v4(10, 0, 0, 0), 8).unwrap()])
        .unwrap();

    let server_conn = Connection::new(
        "X",
        Endpoint::new(v4(10, 0, 0, 5), 443),
        Endpoint::new(v4(8, 8, 8, 8), 54321),
        L4Proto::Tcp,
        Role::Server,
    );
    tracker.add_connection(server_conn, 0).unwrap();

    let snapshot = tracker.fetch_conn_state(true, false);
    assert_eq!(snapshot.len(), 1);
    let (key, _) = snapshot.iter().next().unwrap();
    assert_eq!(key.local().address(), conntrack_core::Address::zero(Family::V4));
    assert_eq!(key.local().port(), 443);
    assert_eq!(key.remote().address(), IPNet::public_sentinel(Family::V4).address());
}

#[test]
fn s5_ignored_pair_is_silently_dropped() {
    let tracker = tracker_with_afterglow(AFTERGLOW);
    tracker.update_ignored_l4proto_port_pairs(std::collections::HashSet::from([
        L4ProtoPortPair::new(L4Proto::Udp, 53),
    ]));

    let dns = Connection::new(
        "A",
        Endpoint::new(v4(10, 0, 0, 5), 1234),
        Endpoint::new(v4(8, 8, 8, 8), 53),
        L4Proto::Udp,
        Role::Client,
    );
    tracker.add_connection(dns, 0).unwrap();

    assert!(tracker.fetch_conn_state(false, false).is_empty());
}

#[test]
fn s6_batch_demote_affects_only_absent_entries() {
    let tracker = tracker_with_afterglow(AFTERGLOW);
    let a = conn("A", 443);
    let b = conn("B", 8080);
    tracker.add_connection(a.clone(), 1000).unwrap();
    tracker.add_connection(b.clone(), 1000).unwrap();

    tracker.update(&[a.clone()], &[], 2000).unwrap();

    let state = tracker.fetch_conn_state(false, false);
    assert!(state[&a].is_active());
    assert_eq!(state[&a].last_active_time(), 2000);
    assert!(!state[&b].is_active());
    assert_eq!(state[&b].last_active_time(), 1000);
}

#[test]
fn delta_idempotence_across_repeated_ticks_with_no_change() {
    let tracker = tracker_with_afterglow(AFTERGLOW);
    tracker.add_connection(conn("A", 443), 0).unwrap();

    let mut reporter = Reporter::new();
    let mut sink = RecordingSink::default();
    reporter.tick(&tracker, 0, &mut sink);
    let first_len = sink.conn_events.len();
    assert_eq!(first_len, 1);

    sink.conn_events.clear();
    for t in [10, 20, 30, 40] {
        reporter.tick(&tracker, t, &mut sink);
    }
    assert!(sink.conn_events.is_empty(), "a stable connection must not re-fire");
}

#[test]
fn continuously_reaffirmed_connection_produces_no_steady_state_churn() {
    // The realistic steady-state case: a probe calls `update()` every cycle,
    // re-affirming the same connection as active with an ever-advancing
    // timestamp. This must never read as repeated `Updated` events — that
    // would defeat the entire point of the afterglow/delta design.
    let tracker = tracker_with_afterglow(AFTERGLOW);
    let a = conn("A", 443);

    tracker.update(&[a.clone()], &[], 0).unwrap();

    let mut reporter = Reporter::new();
    let mut sink = RecordingSink::default();
    reporter.tick(&tracker, 0, &mut sink);
    assert_eq!(sink.conn_events, vec![(a.clone(), true, DeltaKind::Opened)]);

    sink.conn_events.clear();
    for t in (100..=1000).step_by(100) {
        tracker.update(&[a.clone()], &[], t).unwrap();
        reporter.tick(&tracker, t, &mut sink);
    }
    assert!(
        sink.conn_events.is_empty(),
        "a connection re-affirmed active every cycle must not churn"
    );
}

#[test]
fn no_flap_across_rapid_add_remove_within_afterglow() {
    let tracker = tracker_with_afterglow(AFTERGLOW);
    let c = conn("C", 443);

    for t in (0..500).step_by(50) {
        let added = (t / 50) % 2 == 0;
        tracker.update_connection(c.clone(), t, added).unwrap();
    }

    let mut reporter = Reporter::new();
    let mut sink = RecordingSink::default();
    reporter.tick(&tracker, 600, &mut sink);

    assert_eq!(sink.conn_events.len(), 1, "flapping must collapse to one report");
}

#[test]
fn concurrent_producer_and_reporter_threads_do_not_deadlock_or_panic() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    let tracker = Arc::new(tracker_with_afterglow(50_000));
    let running = Arc::new(AtomicBool::new(true));

    let producer = {
        let tracker = tracker.clone();
        let running = running.clone();
        thread::spawn(move || {
            let mut t = 0i64;
            while running.load(Ordering::Relaxed) {
                for i in 0u16..50 {
                    let c = conn("P", 1000 + i);
                    let active = (i64::from(i) + t) % 3 != 0;
                    tracker.update_connection(c, t, active).unwrap();
                }
                t += 1;
            }
        })
    };

    let reporter_thread = {
        let tracker = tracker.clone();
        let running = running.clone();
        thread::spawn(move || {
            let mut reporter = Reporter::new();
            let mut sink = RecordingSink::default();
            let mut now = 0i64;
            for _ in 0..200 {
                reporter.tick(&tracker, now, &mut sink);
                now += 10;
            }
            running.store(false, Ordering::Relaxed);
        })
    };

    reporter_thread.join().unwrap();
    producer.join().unwrap();
}
