// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The reporting loop: fetches state from a tracker, diffs it against what
//! was last reported, and hands the result to a caller-supplied sink.
//!
//! `Reporter` owns the "old state" half of the delta computation in
//! [`crate::delta`]. It is deliberately not `Sync`: nothing about its
//! retained maps is locked, because the contract is that exactly one thread
//! calls [`Reporter::tick`] for a given tracker. Running two reporters
//! concurrently against the same tracker is a logic bug this type does not
//! try to prevent at the type level beyond refusing to be shared.

use std::cell::Cell;
use std::collections::HashMap;
use std::marker::PhantomData;

use log::debug;

use crate::connection::{ContainerEndpoint, Connection};
use crate::delta::{compute_delta, update_old_state, DeltaKind};
use crate::status::ConnStatus;
use crate::tracker::ConnectionTracker;

/// Where a tick's computed deltas go. Implementations decide how to
/// serialize and transmit a change; this crate has no wire format of its
/// own to offer.
pub trait DeltaSink {
    fn connection_changed(&mut self, conn: &Connection, status: ConnStatus, kind: DeltaKind);
    fn endpoint_changed(&mut self, endpoint: &ContainerEndpoint, status: ConnStatus, kind: DeltaKind);
}

/// Retains the previous tick's snapshot and turns tracker state into a
/// stream of open/update/close events over time.
///
/// Not `Sync`: a `Reporter` is meant to live on the one thread that drives
/// the reporting cadence, separate from the producer thread(s) feeding the
/// tracker.
pub struct Reporter {
    old_conn_state: HashMap<Connection, ConnStatus>,
    old_endpoint_state: HashMap<ContainerEndpoint, ConnStatus>,
    old_now: i64,
    _not_sync: PhantomData<Cell<()>>,
}

impl Default for Reporter {
    fn default() -> Self {
        Reporter {
            old_conn_state: HashMap::new(),
            old_endpoint_state: HashMap::new(),
            old_now: 0,
            _not_sync: PhantomData,
        }
    }
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch normalized, non-evicting state from `tracker`, diff it against
    /// what the last call retained, push every change to `sink`, and roll
    /// the retained state forward to `now`.
    pub fn tick(&mut self, tracker: &ConnectionTracker, now: i64, sink: &mut impl DeltaSink) {
        let afterglow = tracker.afterglow_period_micros();

        let new_conn_state = tracker.fetch_conn_state(true, false);
        let conn_delta = compute_delta(&new_conn_state, &self.old_conn_state, now, self.old_now, afterglow);
        for (conn, status, kind) in &conn_delta {
            sink.connection_changed(conn, *status, *kind);
        }
        update_old_state(&mut self.old_conn_state, &new_conn_state, now, afterglow);

        let new_endpoint_state = tracker.fetch_endpoint_state(true, false);
        let endpoint_delta = compute_delta(
            &new_endpoint_state,
            &self.old_endpoint_state,
            now,
            self.old_now,
            afterglow,
        );
        for (endpoint, status, kind) in &endpoint_delta {
            sink.endpoint_changed(endpoint, *status, *kind);
        }
        update_old_state(&mut self.old_endpoint_state, &new_endpoint_state, now, afterglow);

        debug!(
            target: "conntrack",
            "tick at t={now}: {} connection deltas, {} endpoint deltas",
            conn_delta.len(),
            endpoint_delta.len()
        );
        self.old_now = now;
    }
}
