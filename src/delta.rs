// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Afterglow-aware delta computation.
//!
//! These are pure functions over two point-in-time snapshots: the state the
//! previous tick reported (`old_state`, taken at `old_now`) and a freshly
//! fetched snapshot (`new_state`, taken at `now`). They never touch a
//! [`crate::tracker::ConnectionTracker`] directly, which is what makes them
//! safe to reason about and test in isolation from locking.
//!
//! The afterglow window exists because the probe's batch `update` cycle
//! demotes everything to inactive before re-affirming what's still present;
//! without tolerance, a connection that happens to fall silent for one
//! sampling interval would flap open/closed in the reported delta. An entry
//! that went inactive less than `afterglow_micros` ago is treated as if it
//! were still active for the purpose of deciding whether to report a close.

use std::collections::HashMap;
use std::hash::Hash;

use log::trace;

use crate::status::ConnStatus;

/// True if `status` was active, or went inactive recently enough that it is
/// still within the afterglow window measured from `now`.
pub fn recently_active(status: ConnStatus, now: i64, afterglow_micros: i64) -> bool {
    status.is_active() || in_afterglow(status, now, afterglow_micros)
}

/// True if `status` is inactive but its last-active time is still within the
/// afterglow window measured from `now`. Does not evaluate active statuses;
/// see [`recently_active`] for the combined check.
pub fn in_afterglow(status: ConnStatus, now: i64, afterglow_micros: i64) -> bool {
    !status.is_active() && now.saturating_sub(status.last_active_time()) < afterglow_micros
}

/// True if `afterglow_micros` worth of wall-clock time has passed since
/// `status` was last actually observed, independent of its active flag.
///
/// Used only to decide whether a *frozen* status carried over from a
/// previous tick has gone stale by the current tick's `now` — unlike
/// [`recently_active`], this does not treat an active flag as permanently
/// current, since a frozen status's flag only describes truth as of its own
/// timestamp, not as of whatever `now` it's later compared against.
fn afterglow_expired(status: ConnStatus, now: i64, afterglow_micros: i64) -> bool {
    now.saturating_sub(status.last_active_time()) >= afterglow_micros
}

/// One entry of a computed delta: what changed since the last tick, keyed
/// the same way the snapshot maps are.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaKind {
    /// Newly observed, or re-activated after being reported closed.
    Opened,
    /// Still active (or within afterglow); timestamp advanced since the
    /// last report but no open/close transition happened.
    Updated,
    /// Was active (or within afterglow) as of `old_state`, and has now
    /// fallen silent long enough that the afterglow window has elapsed.
    Closed,
}

/// Compute what a consumer should be told changed between `old_state` (as of
/// `old_now`) and `new_state` (as of `now`).
///
/// Entries present in `new_state` are opened/updated; entries present only
/// in `old_state` that have fallen out of their afterglow window are closed.
/// An entry recently active in `old_state` but absent from `new_state` and
/// still within its afterglow window is omitted entirely: it is neither a
/// new open nor a close, since the tracker may yet re-affirm it next tick.
pub fn compute_delta<K>(
    new_state: &HashMap<K, ConnStatus>,
    old_state: &HashMap<K, ConnStatus>,
    now: i64,
    old_now: i64,
    afterglow_micros: i64,
) -> Vec<(K, ConnStatus, DeltaKind)>
where
    K: Eq + Hash + Clone,
{
    let mut delta = Vec::new();

    for (key, status) in new_state {
        let new_present = recently_active(*status, now, afterglow_micros);
        match old_state.get(key) {
            None => {
                if new_present {
                    delta.push((key.clone(), *status, DeltaKind::Opened));
                }
            }
            Some(old_status) => {
                let old_present = recently_active(*old_status, old_now, afterglow_micros);
                if new_present && !old_present {
                    delta.push((key.clone(), *status, DeltaKind::Opened));
                } else if !new_present && old_present {
                    trace!(target: "conntrack", "afterglow elapsed, reporting close");
                    delta.push((key.clone(), *status, DeltaKind::Closed));
                } else if !new_present
                    && !old_present
                    && status.last_active_time() > old_status.last_active_time()
                {
                    // Both sides are already stale (past afterglow), but the
                    // store's timestamp moved anyway — an explicit late
                    // observation of an already-closed entry. Downstream
                    // already considers this closed; just let it refresh the
                    // timestamp it's holding.
                    delta.push((key.clone(), *status, DeltaKind::Updated));
                }
            }
        }
    }

    // Entries the tracker has dropped out from under us entirely (e.g. a
    // concurrent eviction) rather than merely demoted to inactive.
    for (key, old_status) in old_state {
        if new_state.contains_key(key) {
            continue;
        }
        let old_present = recently_active(*old_status, old_now, afterglow_micros);
        if old_present && afterglow_expired(*old_status, now, afterglow_micros) {
            trace!(target: "conntrack", "tracked entry vanished past afterglow, reporting close");
            delta.push((key.clone(), *old_status, DeltaKind::Closed));
        }
    }

    delta
}

/// Reconcile the retained `old_state` against a freshly fetched `new_state`,
/// producing what the next tick should retain as `old_state`.
///
/// Entries no longer within their afterglow window as of `now` are dropped
/// first; every entry in `new_state` then overwrites whatever `old_state`
/// held for that key, since `old_state` must mirror exactly what the last
/// tick observed, not an accumulated maximum across ticks — the next call
/// to [`compute_delta`] depends on seeing the raw prior observation, not a
/// merge artifact that could mask a demotion.
pub fn update_old_state<K>(
    old_state: &mut HashMap<K, ConnStatus>,
    new_state: &HashMap<K, ConnStatus>,
    now: i64,
    afterglow_micros: i64,
) where
    K: Eq + Hash + Clone,
{
    old_state.retain(|_, status| recently_active(*status, now, afterglow_micros));

    for (key, status) in new_state {
        old_state.insert(key.clone(), *status);
    }
}
