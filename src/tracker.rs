// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The connection tracker: a single mutex-guarded state store.
//!
//! `ConnectionTracker` is designed for one producer thread (the probe
//! reader) calling [`ConnectionTracker::add_connection`]/
//! [`ConnectionTracker::update`] at high frequency, and any number of
//! consumer/admin threads calling the `fetch_*` and `update_*`/`apply_config`
//! methods at low frequency. Every public method acquires the internal lock
//! at entry and releases it at return; no method blocks or yields while
//! holding it.

use std::collections::{HashMap, HashSet};

use log::{debug, trace, warn};
use parking_lot::Mutex;

use crate::address::{Address, Family, IPNet, L4ProtoPortPair};
use crate::config::TrackerConfig;
use crate::connection::{ContainerEndpoint, Connection};
use crate::error::Result;
use crate::normalize::Normalizer;
use crate::radix::RadixTree;
use crate::status::ConnStatus;

/// Snapshot of tracked connection state.
pub type ConnMap = HashMap<Connection, ConnStatus>;
/// Snapshot of tracked listen-endpoint state.
pub type ContainerEndpointMap = HashMap<ContainerEndpoint, ConnStatus>;

struct Inner {
    conn_state: ConnMap,
    endpoint_state: ContainerEndpointMap,
    known_public_ips: HashSet<Address>,
    known_ip_networks: RadixTree,
    ignored_l4proto_port_pairs: HashSet<L4ProtoPortPair>,
    afterglow_period_micros: i64,
}

impl Default for Inner {
    fn default() -> Self {
        Inner {
            conn_state: HashMap::new(),
            endpoint_state: HashMap::new(),
            known_public_ips: HashSet::new(),
            known_ip_networks: RadixTree::new(),
            ignored_l4proto_port_pairs: HashSet::new(),
            afterglow_period_micros: crate::config::DEFAULT_AFTERGLOW_PERIOD_MICROS,
        }
    }
}

impl Inner {
    fn is_ignored_pair(&self, proto: crate::address::L4Proto, port: u16) -> bool {
        self.ignored_l4proto_port_pairs
            .contains(&L4ProtoPortPair::new(proto, port))
    }

    fn should_keep_connection(&self, conn: &Connection) -> bool {
        !self.is_ignored_pair(conn.l4proto(), conn.local().port())
            && !self.is_ignored_pair(conn.l4proto(), conn.remote().port())
    }

    fn should_keep_endpoint(&self, cep: &ContainerEndpoint) -> bool {
        !self.is_ignored_pair(cep.l4proto(), cep.endpoint().port())
    }

    fn emplace_or_update_conn(&mut self, conn: Connection, status: ConnStatus) {
        self.conn_state
            .entry(conn)
            .and_modify(|existing| existing.merge_from(status))
            .or_insert(status);
    }

    fn emplace_or_update_endpoint(&mut self, cep: ContainerEndpoint, status: ConnStatus) {
        self.endpoint_state
            .entry(cep)
            .and_modify(|existing| existing.merge_from(status))
            .or_insert(status);
    }

    fn normalizer(&self) -> Normalizer<'_> {
        Normalizer::new(&self.known_public_ips, &self.known_ip_networks)
    }
}

/// The connection-tracking state store.
pub struct ConnectionTracker {
    inner: Mutex<Inner>,
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        ConnectionTracker {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation of `conn` at `t_micros`, active or not.
    pub fn update_connection(&self, conn: Connection, t_micros: i64, added: bool) -> Result<()> {
        let status = ConnStatus::new(t_micros, added)?;
        let mut inner = self.inner.lock();
        if !inner.should_keep_connection(&conn) {
            trace!(target: "conntrack", "dropping ignored connection on {:?}", conn.l4proto());
            return Ok(());
        }
        inner.emplace_or_update_conn(conn, status);
        Ok(())
    }

    pub fn add_connection(&self, conn: Connection, t_micros: i64) -> Result<()> {
        self.update_connection(conn, t_micros, true)
    }

    pub fn remove_connection(&self, conn: Connection, t_micros: i64) -> Result<()> {
        self.update_connection(conn, t_micros, false)
    }

    /// Batch ingest: reconcile the tracker against a full snapshot of
    /// currently-observed connections and listen endpoints.
    ///
    /// Every entry presently active is first demoted to inactive at its own
    /// last-active time; every entry named in `all_conns`/`all_listen_endpoints`
    /// is then merged back in as active at `t_micros`. By merge semantics,
    /// anything still present is restored to active; anything absent stays
    /// demoted.
    pub fn update(
        &self,
        all_conns: &[Connection],
        all_listen_endpoints: &[ContainerEndpoint],
        t_micros: i64,
    ) -> Result<()> {
        let fresh = ConnStatus::new(t_micros, true)?;
        let mut inner = self.inner.lock();

        let demotions: Vec<(Connection, ConnStatus)> = inner
            .conn_state
            .iter()
            .filter(|(_, status)| status.is_active())
            .map(|(conn, status)| (conn.clone(), status.with_status(false)))
            .collect();
        for (conn, demoted) in demotions {
            inner.conn_state.insert(conn, demoted);
        }

        let endpoint_demotions: Vec<(ContainerEndpoint, ConnStatus)> = inner
            .endpoint_state
            .iter()
            .filter(|(_, status)| status.is_active())
            .map(|(cep, status)| (cep.clone(), status.with_status(false)))
            .collect();
        for (cep, demoted) in endpoint_demotions {
            inner.endpoint_state.insert(cep, demoted);
        }

        let mut kept = 0usize;
        for conn in all_conns {
            if inner.should_keep_connection(conn) {
                inner.emplace_or_update_conn(conn.clone(), fresh);
                kept += 1;
            }
        }
        for cep in all_listen_endpoints {
            if inner.should_keep_endpoint(cep) {
                inner.emplace_or_update_endpoint(cep.clone(), fresh);
            }
        }
        debug!(
            target: "conntrack",
            "batch update at t={t_micros}: {kept}/{} connections kept, {} endpoints",
            all_conns.len(),
            all_listen_endpoints.len()
        );
        Ok(())
    }

    /// Atomically snapshot connection state, optionally normalizing keys and
    /// purging entries that are inactive (from both the returned map and the
    /// tracker itself).
    pub fn fetch_conn_state(&self, normalize: bool, clear_inactive: bool) -> ConnMap {
        let mut inner = self.inner.lock();

        if clear_inactive {
            inner.conn_state.retain(|_, status| status.is_active());
        }

        if !normalize {
            return inner.conn_state.clone();
        }

        let normalizer = inner.normalizer();
        let mut out = ConnMap::new();
        for (conn, status) in inner.conn_state.iter() {
            let key = normalizer.normalize_connection(conn);
            out.entry(key)
                .and_modify(|existing: &mut ConnStatus| existing.merge_from(*status))
                .or_insert(*status);
        }
        out
    }

    /// Symmetric to [`Self::fetch_conn_state`] for listen endpoints.
    pub fn fetch_endpoint_state(&self, normalize: bool, clear_inactive: bool) -> ContainerEndpointMap {
        let mut inner = self.inner.lock();

        if clear_inactive {
            inner.endpoint_state.retain(|_, status| status.is_active());
        }

        if !normalize {
            return inner.endpoint_state.clone();
        }

        let normalizer = inner.normalizer();
        let mut out = ContainerEndpointMap::new();
        for (cep, status) in inner.endpoint_state.iter() {
            let key = normalizer.normalize_endpoint(cep);
            out.entry(key)
                .and_modify(|existing: &mut ConnStatus| existing.merge_from(*status))
                .or_insert(*status);
        }
        out
    }

    /// Replace the set of addresses reported verbatim instead of coarsened.
    pub fn update_known_public_ips(&self, known_public_ips: HashSet<Address>) {
        let mut inner = self.inner.lock();
        inner.known_public_ips = known_public_ips;
    }

    /// Replace the operator-declared networks and rebuild the radix tree
    /// (and its per-family "do we know what private looks like" cache) from
    /// scratch. Rejects networks whose prefix exceeds their family's width;
    /// on rejection the tracker's existing networks are left untouched.
    pub fn update_known_ip_networks(&self, networks: Vec<IPNet>) -> Result<()> {
        for net in &networks {
            if net.prefix() > net.family().width_bits() {
                return Err(crate::error::TrackerError::InvalidPrefixLength {
                    family: net.family(),
                    prefix: net.prefix(),
                });
            }
        }
        let tree = RadixTree::from_networks(networks);
        let mut inner = self.inner.lock();
        inner.known_ip_networks = tree;
        Ok(())
    }

    /// Replace the set of (protocol, port) pairs dropped at ingest.
    pub fn update_ignored_l4proto_port_pairs(&self, pairs: HashSet<L4ProtoPortPair>) {
        let mut inner = self.inner.lock();
        inner.ignored_l4proto_port_pairs = pairs;
    }

    /// Validate and install a complete configuration as one atomic swap.
    /// On validation failure, no tracker field is touched.
    pub fn apply_config(&self, config: TrackerConfig) -> Result<()> {
        if let Err(e) = config.validate() {
            warn!(target: "conntrack", "rejected configuration: {e}");
            return Err(e);
        }
        let tree = RadixTree::from_networks(config.known_ip_networks.iter().copied());
        let mut inner = self.inner.lock();
        inner.known_public_ips = config.known_public_ips;
        inner.known_ip_networks = tree;
        inner.ignored_l4proto_port_pairs = config.ignored_l4proto_port_pairs;
        inner.afterglow_period_micros = config.afterglow_period_micros;
        debug!(target: "conntrack", "installed new tracker configuration");
        Ok(())
    }

    /// The afterglow window currently installed via [`Self::apply_config`].
    pub fn afterglow_period_micros(&self) -> i64 {
        self.inner.lock().afterglow_period_micros
    }

    /// True iff `family` has at least one operator-declared network, i.e.
    /// the tracker has a reference for what "private" looks like.
    pub fn has_known_private_network(&self, family: Family) -> bool {
        self.inner.lock().known_ip_networks.has_specific_network(family)
    }
}
