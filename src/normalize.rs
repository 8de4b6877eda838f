// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The normalization pipeline.
//!
//! Rewrites a raw [`Connection`]/[`ContainerEndpoint`] into the canonical
//! form downstream actually sees: remote addresses coarsened to their
//! enclosing known network (or folded into a public sentinel), and local
//! endpoints erased down to whatever identifies a listener.
//!
//! `Normalizer` borrows the configuration snapshot it runs against; it does
//! not own or mutate anything, and is safe to construct fresh on every call
//! as long as the borrow is held for no longer than the tracker's lock.

use crate::address::{Address, Endpoint, Family, IPNet};
use crate::connection::{ContainerEndpoint, Connection, Role};
use crate::radix::RadixTree;
use std::collections::HashSet;

/// A pure function of a connection/endpoint and the configuration it closes
/// over. Constructed under the tracker's lock, used, and dropped — it never
/// outlives the borrow of the tracker's state.
pub struct Normalizer<'a> {
    known_public_ips: &'a HashSet<Address>,
    known_ip_networks: &'a RadixTree,
}

impl<'a> Normalizer<'a> {
    pub fn new(known_public_ips: &'a HashSet<Address>, known_ip_networks: &'a RadixTree) -> Self {
        Normalizer {
            known_public_ips,
            known_ip_networks,
        }
    }

    /// Rewrite a connection into its canonical form. Idempotent: normalizing
    /// an already-normalized connection returns it unchanged.
    pub fn normalize_connection(&self, conn: &Connection) -> Connection {
        let (local, remote) = match conn.role() {
            Role::Server => {
                // Servers are identified by listening port, not their own NIC.
                let local = Endpoint::new(Address::zero(conn.local().address().family()), conn.local().port());
                let remote = self.coarsen_remote(conn.remote());
                (local, remote)
            }
            Role::Client => {
                // We only report that the container opened *a* connection to
                // X; the ephemeral local port and address are noise.
                let local = Endpoint::new(Address::zero(conn.local().address().family()), 0);
                let remote = self.coarsen_remote(conn.remote());
                (local, remote)
            }
        };
        conn.with_endpoints(local, remote)
    }

    /// Rewrite a listen endpoint: zero the bound address, keep family/port.
    pub fn normalize_endpoint(&self, cep: &ContainerEndpoint) -> ContainerEndpoint {
        let zeroed = Endpoint::new(Address::zero(cep.endpoint().address().family()), cep.endpoint().port());
        cep.with_endpoint(zeroed)
    }

    fn coarsen_remote(&self, remote: Endpoint) -> Endpoint {
        let addr = remote.address();
        let net = self.normalize_address(addr);
        Endpoint::new(net.address(), remote.port())
    }

    /// Address-coarsening rule, exposed standalone for testing and for
    /// anything that wants to classify an address without a full endpoint.
    pub fn normalize_address(&self, addr: Address) -> IPNet {
        if let Some(hit) = self.known_ip_networks.longest_match(&addr) {
            return hit;
        }
        if self.known_public_ips.contains(&addr) {
            return IPNet::host(addr);
        }
        if self.known_ip_networks.has_specific_network(addr.family()) {
            return IPNet::public_sentinel(addr.family());
        }
        // No reference for "private" exists for this family; leave as a host
        // address rather than guessing it is external.
        IPNet::host(addr)
    }

    /// `family-zero-address` used by role collapse, exposed for tests.
    pub fn zero_address(family: Family) -> Address {
        Address::zero(family)
    }
}
