// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection-tracking core for a host-level network-observability agent.
//!
//! This crate owns one job: given a stream of observed L4 connections and
//! listen endpoints, maintain a coarsened view of "what is this host talking
//! to and listening on right now", and emit open/update/close events for it
//! without flapping on every sampling gap.
//!
//! It does not read configuration files, open sockets, resolve DNS, or
//! serialize anything onto a wire — those are an embedding agent's job. What
//! it provides:
//!
//! - [`status::ConnStatus`]: a bit-packed (timestamp, active) pair with
//!   max-based merge semantics.
//! - [`normalize::Normalizer`]: pure address/endpoint coarsening, backed by
//!   a per-family [`radix::RadixTree`] of operator-declared networks.
//! - [`tracker::ConnectionTracker`]: the single-mutex state store that
//!   ingests observations and serves snapshots.
//! - [`delta`] and [`reporter::Reporter`]: afterglow-aware diffing between
//!   successive snapshots, so a silent sampling interval doesn't read as a
//!   close.
//!
//! # Concurrency contract
//!
//! Exactly one thread should feed a given [`tracker::ConnectionTracker`]
//! through [`tracker::ConnectionTracker::add_connection`]/
//! [`tracker::ConnectionTracker::update`] (a single probe reader). Any
//! number of threads may call the `fetch_*`/`update_known_*`/`apply_config`
//! methods; all tracker state lives behind one internal mutex. A
//! [`reporter::Reporter`], by contrast, retains unlocked state of its own
//! and must not be shared across threads — one reporter per tracker, driven
//! from a single cadence loop.
//!
//! ```
//! use conntrack_core::address::{Endpoint, L4Proto};
//! use conntrack_core::connection::{Connection, Role};
//! use conntrack_core::tracker::ConnectionTracker;
//! use std::net::Ipv4Addr;
//!
//! let tracker = ConnectionTracker::new();
//! let conn = Connection::new(
//!     "my-container",
//!     Endpoint::new(Ipv4Addr::new(10, 0, 0, 5).into(), 51000),
//!     Endpoint::new(Ipv4Addr::new(8, 8, 8, 8).into(), 443),
//!     L4Proto::Tcp,
//!     Role::Client,
//! );
//! tracker.add_connection(conn, 0).unwrap();
//! assert_eq!(tracker.fetch_conn_state(false, false).len(), 1);
//! ```

pub mod address;
pub mod config;
pub mod connection;
pub mod delta;
pub mod error;
pub mod normalize;
pub mod radix;
pub mod reporter;
pub mod status;
pub mod tracker;

pub use address::{Address, Endpoint, Family, IPNet, L4Proto, L4ProtoPortPair};
pub use config::TrackerConfig;
pub use connection::{ContainerEndpoint, Connection, Role};
pub use delta::{compute_delta, update_old_state, DeltaKind};
pub use error::{Result, TrackerError};
pub use normalize::Normalizer;
pub use radix::RadixTree;
pub use reporter::{DeltaSink, Reporter};
pub use status::ConnStatus;
pub use tracker::ConnectionTracker;
