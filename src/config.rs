// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tracker configuration.
//!
//! `TrackerConfig` bundles the recognized configuration values into one
//! typed, `serde`-(de)serializable value so an embedding agent's own config
//! loader (TOML, JSON, environment-derived, control-plane-pushed) can
//! produce one without this crate touching a filesystem or socket itself.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::address::{Address, Family, IPNet, L4ProtoPortPair};
use crate::error::{Result, TrackerError};

/// Default afterglow window: 20 seconds, in microseconds.
pub const DEFAULT_AFTERGLOW_PERIOD_MICROS: i64 = 20_000_000;

/// All tunables `ConnectionTracker::apply_config` installs atomically.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Tolerance window, in microseconds, during which a just-inactive
    /// connection is still reported as active. Must be `>= 0`.
    pub afterglow_period_micros: i64,

    /// Addresses that must be reported as `/full-host` rather than folded
    /// into the per-family public sentinel.
    pub known_public_ips: HashSet<Address>,

    /// Operator-declared networks (RFC1918, cluster CIDRs, externals),
    /// grouped by family for validation.
    pub known_ip_networks: Vec<IPNet>,

    /// `(protocol, port)` pairs dropped at ingest on either side of a
    /// connection or endpoint.
    pub ignored_l4proto_port_pairs: HashSet<L4ProtoPortPair>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            afterglow_period_micros: DEFAULT_AFTERGLOW_PERIOD_MICROS,
            known_public_ips: HashSet::new(),
            known_ip_networks: Vec::new(),
            ignored_l4proto_port_pairs: HashSet::new(),
        }
    }
}

impl TrackerConfig {
    /// Validate this configuration without installing it.
    ///
    /// Checked here rather than left to map construction so that
    /// `apply_config` can validate the whole value *before* acquiring the
    /// tracker lock: an invalid config must never partially land.
    pub fn validate(&self) -> Result<()> {
        if self.afterglow_period_micros < 0 {
            return Err(TrackerError::InvalidConfig(format!(
                "afterglow_period_micros must be >= 0, got {}",
                self.afterglow_period_micros
            )));
        }
        for net in &self.known_ip_networks {
            if net.prefix() > net.family().width_bits() {
                return Err(TrackerError::InvalidPrefixLength {
                    family: net.family(),
                    prefix: net.prefix(),
                });
            }
        }
        Ok(())
    }

    /// Networks declared for a single family, in the shape
    /// [`crate::radix::RadixTree::from_networks`] expects.
    pub fn networks_for(&self, family: Family) -> impl Iterator<Item = IPNet> + '_ {
        self.known_ip_networks
            .iter()
            .copied()
            .filter(move |n| n.family() == family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{L4Proto, L4ProtoPortPair};
    use std::net::Ipv4Addr;

    #[test]
    fn default_config_is_valid() {
        assert!(TrackerConfig::default().validate().is_ok());
        assert_eq!(
            TrackerConfig::default().afterglow_period_micros,
            DEFAULT_AFTERGLOW_PERIOD_MICROS
        );
    }

    #[test]
    fn negative_afterglow_is_rejected() {
        let cfg = TrackerConfig {
            afterglow_period_micros: -1,
            ..TrackerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn known_networks_round_trip_through_toml_like_strings() {
        let net: IPNet = "10.0.0.0/8".parse().unwrap();
        assert_eq!(net.to_string(), "10.0.0.0/8");
    }

    #[test]
    fn ignored_pairs_carry_through_validation() {
        let mut cfg = TrackerConfig::default();
        cfg.ignored_l4proto_port_pairs
            .insert(L4ProtoPortPair::new(L4Proto::Udp, 53));
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.ignored_l4proto_port_pairs.len(), 1);
    }

    #[test]
    fn networks_for_filters_by_family() {
        let cfg = TrackerConfig {
            known_ip_networks: vec![
                IPNet::new(Ipv4Addr::new(10, 0, 0, 0).into(), 8).unwrap(),
                IPNet::new(Ipv4Addr::new(192, 168, 0, 0).into(), 16).unwrap(),
            ],
            ..TrackerConfig::default()
        };
        assert_eq!(cfg.networks_for(Family::V4).count(), 2);
        assert_eq!(cfg.networks_for(Family::V6).count(), 0);
    }
}
