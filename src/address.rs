// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Minimal address/network value types.
//!
//! A freestanding engine has nobody upstream to hand it `Address`/`IPNet`
//! types, so this module defines the narrow slice this crate actually reads:
//! an address family, raw address bytes, a port, and a CIDR-style prefix.
//! There is no support for zone ids, scoped addresses, or anything else a
//! full network stack would need.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, TrackerError};

/// Address family. The radix tree and normalizer are keyed per-family.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    /// Bit width of an address in this family.
    pub const fn width_bits(self) -> u8 {
        match self {
            Family::V4 => 32,
            Family::V6 => 128,
        }
    }

    /// Byte width of an address in this family.
    const fn width_bytes(self) -> usize {
        match self {
            Family::V4 => 4,
            Family::V6 => 16,
        }
    }
}

/// An address, tagged with its family. Stored as up to 16 raw bytes so the
/// radix tree can walk bits generically across both families.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    family: Family,
    // v4 addresses occupy the low 4 bytes; the remainder is zero-padded.
    bytes: [u8; 16],
}

impl Address {
    /// Build an address from its raw big-endian bytes. `bytes.len()` must
    /// match the family's width.
    pub fn from_bytes(family: Family, raw: &[u8]) -> Result<Self> {
        if raw.len() != family.width_bytes() {
            return Err(TrackerError::InvalidPrefixLength {
                family,
                prefix: raw.len() as u8 * 8,
            });
        }
        let mut bytes = [0u8; 16];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(Address { family, bytes })
    }

    /// The all-zeroes address for a family (used to erase a local IP).
    pub const fn zero(family: Family) -> Self {
        Address {
            family,
            bytes: [0u8; 16],
        }
    }

    pub const fn family(&self) -> Family {
        self.family
    }

    /// Raw address bytes, truncated to the family's width.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.family.width_bytes()]
    }

    /// Returns the value of bit `idx` (0 = most significant bit), used by
    /// the radix tree to walk an address one bit at a time.
    pub(crate) fn bit(&self, idx: u8) -> bool {
        let byte = self.bytes[(idx / 8) as usize];
        (byte >> (7 - (idx % 8))) & 1 == 1
    }
}

impl From<Ipv4Addr> for Address {
    fn from(v: Ipv4Addr) -> Self {
        Address::from_bytes(Family::V4, &v.octets()).expect("Ipv4Addr is always 4 bytes")
    }
}

impl From<Ipv6Addr> for Address {
    fn from(v: Ipv6Addr) -> Self {
        Address::from_bytes(Family::V6, &v.octets()).expect("Ipv6Addr is always 16 bytes")
    }
}

impl From<IpAddr> for Address {
    fn from(v: IpAddr) -> Self {
        match v {
            IpAddr::V4(v4) => v4.into(),
            IpAddr::V6(v6) => v6.into(),
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.family {
            Family::V4 => {
                let b = self.as_bytes();
                write!(f, "{}.{}.{}.{}", b[0], b[1], b[2], b[3])
            }
            Family::V6 => {
                let b = self.as_bytes();
                let addr = Ipv6Addr::new(
                    u16::from_be_bytes([b[0], b[1]]),
                    u16::from_be_bytes([b[2], b[3]]),
                    u16::from_be_bytes([b[4], b[5]]),
                    u16::from_be_bytes([b[6], b[7]]),
                    u16::from_be_bytes([b[8], b[9]]),
                    u16::from_be_bytes([b[10], b[11]]),
                    u16::from_be_bytes([b[12], b[13]]),
                    u16::from_be_bytes([b[14], b[15]]),
                );
                write!(f, "{addr}")
            }
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse::<IpAddr>().map(Address::from)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct AddrVisitor;
        impl Visitor<'_> for AddrVisitor {
            type Value = Address;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an IPv4 or IPv6 address string")
            }
            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Address, E> {
                v.parse().map_err(de::Error::custom)
            }
        }
        deserializer.deserialize_str(AddrVisitor)
    }
}

/// A (network address, prefix length) pair, matched longest-prefix-first.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct IPNet {
    address: Address,
    prefix: u8,
}

impl IPNet {
    /// Construct a network, masking `address` down to `prefix` bits.
    pub fn new(address: Address, prefix: u8) -> Result<Self> {
        if prefix > address.family().width_bits() {
            return Err(TrackerError::InvalidPrefixLength {
                family: address.family(),
                prefix,
            });
        }
        Ok(IPNet {
            address: mask(address, prefix),
            prefix,
        })
    }

    /// A /full-host network: matches exactly one address.
    pub fn host(address: Address) -> Self {
        IPNet {
            address,
            prefix: address.family().width_bits(),
        }
    }

    /// The canonical "any unclassified external peer" sentinel for a family:
    /// the zero address at prefix 0, i.e. a default route that matches
    /// anything not otherwise claimed by a more specific known network.
    pub const fn public_sentinel(family: Family) -> Self {
        IPNet {
            address: Address::zero(family),
            prefix: 0,
        }
    }

    pub const fn address(&self) -> Address {
        self.address
    }

    pub const fn prefix(&self) -> u8 {
        self.prefix
    }

    pub const fn family(&self) -> Family {
        self.address.family
    }

    /// True unless this is a full-host route (prefix equal to the family's
    /// bit width), i.e. it narrows "private" down to more than one address.
    /// A lone `/32` (or `/128`) network declared as "known" still leaves the
    /// rest of that family's address space unclassified, so it must not
    /// count as "we have a reference for what private looks like" on its
    /// own.
    pub const fn is_specific(&self) -> bool {
        self.prefix < self.address.family.width_bits()
    }
}

impl fmt::Display for IPNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix)
    }
}

/// Error parsing an `IPNet` from `"address/prefix"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid CIDR network {0:?}")]
pub struct ParseIpNetError(String);

impl FromStr for IPNet {
    type Err = ParseIpNetError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (addr_part, prefix_part) = s
            .split_once('/')
            .ok_or_else(|| ParseIpNetError(s.to_string()))?;
        let address: Address = addr_part
            .parse()
            .map_err(|_| ParseIpNetError(s.to_string()))?;
        let prefix: u8 = prefix_part
            .parse()
            .map_err(|_| ParseIpNetError(s.to_string()))?;
        IPNet::new(address, prefix).map_err(|_| ParseIpNetError(s.to_string()))
    }
}

impl Serialize for IPNet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IPNet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct NetVisitor;
        impl Visitor<'_> for NetVisitor {
            type Value = IPNet;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a CIDR network string, e.g. \"10.0.0.0/8\"")
            }
            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<IPNet, E> {
                v.parse().map_err(de::Error::custom)
            }
        }
        deserializer.deserialize_str(NetVisitor)
    }
}

fn mask(address: Address, prefix: u8) -> Address {
    let mut bytes = [0u8; 16];
    let full_bytes = (prefix / 8) as usize;
    bytes[..full_bytes].copy_from_slice(&address.bytes[..full_bytes]);
    if prefix % 8 != 0 {
        let mask_bits = 0xFFu8 << (8 - (prefix % 8));
        bytes[full_bytes] = address.bytes[full_bytes] & mask_bits;
    }
    Address {
        family: address.family,
        bytes,
    }
}

/// A transport-layer address: network address plus port.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Endpoint {
    address: Address,
    port: u16,
}

impl Endpoint {
    pub const fn new(address: Address, port: u16) -> Self {
        Endpoint { address, port }
    }

    pub const fn address(&self) -> Address {
        self.address
    }

    pub const fn port(&self) -> u16 {
        self.port
    }
}

/// Layer-4 protocol. Extend as the probe starts reporting more of them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum L4Proto {
    Tcp,
    Udp,
    Icmp,
    Other(u8),
}

impl fmt::Display for L4Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            L4Proto::Tcp => f.write_str("tcp"),
            L4Proto::Udp => f.write_str("udp"),
            L4Proto::Icmp => f.write_str("icmp"),
            L4Proto::Other(n) => write!(f, "proto{n}"),
        }
    }
}

/// A (protocol, port) pair used to express ignore-filter entries.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct L4ProtoPortPair {
    pub proto: L4Proto,
    pub port: u16,
}

impl L4ProtoPortPair {
    pub const fn new(proto: L4Proto, port: u16) -> Self {
        L4ProtoPortPair { proto, port }
    }
}
