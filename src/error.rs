// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the connection-tracking core.

use thiserror::Error;

/// Errors returned by [`crate::tracker::ConnectionTracker`] and its helpers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackerError {
    /// A timestamp was negative or did not fit in the 63 bits `ConnStatus` reserves for it.
    #[error("invalid timestamp {0}: must be in [0, 2^63)")]
    InvalidTimestamp(i64),

    /// An `IPNet` prefix length exceeded the bit width of its address family.
    #[error("invalid prefix length {prefix} for a {family:?} address")]
    InvalidPrefixLength { family: crate::address::Family, prefix: u8 },

    /// `apply_config` was handed a config that failed validation; no tracker state changed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, TrackerError>;
