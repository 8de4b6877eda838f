// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `ConnStatus`: a bit-packed (timestamp, active) pair.

use crate::error::{Result, TrackerError};

const ACTIVE_BIT: u64 = 1;

/// The status of a tracked connection or endpoint: the microsecond timestamp
/// it was last observed, plus whether that observation found it active.
///
/// Packed into a single `u64` so that `merge_from` can express "prefer the
/// later timestamp, and prefer active over inactive at an equal timestamp"
/// as a single unsigned-word maximum: the timestamp occupies the high 63
/// bits and the active flag the low bit, so comparing the raw words compares
/// timestamps first and only falls back to the flag as a tiebreaker. (A
/// flag-in-the-high-bit layout looks appealing but makes an active status
/// permanently un-demotable by a later inactive one via merge, since the
/// flag would then dominate the comparison regardless of elapsed time.)
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ConnStatus(u64);

impl ConnStatus {
    /// Largest timestamp that fits in the 63 bits left after the flag.
    pub const MAX_TIMESTAMP: i64 = i64::MAX;

    /// Pack a timestamp and activity flag. Fails if `t_micros` is negative
    /// or does not fit in 63 bits.
    pub fn new(t_micros: i64, active: bool) -> Result<Self> {
        if !(0..=Self::MAX_TIMESTAMP).contains(&t_micros) {
            return Err(TrackerError::InvalidTimestamp(t_micros));
        }
        Ok(Self::new_unchecked(t_micros as u64, active))
    }

    fn new_unchecked(t_micros: u64, active: bool) -> Self {
        ConnStatus(pack(t_micros, active))
    }

    /// Microsecond timestamp of the most recent observation.
    pub const fn last_active_time(&self) -> i64 {
        (self.0 >> 1) as i64
    }

    /// Whether the most recent observation found this entry active.
    pub const fn is_active(&self) -> bool {
        self.0 & ACTIVE_BIT != 0
    }

    /// Flip the active flag in place, preserving the timestamp.
    pub fn set_active(&mut self, active: bool) {
        self.0 = set_flag(self.0, active);
    }

    /// A copy of this status with the active flag overridden.
    pub const fn with_status(&self, active: bool) -> Self {
        ConnStatus(set_flag(self.0, active))
    }

    /// Merge another observation into this one in place: keep the
    /// word-wise maximum. Associative and idempotent.
    pub fn merge_from(&mut self, other: ConnStatus) {
        self.0 = self.0.max(other.0);
    }

    /// Non-mutating merge of two statuses.
    pub fn merge(a: ConnStatus, b: ConnStatus) -> ConnStatus {
        ConnStatus(a.0.max(b.0))
    }
}

const fn pack(t_micros: u64, active: bool) -> u64 {
    (t_micros << 1) | (active as u64)
}

const fn set_flag(data: u64, active: bool) -> u64 {
    if active {
        data | ACTIVE_BIT
    } else {
        data & !ACTIVE_BIT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_zero_inactive() {
        let s = ConnStatus::default();
        assert_eq!(s.last_active_time(), 0);
        assert!(!s.is_active());
    }

    #[test]
    fn rejects_negative_timestamp() {
        assert!(ConnStatus::new(-1, true).is_err());
    }

    #[test]
    fn rejects_timestamp_overflowing_63_bits() {
        assert!(ConnStatus::new(ConnStatus::MAX_TIMESTAMP.wrapping_add(1), true).is_err());
        assert!(ConnStatus::new(ConnStatus::MAX_TIMESTAMP, true).is_ok());
    }

    #[test]
    fn merge_prefers_active_at_equal_time() {
        let inactive = ConnStatus::new(100, false).unwrap();
        let active = ConnStatus::new(100, true).unwrap();
        assert!(ConnStatus::merge(inactive, active).is_active());
        assert!(ConnStatus::merge(active, inactive).is_active());
    }

    #[test]
    fn merge_prefers_later_time_within_same_activity() {
        let earlier = ConnStatus::new(100, false).unwrap();
        let later = ConnStatus::new(200, false).unwrap();
        let merged = ConnStatus::merge(earlier, later);
        assert_eq!(merged.last_active_time(), 200);
        assert!(!merged.is_active());
    }

    #[test]
    fn merge_does_not_resurrect_an_earlier_active_status() {
        // An active status at t=50 must not beat an inactive one at t=100:
        // the later observation wins regardless of its flag, since it is
        // strictly more recent information.
        let active_early = ConnStatus::new(50, true).unwrap();
        let inactive_later = ConnStatus::new(100, false).unwrap();
        let merged = ConnStatus::merge(active_early, inactive_later);
        assert_eq!(merged.last_active_time(), 100);
        assert!(!merged.is_active());
    }

    #[test]
    fn merge_is_associative_and_idempotent() {
        let a = ConnStatus::new(10, true).unwrap();
        let b = ConnStatus::new(20, false).unwrap();
        let c = ConnStatus::new(15, true).unwrap();

        let left = ConnStatus::merge(ConnStatus::merge(a, b), c);
        let right = ConnStatus::merge(a, ConnStatus::merge(b, c));
        assert_eq!(left, right);

        assert_eq!(ConnStatus::merge(a, a), a);
    }

    #[test]
    fn with_status_preserves_timestamp() {
        let s = ConnStatus::new(42, true).unwrap();
        let flipped = s.with_status(false);
        assert_eq!(flipped.last_active_time(), 42);
        assert!(!flipped.is_active());
    }

    #[test]
    fn merge_from_mutates_in_place() {
        let mut s = ConnStatus::new(10, false).unwrap();
        s.merge_from(ConnStatus::new(10, true).unwrap());
        assert!(s.is_active());
        assert_eq!(s.last_active_time(), 10);
    }
}
