// crates/run-registry-core/src/time.rs
// ============================================================================
// Module: Run Registry Time
// Description: Millisecond-precision timestamps for run records.
// Purpose: Provide a stable wire form for start and stop times.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Run records carry start and stop times as unix-epoch milliseconds. The
//! [`Timestamp`] newtype keeps the wire form stable (a plain integer) and
//! centralizes clock access.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Unix-epoch timestamp in milliseconds.
///
/// # Invariants
/// - Serializes as a plain integer on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from raw unix milliseconds.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the raw unix milliseconds value.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Returns the current wall-clock time.
    ///
    /// Clocks before the unix epoch saturate to zero.
    #[must_use]
    pub fn now() -> Self {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Self(i64::try_from(now.as_millis()).unwrap_or(i64::MAX))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::Timestamp;

    #[test]
    fn timestamp_round_trips_as_plain_integer() {
        let ts = Timestamp::from_millis(1_700_000_000_000);
        let encoded = serde_json::to_string(&ts).unwrap();
        assert_eq!(encoded, "1700000000000");
        let decoded: Timestamp = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, ts);
    }

    #[test]
    fn now_is_monotonic_enough_for_ordering() {
        let first = Timestamp::now();
        let second = Timestamp::now();
        assert!(second.as_millis() >= first.as_millis());
    }
}
