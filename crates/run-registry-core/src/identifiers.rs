// crates/run-registry-core/src/identifiers.rs
// ============================================================================
// Module: Run Registry Identifiers
// Description: Canonical opaque identifiers for registered runs.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the run number identifier used throughout the
//! registry. Run numbers are opaque non-negative integers assigned by the
//! experiment control system; the registry enforces uniqueness but does not
//! assign them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Unique identifier of one recorded experiment run.
///
/// # Invariants
/// - Serializes as a plain integer on the wire.
/// - Uniqueness is enforced by the storage layer, not by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunNumber(u64);

impl RunNumber {
    /// Creates a new run number.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw run number value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for RunNumber {
    fn from(raw: u64) -> Self {
        Self::new(raw)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::RunNumber;

    #[test]
    fn run_number_round_trips_as_plain_integer() {
        let run = RunNumber::new(42);
        let encoded = serde_json::to_string(&run).unwrap();
        assert_eq!(encoded, "42");
        let decoded: RunNumber = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, run);
    }

    #[test]
    fn run_number_displays_raw_value() {
        assert_eq!(RunNumber::new(7).to_string(), "7");
    }
}
