// crates/run-registry-core/src/record.rs
// ============================================================================
// Module: Run Registry Records
// Description: Run metadata and blob records with the ordered schema descriptor.
// Purpose: Define the persisted data model and its JSON wire form.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! One run is described by a [`RunRecord`] (metadata) and exactly one
//! [`RunBlob`] (the configuration archive). Both are created by a single
//! atomic store operation; the record is immutable afterwards except for the
//! stop time, which is set exactly once.
//!
//! Metadata responses are JSON arrays whose first element is the schema
//! descriptor ([`META_COLUMNS`]) so clients can interpret row columns without
//! a separate metadata call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::identifiers::RunNumber;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Schema Descriptor
// ============================================================================

/// Ordered column names for run metadata rows.
///
/// The order is the wire order of every metadata row; it is prepended to
/// metadata responses as the schema descriptor.
pub const META_COLUMNS: [&str; 7] =
    ["run_num", "det_id", "run_type", "software_version", "filename", "start_time", "stop_time"];

// ============================================================================
// SECTION: Records
// ============================================================================

/// Metadata for one recorded experiment run.
///
/// # Invariants
/// - `run_number` is unique across the registry.
/// - All fields except `stop_time` are immutable after insertion.
/// - `stop_time` transitions from `None` to `Some` at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique run number.
    pub run_number: RunNumber,
    /// Detector identifier.
    pub det_id: String,
    /// Run type label.
    pub run_type: String,
    /// Software version the run was taken with.
    pub software_version: String,
    /// Original filename of the associated configuration archive.
    pub filename: String,
    /// Start timestamp, set at insertion.
    pub start_time: Timestamp,
    /// Stop timestamp, set exactly once by the stop-time update.
    pub stop_time: Option<Timestamp>,
}

impl RunRecord {
    /// Returns the record as an ordered row matching [`META_COLUMNS`].
    #[must_use]
    pub fn row_values(&self) -> Value {
        json!([
            self.run_number,
            self.det_id,
            self.run_type,
            self.software_version,
            self.filename,
            self.start_time,
            self.stop_time,
        ])
    }
}

/// Configuration archive stored for one run.
///
/// # Invariants
/// - Exists if and only if a [`RunRecord`] with the same run number exists.
/// - Write-once; never updated or deleted through the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunBlob {
    /// Run number the blob belongs to.
    pub run_number: RunNumber,
    /// Original artifact filename.
    pub filename: String,
    /// Raw artifact bytes.
    pub bytes: Vec<u8>,
}

/// Insertion request for a new run.
///
/// # Invariants
/// - `start_time` is assigned by the caller at ingestion time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRun {
    /// Unique run number.
    pub run_number: RunNumber,
    /// Detector identifier.
    pub det_id: String,
    /// Run type label.
    pub run_type: String,
    /// Software version the run was taken with.
    pub software_version: String,
    /// Original filename of the configuration archive.
    pub filename: String,
    /// Start timestamp.
    pub start_time: Timestamp,
}

impl NewRun {
    /// Returns the record this insertion produces (no stop time yet).
    #[must_use]
    pub fn into_record(self) -> RunRecord {
        RunRecord {
            run_number: self.run_number,
            det_id: self.det_id,
            run_type: self.run_type,
            software_version: self.software_version,
            filename: self.filename,
            start_time: self.start_time,
            stop_time: None,
        }
    }
}

// ============================================================================
// SECTION: Wire Payloads
// ============================================================================

/// Builds the metadata response payload: `[schema, row...]`.
#[must_use]
pub fn meta_payload(records: &[RunRecord]) -> Value {
    let mut elements = Vec::with_capacity(records.len() + 1);
    elements.push(json!(META_COLUMNS));
    for record in records {
        elements.push(record.row_values());
    }
    Value::Array(elements)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
