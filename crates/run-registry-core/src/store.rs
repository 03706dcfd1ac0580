// crates/run-registry-core/src/store.rs
// ============================================================================
// Module: Registry Store Interface
// Description: Backend-agnostic storage contract for run records and blobs.
// Purpose: Define the atomic-write and parameterized-read surface of the registry.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! The [`RegistryStore`] trait is the seam between the service layer and the
//! storage backend. Implementations must make `insert_run` atomic: the
//! metadata row and the blob row commit or roll back together, so a blob can
//! never exist without its record and vice versa. All reads are
//! parameterized statements; implementations must not build queries from
//! request strings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::identifiers::RunNumber;
use crate::record::NewRun;
use crate::record::RunBlob;
use crate::record::RunRecord;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Error messages avoid embedding raw blob payloads.
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// Store I/O error.
    #[error("registry store io error: {0}")]
    Io(String),
    /// Storage engine error.
    #[error("registry store db error: {0}")]
    Db(String),
    /// Uniqueness conflict (run number already registered).
    #[error("registry store conflict: {0}")]
    Conflict(String),
    /// Invalid store data or request.
    #[error("registry store invalid data: {0}")]
    Invalid(String),
    /// Store schema version mismatch.
    #[error("registry store version mismatch: {0}")]
    VersionMismatch(String),
    /// Payload exceeded configured size limits.
    #[error("registry store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

// ============================================================================
// SECTION: Store Interface
// ============================================================================

/// Storage backend for run records and their configuration blobs.
pub trait RegistryStore: Send + Sync {
    /// Inserts a run record and its blob as one atomic unit.
    ///
    /// The two underlying statements (metadata insert, blob insert) share a
    /// single transaction scope; either both commit or neither does.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the run number is already
    /// registered, and other [`StoreError`] variants when the write fails.
    fn insert_run(&self, run: &NewRun, blob_bytes: &[u8]) -> Result<(), StoreError>;

    /// Fetches the metadata record for a run number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn fetch_meta(&self, run_number: RunNumber) -> Result<Option<RunRecord>, StoreError>;

    /// Fetches the `amount` most recent records, descending by run number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn fetch_meta_last(&self, amount: u64) -> Result<Vec<RunRecord>, StoreError>;

    /// Fetches the stored blob for a run number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn fetch_blob(&self, run_number: RunNumber) -> Result<Option<RunBlob>, StoreError>;

    /// Sets the stop time on a run record if it is not already set.
    ///
    /// First write wins: a record whose stop time is already set is returned
    /// unchanged, so repeated calls are idempotent in effect. Returns `None`
    /// when no record exists for the run number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update or the follow-up read fails.
    fn update_stop_time(
        &self,
        run_number: RunNumber,
        stop_time: Timestamp,
    ) -> Result<Option<RunRecord>, StoreError>;

    /// Reports store readiness for liveness/readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Shared handle to a registry store implementation.
pub type SharedRegistryStore = Arc<dyn RegistryStore>;
