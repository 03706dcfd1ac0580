// crates/run-registry-server/src/service.rs
// ============================================================================
// Module: Registry Service
// Description: Operation layer wiring staging, storage, and the blob cache.
// Purpose: Implement registry semantics independent of the HTTP surface.
// Dependencies: bytes, run-registry-core
// ============================================================================

//! ## Overview
//! [`RegistryService`] implements the registry operations against injected
//! collaborators: a [`RegistryStore`] backend, a [`BlobCache`], and a
//! [`StagingArea`]. All dependencies are constructor-injected; the service
//! holds no global state, so tests can assemble it against in-memory
//! backends and independent instances never interfere.
//!
//! Ingestion order is fixed: validate, reserve the staging slot, write the
//! metadata row and blob atomically, confirm by reading the record back,
//! purge stale cache entries, release the slot. The slot guard releases on
//! every exit path, including failures.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use bytes::Bytes;
use run_registry_core::NewRun;
use run_registry_core::RegistryError;
use run_registry_core::RunNumber;
use run_registry_core::SharedRegistryStore;
use run_registry_core::StoreError;
use run_registry_core::Timestamp;
use run_registry_core::meta_payload;
use serde_json::Value;

use crate::cache::BlobCache;
use crate::cache::CachedBlob;
use crate::staging::StagingArea;
use crate::staging::StagingError;

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Decoded ingestion request: run fields plus the uploaded artifact.
#[derive(Debug, Clone)]
pub struct InsertRunRequest {
    /// Unique run number.
    pub run_number: RunNumber,
    /// Detector identifier.
    pub det_id: String,
    /// Run type label.
    pub run_type: String,
    /// Software version the run was taken with.
    pub software_version: String,
    /// Original artifact filename.
    pub filename: String,
    /// Uploaded artifact bytes.
    pub bytes: Bytes,
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Registry operation layer.
///
/// # Invariants
/// - All collaborators are injected; the service owns no global state.
/// - Ingestion purges cached blobs for the run before returning.
#[derive(Clone)]
pub struct RegistryService {
    /// Storage backend.
    store: SharedRegistryStore,
    /// Read-through blob cache.
    cache: Arc<BlobCache>,
    /// Exclusive upload staging area.
    staging: Arc<StagingArea>,
}

impl RegistryService {
    /// Assembles the service from its collaborators.
    #[must_use]
    pub fn new(
        store: SharedRegistryStore,
        cache: Arc<BlobCache>,
        staging: Arc<StagingArea>,
    ) -> Self {
        Self {
            store,
            cache,
            staging,
        }
    }

    /// Ingests a new run: metadata row plus configuration blob, atomically.
    ///
    /// Returns the metadata payload of the freshly inserted record, read
    /// back from the store as confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Validation`] for missing or disallowed
    /// fields, [`RegistryError::StagingConflict`] when another upload holds
    /// the filename, and [`RegistryError::WriteFailed`] when the atomic
    /// write aborts (a duplicate run number carries
    /// [`StoreError::Conflict`]).
    pub fn insert_run(&self, request: &InsertRunRequest) -> Result<Value, RegistryError> {
        require_field("det_id", &request.det_id)?;
        require_field("run_type", &request.run_type)?;
        require_field("software_version", &request.software_version)?;
        let staged = self
            .staging
            .stage(&request.filename, &request.bytes)
            .map_err(map_staging_error)?;
        let run = NewRun {
            run_number: request.run_number,
            det_id: request.det_id.clone(),
            run_type: request.run_type.clone(),
            software_version: request.software_version.clone(),
            filename: request.filename.clone(),
            start_time: Timestamp::now(),
        };
        self.store.insert_run(&run, &staged.bytes).map_err(RegistryError::WriteFailed)?;
        // Stale cached blobs for this run number must not outlive the write.
        self.cache.purge_run(request.run_number);
        let record = self
            .store
            .fetch_meta(request.run_number)
            .map_err(RegistryError::QueryFailed)?
            .ok_or_else(|| {
                RegistryError::WriteFailed(StoreError::Db(format!(
                    "inserted run {} not readable",
                    request.run_number
                )))
            })?;
        drop(staged);
        Ok(meta_payload(std::slice::from_ref(&record)))
    }

    /// Returns the metadata payload for one run number.
    ///
    /// A missing run yields the schema-only payload.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::QueryFailed`] when the store query fails.
    pub fn run_meta(&self, run_number: RunNumber) -> Result<Value, RegistryError> {
        let record =
            self.store.fetch_meta(run_number).map_err(RegistryError::QueryFailed)?;
        let rows: Vec<_> = record.into_iter().collect();
        Ok(meta_payload(&rows))
    }

    /// Returns the metadata payload for the most recent runs.
    ///
    /// Rows are ordered descending by run number; `amount` bounds the row
    /// count. Repeated calls over unchanged data return identical payloads.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::QueryFailed`] when the store query fails.
    pub fn run_meta_last(&self, amount: u64) -> Result<Value, RegistryError> {
        let rows = self.store.fetch_meta_last(amount).map_err(RegistryError::QueryFailed)?;
        Ok(meta_payload(&rows))
    }

    /// Returns the configuration blob for a run, through the cache.
    ///
    /// `cache_key` is the canonical request identity (see
    /// [`crate::cache::canonical_key`]); a hit bypasses the store entirely.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when no blob exists for the run
    /// and [`RegistryError::QueryFailed`] when the store query fails.
    pub fn run_blob(
        &self,
        run_number: RunNumber,
        cache_key: &str,
    ) -> Result<Arc<CachedBlob>, RegistryError> {
        if let Some(hit) = self.cache.get(cache_key) {
            return Ok(hit);
        }
        let blob = self
            .store
            .fetch_blob(run_number)
            .map_err(RegistryError::QueryFailed)?
            .ok_or_else(|| RegistryError::NotFound(format!("no blob for run {run_number}")))?;
        let cached = CachedBlob {
            filename: blob.filename,
            bytes: Bytes::from(blob.bytes),
        };
        Ok(self.cache.insert(cache_key.to_string(), run_number, cached))
    }

    /// Reports whether a cache entry exists for the key.
    ///
    /// Telemetry probe only; [`Self::run_blob`] performs the actual lookup.
    #[must_use]
    pub fn cache_contains(&self, cache_key: &str) -> bool {
        self.cache.get(cache_key).is_some()
    }

    /// Sets the stop time on a run to the current time, first write wins.
    ///
    /// Returns the metadata payload of the record after the update; a
    /// record whose stop time was already set is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when no record exists for the
    /// run and [`RegistryError::WriteFailed`] when the store update fails.
    pub fn update_stop_time(&self, run_number: RunNumber) -> Result<Value, RegistryError> {
        let record = self
            .store
            .update_stop_time(run_number, Timestamp::now())
            .map_err(RegistryError::WriteFailed)?
            .ok_or_else(|| RegistryError::NotFound(format!("no record for run {run_number}")))?;
        Ok(meta_payload(std::slice::from_ref(&record)))
    }

    /// Reports backend readiness.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::QueryFailed`] when the store is unavailable.
    pub fn readiness(&self) -> Result<(), RegistryError> {
        self.store.readiness().map_err(RegistryError::QueryFailed)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects empty required fields.
fn require_field(name: &str, value: &str) -> Result<(), RegistryError> {
    if value.trim().is_empty() {
        return Err(RegistryError::Validation(format!("missing field: {name}")));
    }
    Ok(())
}

/// Maps staging failures onto the service error taxonomy.
fn map_staging_error(error: StagingError) -> RegistryError {
    match error {
        StagingError::Conflict(filename) => RegistryError::StagingConflict(filename),
        StagingError::InvalidExtension(..)
        | StagingError::MissingField(_)
        | StagingError::TooLarge { .. } => RegistryError::Validation(error.to_string()),
        StagingError::Io(message) => RegistryError::WriteFailed(StoreError::Io(message)),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
