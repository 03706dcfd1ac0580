// crates/run-registry-core/src/memory.rs
// ============================================================================
// Module: In-Memory Registry Store
// Description: Map-backed RegistryStore for tests and local fixtures.
// Purpose: Exercise the storage contract without a durable backend.
// Dependencies: crate::store
// ============================================================================

//! ## Overview
//! A [`RegistryStore`] backed by an in-process map. It honors the same
//! contract as durable backends: atomic record+blob insertion, uniqueness of
//! run numbers, descending recency order, and first-write-wins stop times.
//! Intended for unit tests of layers above the store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::identifiers::RunNumber;
use crate::record::NewRun;
use crate::record::RunBlob;
use crate::record::RunRecord;
use crate::store::RegistryStore;
use crate::store::StoreError;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Store
// ============================================================================

/// One stored run: its record plus the blob bytes.
#[derive(Debug, Clone)]
struct StoredRun {
    /// Metadata record.
    record: RunRecord,
    /// Blob bytes.
    blob: Vec<u8>,
}

/// In-memory registry store for tests.
///
/// # Invariants
/// - Insertion of record and blob is atomic under the interior mutex.
/// - Keys are ordered, so recency queries iterate in reverse key order.
#[derive(Debug, Default)]
pub struct InMemoryRegistryStore {
    /// Stored runs keyed by run number.
    runs: Mutex<BTreeMap<u64, StoredRun>>,
}

impl InMemoryRegistryStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the run map, surfacing poisoning as a store error.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<u64, StoredRun>>, StoreError> {
        self.runs.lock().map_err(|_| StoreError::Db("run map mutex poisoned".to_string()))
    }
}

impl RegistryStore for InMemoryRegistryStore {
    fn insert_run(&self, run: &NewRun, blob_bytes: &[u8]) -> Result<(), StoreError> {
        let mut runs = self.lock()?;
        if runs.contains_key(&run.run_number.get()) {
            return Err(StoreError::Conflict(format!(
                "run {} already registered",
                run.run_number
            )));
        }
        runs.insert(run.run_number.get(), StoredRun {
            record: run.clone().into_record(),
            blob: blob_bytes.to_vec(),
        });
        Ok(())
    }

    fn fetch_meta(&self, run_number: RunNumber) -> Result<Option<RunRecord>, StoreError> {
        let runs = self.lock()?;
        Ok(runs.get(&run_number.get()).map(|stored| stored.record.clone()))
    }

    fn fetch_meta_last(&self, amount: u64) -> Result<Vec<RunRecord>, StoreError> {
        let runs = self.lock()?;
        let amount = usize::try_from(amount).unwrap_or(usize::MAX);
        Ok(runs.values().rev().take(amount).map(|stored| stored.record.clone()).collect())
    }

    fn fetch_blob(&self, run_number: RunNumber) -> Result<Option<RunBlob>, StoreError> {
        let runs = self.lock()?;
        Ok(runs.get(&run_number.get()).map(|stored| RunBlob {
            run_number,
            filename: stored.record.filename.clone(),
            bytes: stored.blob.clone(),
        }))
    }

    fn update_stop_time(
        &self,
        run_number: RunNumber,
        stop_time: Timestamp,
    ) -> Result<Option<RunRecord>, StoreError> {
        let mut runs = self.lock()?;
        let Some(stored) = runs.get_mut(&run_number.get()) else {
            return Ok(None);
        };
        if stored.record.stop_time.is_none() {
            stored.record.stop_time = Some(stop_time);
        }
        Ok(Some(stored.record.clone()))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
