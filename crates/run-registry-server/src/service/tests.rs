// crates/run-registry-server/src/service/tests.rs
// ============================================================================
// Module: Registry Service Unit Tests
// Description: Unit tests for the operation layer over an in-memory store.
// Purpose: Validate ingestion, queries, caching, and stop-time semantics.
// Dependencies: run-registry-core, run-registry-server, tempfile
// ============================================================================

//! ## Overview
//! Exercises the service layer against [`InMemoryRegistryStore`] fixtures:
//! ingestion with confirmation read-back, cache invalidation, read-through
//! blob caching, and error kind mapping.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions."
)]

use std::sync::Arc;

use bytes::Bytes;
use run_registry_core::InMemoryRegistryStore;
use run_registry_core::META_COLUMNS;
use run_registry_core::NewRun;
use run_registry_core::RegistryError;
use run_registry_core::RegistryStore;
use run_registry_core::RunBlob;
use run_registry_core::RunNumber;
use run_registry_core::RunRecord;
use run_registry_core::StoreError;
use run_registry_core::Timestamp;
use serde_json::json;
use tempfile::TempDir;

use super::InsertRunRequest;
use super::RegistryService;
use crate::cache::BlobCache;
use crate::cache::canonical_key;
use crate::staging::StagingArea;

/// Store that rejects every operation with an engine fault.
struct FailingStore;

impl RegistryStore for FailingStore {
    fn insert_run(&self, _run: &NewRun, _blob_bytes: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::Db("store down".to_string()))
    }

    fn fetch_meta(&self, _run_number: RunNumber) -> Result<Option<RunRecord>, StoreError> {
        Err(StoreError::Db("store down".to_string()))
    }

    fn fetch_meta_last(&self, _amount: u64) -> Result<Vec<RunRecord>, StoreError> {
        Err(StoreError::Db("store down".to_string()))
    }

    fn fetch_blob(&self, _run_number: RunNumber) -> Result<Option<RunBlob>, StoreError> {
        Err(StoreError::Db("store down".to_string()))
    }

    fn update_stop_time(
        &self,
        _run_number: RunNumber,
        _stop_time: Timestamp,
    ) -> Result<Option<RunRecord>, StoreError> {
        Err(StoreError::Db("store down".to_string()))
    }
}

fn service(dir: &TempDir) -> RegistryService {
    let staging = StagingArea::new(
        dir.path().join("uploads"),
        vec![".gz".to_string(), ".tgz".to_string()],
        1024,
    )
    .expect("staging area");
    RegistryService::new(
        Arc::new(InMemoryRegistryStore::new()),
        Arc::new(BlobCache::new()),
        Arc::new(staging),
    )
}

fn failing_service(dir: &TempDir) -> RegistryService {
    let staging = StagingArea::new(
        dir.path().join("uploads"),
        vec![".gz".to_string(), ".tgz".to_string()],
        1024,
    )
    .expect("staging area");
    RegistryService::new(Arc::new(FailingStore), Arc::new(BlobCache::new()), Arc::new(staging))
}

fn request(run: u64) -> InsertRunRequest {
    InsertRunRequest {
        run_number: RunNumber::new(run),
        det_id: "HD".to_string(),
        run_type: "TEST".to_string(),
        software_version: "v1.2.3".to_string(),
        filename: format!("conf-{run}.tar.gz"),
        bytes: Bytes::from_static(b"ABC"),
    }
}

#[test]
fn insert_run_returns_the_confirmed_record_payload() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir);
    let payload = service.insert_run(&request(4)).expect("insert");
    let rows = payload.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], json!(META_COLUMNS));
    let row = rows[1].as_array().unwrap();
    assert_eq!(row[0], json!(4));
    assert_eq!(row[1], json!("HD"));
    assert_eq!(row[6], json!(null));
}

#[test]
fn duplicate_run_number_is_a_write_conflict() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir);
    service.insert_run(&request(4)).expect("first insert");
    let mut retry = request(4);
    retry.filename = "retry.tar.gz".to_string();
    let error = service.insert_run(&retry).unwrap_err();
    assert!(matches!(error, RegistryError::WriteFailed(StoreError::Conflict(_))));
    assert!(error.is_client_error());
}

#[test]
fn staging_slot_is_released_after_a_failed_insert() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir);
    service.insert_run(&request(4)).expect("first insert");
    // Same filename as run 4 to prove the slot was released after success,
    // then again after the duplicate-run failure.
    let mut duplicate = request(5);
    duplicate.filename = "conf-4.tar.gz".to_string();
    duplicate.run_number = RunNumber::new(4);
    assert!(service.insert_run(&duplicate).is_err());
    let mut fresh = request(6);
    fresh.filename = "conf-4.tar.gz".to_string();
    service.insert_run(&fresh).expect("slot released after failure");
}

#[test]
fn missing_required_field_is_a_validation_error() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir);
    let mut missing = request(4);
    missing.det_id = String::new();
    let error = service.insert_run(&missing).unwrap_err();
    assert!(matches!(error, RegistryError::Validation(_)));
}

#[test]
fn disallowed_extension_is_a_validation_error() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir);
    let mut bad = request(4);
    bad.filename = "conf.zip".to_string();
    let error = service.insert_run(&bad).unwrap_err();
    assert!(matches!(error, RegistryError::Validation(_)));
}

#[test]
fn run_meta_of_missing_run_is_schema_only() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir);
    let payload = service.run_meta(RunNumber::new(9)).expect("query");
    assert_eq!(payload, json!([META_COLUMNS]));
}

#[test]
fn run_meta_last_orders_descending_and_bounds_the_window() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir);
    for run in [3_u64, 4, 5] {
        service.insert_run(&request(run)).expect("insert");
    }
    let payload = service.run_meta_last(2).expect("query");
    let rows = payload.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1].as_array().unwrap()[0], json!(5));
    assert_eq!(rows[2].as_array().unwrap()[0], json!(4));
}

#[test]
fn run_blob_reads_through_and_then_hits_the_cache() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir);
    service.insert_run(&request(4)).expect("insert");
    let key = canonical_key("/runregistry/getRunBlob/4", &[]);
    let first = service.run_blob(RunNumber::new(4), &key).expect("read-through");
    assert_eq!(first.filename, "conf-4.tar.gz");
    assert_eq!(first.bytes.as_ref(), b"ABC");
    let second = service.run_blob(RunNumber::new(4), &key).expect("cache hit");
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn missing_blob_is_not_found() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir);
    let key = canonical_key("/runregistry/getRunBlob/9", &[]);
    let error = service.run_blob(RunNumber::new(9), &key).unwrap_err();
    assert!(matches!(error, RegistryError::NotFound(_)));
}

#[test]
fn stop_time_is_set_once_and_then_frozen() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir);
    service.insert_run(&request(4)).expect("insert");
    let first = service.update_stop_time(RunNumber::new(4)).expect("first stop");
    let stop = first.as_array().unwrap()[1].as_array().unwrap()[6].clone();
    assert!(stop.is_number());
    let second = service.update_stop_time(RunNumber::new(4)).expect("second stop");
    assert_eq!(second.as_array().unwrap()[1].as_array().unwrap()[6], stop);
}

#[test]
fn stop_time_store_fault_is_a_write_failure() {
    let dir = TempDir::new().unwrap();
    let service = failing_service(&dir);
    let error = service.update_stop_time(RunNumber::new(4)).unwrap_err();
    assert!(matches!(error, RegistryError::WriteFailed(StoreError::Db(_))));
    assert!(!error.is_client_error());
}

#[test]
fn stop_time_of_missing_run_is_not_found() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir);
    let error = service.update_stop_time(RunNumber::new(9)).unwrap_err();
    assert!(matches!(error, RegistryError::NotFound(_)));
}

#[test]
fn readiness_delegates_to_the_store() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir);
    service.readiness().expect("ready");
}
