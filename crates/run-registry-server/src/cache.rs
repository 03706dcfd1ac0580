// crates/run-registry-server/src/cache.rs
// ============================================================================
// Module: Blob Cache
// Description: Read-through cache in front of blob downloads.
// Purpose: Serve repeated blob requests without touching the store.
// Dependencies: bytes, run-registry-core
// ============================================================================

//! ## Overview
//! Blob downloads are cached by canonical request identity: the request path
//! plus its query parameters sorted by key and value. Concurrent misses for
//! the same key may each query the store and populate independently; the
//! computed value is deterministic, so the duplicate work is harmless and
//! needs no serialization.
//!
//! Entries are indexed per run number so ingestion can purge them: a blob
//! re-ingested under the same run number is never served stale.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use bytes::Bytes;
use run_registry_core::RunNumber;

// ============================================================================
// SECTION: Cache Types
// ============================================================================

/// Cached blob response: filename plus raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBlob {
    /// Attachment filename for the download.
    pub filename: String,
    /// Raw blob bytes.
    pub bytes: Bytes,
}

/// Interior cache state guarded by one mutex.
#[derive(Debug, Default)]
struct CacheInner {
    /// Cached responses keyed by canonical request identity.
    entries: HashMap<String, Arc<CachedBlob>>,
    /// Keys per run number, used for ingestion-time purges.
    run_index: HashMap<u64, Vec<String>>,
}

/// Read-through cache for blob downloads.
///
/// # Invariants
/// - Keys are canonical request identities (see [`canonical_key`]).
/// - Every entry is reachable from the run index of its run number.
#[derive(Debug, Default)]
pub struct BlobCache {
    /// Guarded cache state.
    inner: Mutex<CacheInner>,
}

impl BlobCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached response for a key, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<CachedBlob>> {
        let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.entries.get(key).cloned()
    }

    /// Stores a response under a key and indexes it by run number.
    ///
    /// Idempotent for deterministic values: concurrent misses may insert the
    /// same value; the last write wins with identical content.
    pub fn insert(&self, key: String, run_number: RunNumber, blob: CachedBlob) -> Arc<CachedBlob> {
        let blob = Arc::new(blob);
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let keys = inner.run_index.entry(run_number.get()).or_default();
        if !keys.contains(&key) {
            keys.push(key.clone());
        }
        inner.entries.insert(key, Arc::clone(&blob));
        blob
    }

    /// Removes every cached entry for a run number.
    ///
    /// Called by the ingestion path so re-ingested blobs invalidate their
    /// cached predecessors.
    pub fn purge_run(&self, run_number: RunNumber) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(keys) = inner.run_index.remove(&run_number.get()) {
            for key in keys {
                inner.entries.remove(&key);
            }
        }
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.entries.len()
    }

    /// Returns true when the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// SECTION: Canonical Keys
// ============================================================================

/// Builds the canonical cache key for a request path and query pairs.
///
/// Query pairs are sorted by key, then value, so parameter order on the
/// wire does not split the cache.
#[must_use]
pub fn canonical_key(path: &str, query_pairs: &[(String, String)]) -> String {
    let mut pairs: Vec<&(String, String)> = query_pairs.iter().collect();
    pairs.sort();
    let encoded: Vec<String> =
        pairs.iter().map(|(key, value)| format!("{key}={value}")).collect();
    format!("{path}?{}", encoded.join("&"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
