// crates/run-registry-server/src/cache/tests.rs
// ============================================================================
// Module: Blob Cache Unit Tests
// Description: Unit tests for cache hits, canonical keys, and purges.
// Purpose: Validate cache behavior with in-memory fixtures.
// Dependencies: run-registry-server
// ============================================================================

//! ## Overview
//! Exercises canonical key construction, hit/miss behavior, and per-run
//! purge semantics.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions."
)]

use bytes::Bytes;
use run_registry_core::RunNumber;

use super::BlobCache;
use super::CachedBlob;
use super::canonical_key;

fn blob(filename: &str, bytes: &'static [u8]) -> CachedBlob {
    CachedBlob {
        filename: filename.to_string(),
        bytes: Bytes::from_static(bytes),
    }
}

#[test]
fn canonical_key_sorts_query_pairs() {
    let forward = canonical_key(
        "/runregistry/getRunBlob/4",
        &[("b".to_string(), "2".to_string()), ("a".to_string(), "1".to_string())],
    );
    let reversed = canonical_key(
        "/runregistry/getRunBlob/4",
        &[("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())],
    );
    assert_eq!(forward, reversed);
    assert_eq!(forward, "/runregistry/getRunBlob/4?a=1&b=2");
}

#[test]
fn canonical_key_without_query_is_stable() {
    assert_eq!(canonical_key("/runregistry/getRunBlob/4", &[]), "/runregistry/getRunBlob/4?");
}

#[test]
fn insert_then_get_returns_the_cached_blob() {
    let cache = BlobCache::new();
    let key = canonical_key("/runregistry/getRunBlob/4", &[]);
    cache.insert(key.clone(), RunNumber::new(4), blob("conf.tar.gz", b"ABC"));
    let hit = cache.get(&key).expect("cache hit");
    assert_eq!(hit.filename, "conf.tar.gz");
    assert_eq!(hit.bytes.as_ref(), b"ABC");
}

#[test]
fn miss_returns_none() {
    let cache = BlobCache::new();
    assert!(cache.get("/runregistry/getRunBlob/9?").is_none());
}

#[test]
fn purge_removes_every_entry_for_the_run() {
    let cache = BlobCache::new();
    cache.insert("/a?".to_string(), RunNumber::new(4), blob("a.gz", b"a"));
    cache.insert("/b?".to_string(), RunNumber::new(4), blob("b.gz", b"b"));
    cache.insert("/c?".to_string(), RunNumber::new(5), blob("c.gz", b"c"));
    cache.purge_run(RunNumber::new(4));
    assert!(cache.get("/a?").is_none());
    assert!(cache.get("/b?").is_none());
    assert!(cache.get("/c?").is_some());
    assert_eq!(cache.len(), 1);
}

#[test]
fn purge_of_unknown_run_is_a_no_op() {
    let cache = BlobCache::new();
    cache.insert("/a?".to_string(), RunNumber::new(4), blob("a.gz", b"a"));
    cache.purge_run(RunNumber::new(99));
    assert_eq!(cache.len(), 1);
}

#[test]
fn reinsert_under_same_key_replaces_the_entry() {
    let cache = BlobCache::new();
    cache.insert("/a?".to_string(), RunNumber::new(4), blob("a.gz", b"old"));
    cache.insert("/a?".to_string(), RunNumber::new(4), blob("a.gz", b"new"));
    let hit = cache.get("/a?").expect("cache hit");
    assert_eq!(hit.bytes.as_ref(), b"new");
    assert_eq!(cache.len(), 1);
}
