// crates/run-registry-store-sqlite/src/lib.rs
// ============================================================================
// Module: Run Registry SQLite Store
// Description: Durable RegistryStore backed by SQLite.
// Purpose: Persist run records and blobs with atomic two-statement ingestion.
// Dependencies: run-registry-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! SQLite-backed implementation of the registry storage contract. The
//! ingestion path writes the metadata row and the blob row inside one
//! transaction; reads run as parameterized statements over a small pool of
//! read-only connections.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod store;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use store::DEFAULT_MAX_BLOB_BYTES;
pub use store::SqliteJournalMode;
pub use store::SqliteRegistryStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteSyncMode;
