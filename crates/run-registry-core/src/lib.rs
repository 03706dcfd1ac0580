// crates/run-registry-core/src/lib.rs
// ============================================================================
// Module: Run Registry Core
// Description: Identifiers, record model, errors, and the storage interface.
// Purpose: Define the backend-agnostic contract surfaces of the run registry.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Core types for the run registry: the [`RunNumber`] identifier, the
//! [`RunRecord`] / [`RunBlob`] data model with its ordered schema descriptor,
//! the [`RegistryStore`] interface, and the service-level error taxonomy.
//! Storage backends and the HTTP surface build on these types without this
//! crate depending on either.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod error;
mod identifiers;
mod memory;
mod record;
mod store;
mod time;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use error::RegistryError;
pub use identifiers::RunNumber;
pub use memory::InMemoryRegistryStore;
pub use record::META_COLUMNS;
pub use record::NewRun;
pub use record::RunBlob;
pub use record::RunRecord;
pub use record::meta_payload;
pub use store::RegistryStore;
pub use store::SharedRegistryStore;
pub use store::StoreError;
pub use time::Timestamp;
