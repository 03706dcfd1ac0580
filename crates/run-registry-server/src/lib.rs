// crates/run-registry-server/src/lib.rs
// ============================================================================
// Module: Run Registry Server
// Description: HTTP surface and orchestration for the run registry.
// Purpose: Compose auth guard, staging, store, and cache per operation.
// Dependencies: axum, base64, bytes, run-registry-core, run-registry-config,
//               run-registry-store-sqlite, serde, subtle, thiserror, tokio
// ============================================================================

//! ## Overview
//! The server crate wires the registry together: an HTTP Basic auth guard in
//! front of every route, exclusive upload staging, the atomic ingestion path,
//! a read-through blob cache, and deterministic metadata queries. All
//! dependencies are injected into an explicit [`service::RegistryService`];
//! there is no module-level mutable state.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth;
pub mod cache;
pub mod server;
pub mod service;
pub mod staging;
pub mod telemetry;
