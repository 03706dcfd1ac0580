// crates/run-registry-server/src/telemetry.rs
// ============================================================================
// Module: Registry Telemetry
// Description: Observability hooks for registry operations.
// Purpose: Provide metric events and latency buckets without hard deps.
// Dependencies: (none beyond std)
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for registry request
//! counters and latency histograms. It is intentionally dependency-light so
//! downstream deployments can plug in Prometheus or OpenTelemetry without
//! redesign. Labels never carry blob bytes or credentials.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for registry request histograms.
pub const REGISTRY_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Registry operation classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum RegistryOp {
    /// Metadata lookup for one run.
    RunMeta,
    /// Ordered metadata window over recent runs.
    RunMetaLast,
    /// Blob download.
    RunBlob,
    /// Atomic run ingestion.
    InsertRun,
    /// Stop-time update.
    UpdateStopTime,
    /// Liveness or readiness probe.
    Probe,
}

impl RegistryOp {
    /// Returns a stable label for the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RunMeta => "run_meta",
            Self::RunMetaLast => "run_meta_last",
            Self::RunBlob => "run_blob",
            Self::InsertRun => "insert_run",
            Self::UpdateStopTime => "update_stop_time",
            Self::Probe => "probe",
        }
    }
}

/// Registry request outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum RegistryOutcome {
    /// Successful request.
    Ok,
    /// Rejected request (client error).
    Rejected,
    /// Failed request (server error).
    Error,
}

impl RegistryOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Rejected => "rejected",
            Self::Error => "error",
        }
    }
}

/// Registry request metric event payload.
///
/// # Invariants
/// - Optional fields are `None` when the metadata is unavailable.
#[derive(Debug, Clone)]
pub struct RegistryMetricEvent {
    /// Operation classification.
    pub op: RegistryOp,
    /// Request outcome.
    pub outcome: RegistryOutcome,
    /// Run number when the request names one.
    pub run_number: Option<u64>,
    /// Whether the blob cache served the response.
    pub cache_hit: Option<bool>,
    /// Response body size in bytes.
    pub response_bytes: usize,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for registry requests and latencies.
pub trait RegistryMetrics: Send + Sync {
    /// Records a request counter event.
    fn record_request(&self, event: RegistryMetricEvent);
    /// Records a latency observation for the request.
    fn record_latency(&self, event: RegistryMetricEvent, latency: Duration);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
pub struct NoopMetrics;

impl RegistryMetrics for NoopMetrics {
    fn record_request(&self, _event: RegistryMetricEvent) {}

    fn record_latency(&self, _event: RegistryMetricEvent, _latency: Duration) {}
}
