// crates/run-registry-server/src/server.rs
// ============================================================================
// Module: Registry HTTP Surface
// Description: Axum router, handlers, and error mapping for the registry.
// Purpose: Expose registry operations over authenticated HTTP routes.
// Dependencies: axum, bytes, run-registry-config, run-registry-store-sqlite
// ============================================================================

//! ## Overview
//! The HTTP surface is a thin translation layer: handlers decode the
//! request, call one [`RegistryService`] operation, and encode the result.
//! Every `/runregistry` route sits behind the Basic-auth middleware; only
//! the liveness and readiness probes are open.
//!
//! Error mapping is fixed by kind: bad credentials give 401 with a
//! `WWW-Authenticate` challenge, validation failures 400, staging and
//! duplicate-run conflicts 409, missing records 404, and storage faults
//! 500. Bodies are JSON objects with a single `error` field.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::extract::Multipart;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::Request;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::http::header::CONTENT_DISPOSITION;
use axum::http::header::CONTENT_TYPE;
use axum::http::header::WWW_AUTHENTICATE;
use axum::middleware;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use bytes::Bytes;
use run_registry_config::RegistryConfig;
use run_registry_core::RegistryError;
use run_registry_core::RunNumber;
use run_registry_core::StoreError;
use run_registry_store_sqlite::SqliteRegistryStore;
use run_registry_store_sqlite::SqliteStoreError;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::auth::CredentialStore;
use crate::cache::BlobCache;
use crate::cache::canonical_key;
use crate::service::InsertRunRequest;
use crate::service::RegistryService;
use crate::staging::StagingArea;
use crate::staging::StagingError;
use crate::telemetry::NoopMetrics;
use crate::telemetry::RegistryMetricEvent;
use crate::telemetry::RegistryMetrics;
use crate::telemetry::RegistryOp;
use crate::telemetry::RegistryOutcome;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server assembly and serve-loop errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Storage backend could not be opened.
    #[error("store error: {0}")]
    Store(#[from] SqliteStoreError),
    /// Staging area could not be created.
    #[error("staging error: {0}")]
    Staging(#[from] StagingError),
    /// Bind address is invalid.
    #[error("invalid bind address: {0}")]
    Bind(String),
    /// Listener or serve-loop I/O failure.
    #[error("server io error: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Application State
// ============================================================================

/// Shared state injected into every handler.
///
/// # Invariants
/// - All collaborators are constructor-injected; no global singletons.
#[derive(Clone)]
pub struct AppState {
    /// Registry operation layer.
    pub service: RegistryService,
    /// Basic-auth credential store.
    pub credentials: CredentialStore,
    /// Metrics sink.
    pub metrics: Arc<dyn RegistryMetrics>,
}

impl AppState {
    /// Records a counter and latency observation for one request.
    fn observe(
        &self,
        op: RegistryOp,
        outcome: RegistryOutcome,
        run_number: Option<u64>,
        cache_hit: Option<bool>,
        response_bytes: usize,
        started: Instant,
    ) {
        let event = RegistryMetricEvent {
            op,
            outcome,
            run_number,
            cache_hit,
            response_bytes,
        };
        self.metrics.record_request(event.clone());
        self.metrics.record_latency(event, started.elapsed());
    }
}

// ============================================================================
// SECTION: Error Mapping
// ============================================================================

/// HTTP-facing wrapper around [`RegistryError`].
#[derive(Debug)]
pub struct ApiError(RegistryError);

impl From<RegistryError> for ApiError {
    fn from(error: RegistryError) -> Self {
        Self(error)
    }
}

impl ApiError {
    /// Returns the response status for the wrapped error kind.
    #[must_use]
    fn status(&self) -> StatusCode {
        match &self.0 {
            RegistryError::Unauthenticated => StatusCode::UNAUTHORIZED,
            RegistryError::Validation(_) => StatusCode::BAD_REQUEST,
            RegistryError::StagingConflict(_) => StatusCode::CONFLICT,
            RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::WriteFailed(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            RegistryError::WriteFailed(_) | RegistryError::QueryFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the metric outcome label for the wrapped error kind.
    #[must_use]
    fn outcome(&self) -> RegistryOutcome {
        if self.0.is_client_error() {
            RegistryOutcome::Rejected
        } else {
            RegistryOutcome::Error
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.0.to_string() }));
        if status == StatusCode::UNAUTHORIZED {
            (status, [(WWW_AUTHENTICATE, "Basic realm=\"run-registry\"")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

// ============================================================================
// SECTION: Middleware
// ============================================================================

/// Rejects requests without valid Basic credentials.
async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.credentials.verify_headers(request.headers()) {
        next.run(request).await
    } else {
        ApiError::from(RegistryError::Unauthenticated).into_response()
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the registry router over the given state.
///
/// Registry routes are gated by the auth middleware; `/health` and
/// `/ready` are open so orchestration probes need no credentials.
#[must_use]
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let protected = Router::new()
        .route("/runregistry/getRunMeta/{run_number}", get(get_run_meta))
        .route("/runregistry/getRunMetaLast/{amount}", get(get_run_meta_last))
        .route("/runregistry/getRunBlob/{run_number}", get(get_run_blob))
        .route("/runregistry/insertRun/", post(insert_run))
        .route("/runregistry/updateStopTime/{run_number}", get(update_stop_time))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));
    Router::new()
        .merge(protected)
        .route("/health", get(health))
        .route("/ready", get(ready))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Returns the metadata payload for one run number.
async fn get_run_meta(
    State(state): State<AppState>,
    Path(run_number): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let result = state.service.run_meta(RunNumber::new(run_number));
    respond_meta(&state, RegistryOp::RunMeta, Some(run_number), started, result)
}

/// Returns the metadata payload for the most recent runs.
async fn get_run_meta_last(
    State(state): State<AppState>,
    Path(amount): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let result = state.service.run_meta_last(amount);
    respond_meta(&state, RegistryOp::RunMetaLast, None, started, result)
}

/// Streams the configuration blob for a run as an attachment download.
async fn get_run_blob(
    State(state): State<AppState>,
    Path(run_number): Path<u64>,
    uri: Uri,
    Query(query_pairs): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let key = canonical_key(uri.path(), &query_pairs);
    let was_cached = state.service.cache_contains(&key);
    match state.service.run_blob(RunNumber::new(run_number), &key) {
        Ok(blob) => {
            state.observe(
                RegistryOp::RunBlob,
                RegistryOutcome::Ok,
                Some(run_number),
                Some(was_cached),
                blob.bytes.len(),
                started,
            );
            let disposition = format!("attachment; filename=\"{}\"", blob.filename);
            Ok((
                [
                    (CONTENT_TYPE, "application/octet-stream".to_string()),
                    (CONTENT_DISPOSITION, disposition),
                ],
                blob.bytes.clone(),
            )
                .into_response())
        }
        Err(error) => {
            let error = ApiError::from(error);
            state.observe(
                RegistryOp::RunBlob,
                error.outcome(),
                Some(run_number),
                Some(false),
                0,
                started,
            );
            Err(error)
        }
    }
}

/// Ingests a new run from a multipart form.
///
/// Expected fields: `run_num`, `det_id`, `run_type`, `software_version`,
/// and `file` (the configuration archive).
async fn insert_run(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let request = decode_insert_form(multipart).await?;
    let run_number = request.run_number.get();
    let result = state.service.insert_run(&request);
    respond_meta(&state, RegistryOp::InsertRun, Some(run_number), started, result)
}

/// Sets the stop time of a run to the current time, first write wins.
async fn update_stop_time(
    State(state): State<AppState>,
    Path(run_number): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    let started = Instant::now();
    let result = state.service.update_stop_time(RunNumber::new(run_number));
    respond_meta(&state, RegistryOp::UpdateStopTime, Some(run_number), started, result)
}

/// Liveness probe.
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness probe; checks the storage backend.
async fn ready(State(state): State<AppState>) -> Response {
    match state.service.readiness() {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))).into_response(),
        Err(error) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": error.to_string() })),
        )
            .into_response(),
    }
}

// ============================================================================
// SECTION: Handler Helpers
// ============================================================================

/// Encodes a metadata result and records its metric observation.
fn respond_meta(
    state: &AppState,
    op: RegistryOp,
    run_number: Option<u64>,
    started: Instant,
    result: Result<Value, RegistryError>,
) -> Result<Json<Value>, ApiError> {
    match result {
        Ok(payload) => {
            let response_bytes = payload.to_string().len();
            state.observe(op, RegistryOutcome::Ok, run_number, None, response_bytes, started);
            Ok(Json(payload))
        }
        Err(error) => {
            let error = ApiError::from(error);
            state.observe(op, error.outcome(), run_number, None, 0, started);
            Err(error)
        }
    }
}

/// Decodes the multipart ingestion form into a service request.
async fn decode_insert_form(mut multipart: Multipart) -> Result<InsertRunRequest, ApiError> {
    let mut run_num: Option<String> = None;
    let mut det_id: Option<String> = None;
    let mut run_type: Option<String> = None;
    let mut software_version: Option<String> = None;
    let mut file: Option<(String, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| RegistryError::Validation(format!("malformed multipart body: {err}")))?
    {
        let Some(name) = field.name().map(ToString::to_string) else {
            continue;
        };
        match name.as_str() {
            "run_num" => run_num = Some(read_text_field(field, "run_num").await?),
            "det_id" => det_id = Some(read_text_field(field, "det_id").await?),
            "run_type" => run_type = Some(read_text_field(field, "run_type").await?),
            "software_version" => {
                software_version = Some(read_text_field(field, "software_version").await?);
            }
            "file" => {
                let filename = field
                    .file_name()
                    .map(ToString::to_string)
                    .ok_or_else(|| missing_field("file"))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| RegistryError::Validation(format!("unreadable file: {err}")))?;
                file = Some((filename, bytes));
            }
            _ => {}
        }
    }
    let run_num = run_num.ok_or_else(|| missing_field("run_num"))?;
    let run_number = run_num
        .trim()
        .parse::<u64>()
        .map_err(|_| RegistryError::Validation(format!("invalid run_num: {run_num}")))?;
    let (filename, bytes) = file.ok_or_else(|| missing_field("file"))?;
    Ok(InsertRunRequest {
        run_number: RunNumber::new(run_number),
        det_id: det_id.ok_or_else(|| missing_field("det_id"))?,
        run_type: run_type.ok_or_else(|| missing_field("run_type"))?,
        software_version: software_version.ok_or_else(|| missing_field("software_version"))?,
        filename,
        bytes,
    })
}

/// Reads a text multipart field.
async fn read_text_field(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|err| RegistryError::Validation(format!("unreadable {name}: {err}")).into())
}

/// Builds the missing-field validation error.
fn missing_field(name: &str) -> RegistryError {
    RegistryError::Validation(format!("missing field: {name}"))
}

// ============================================================================
// SECTION: Server Assembly
// ============================================================================

/// Assembles the application state from validated configuration.
///
/// # Errors
///
/// Returns [`ServeError`] when the store or staging area cannot be opened.
pub fn build_state(config: &RegistryConfig) -> Result<AppState, ServeError> {
    let store = SqliteRegistryStore::new(config.store.clone())?;
    let staging = StagingArea::new(
        config.server.staging_path.clone(),
        config.server.allowed_extensions.clone(),
        config.server.max_upload_bytes,
    )?;
    let service = RegistryService::new(
        Arc::new(store),
        Arc::new(BlobCache::new()),
        Arc::new(staging),
    );
    Ok(AppState {
        service,
        credentials: CredentialStore::from_config(&config.auth),
        metrics: Arc::new(NoopMetrics),
    })
}

/// Binds the configured address and serves the registry until shutdown.
///
/// # Errors
///
/// Returns [`ServeError`] when assembly, binding, or serving fails.
pub async fn run(config: RegistryConfig) -> Result<(), ServeError> {
    let bind = config
        .server
        .bind
        .parse::<std::net::SocketAddr>()
        .map_err(|err| ServeError::Bind(err.to_string()))?;
    let max_upload_bytes = config.server.max_upload_bytes;
    let state = build_state(&config)?;
    let router = build_router(state, max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|err| ServeError::Io(err.to_string()))?;
    axum::serve(listener, router).await.map_err(|err| ServeError::Io(err.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
