//! Health check endpoints.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::OnceLock;
use std::time::Instant;

use crate::dto::{label, HealthResponse, PolicyWarningDto, ReconciliationNoteDto};
use cr_core::NoteSeverity;
use crate::state::AppState;

/// Start time for uptime calculation.
static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Initialize the start time.
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Creates health check routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
}

/// Health check endpoint.
///
/// A degraded engine still serves decisions, so this answers 200 either way.
/// The notes that make it degraded are included.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Engine health", body = HealthResponse)
    ),
    tag = "Health"
)]
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0);
    let schema = state.engine.schema();

    Json(HealthResponse {
        status: state.engine.health().as_str().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        feature_count: schema.len(),
        schema_relation: label(&schema.relation()),
        reconciliation_notes: schema
            .notes()
            .iter()
            .filter(|n| n.severity >= NoteSeverity::Warning)
            .map(ReconciliationNoteDto::from)
            .collect(),
        policy_warnings: state
            .engine
            .policy()
            .warnings()
            .iter()
            .map(PolicyWarningDto::from)
            .collect(),
    })
}

/// Kubernetes readiness check.
///
/// The engine is loaded before the server binds, so a running server is ready.
#[utoipa::path(
    get,
    path = "/ready",
    responses(
        (status = 200, description = "Service is ready")
    ),
    tag = "Health"
)]
async fn readiness_check() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes liveness check.
#[utoipa::path(
    get,
    path = "/live",
    responses(
        (status = 200, description = "Service is alive")
    ),
    tag = "Health"
)]
async fn liveness_check() -> StatusCode {
    StatusCode::OK
}
