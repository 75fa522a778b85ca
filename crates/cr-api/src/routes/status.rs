//! Operator status endpoint.

use axum::{extract::State, routing::get, Json, Router};

use crate::dto::StatusResponse;
use crate::state::AppState;

/// Creates status routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/status", get(engine_status))
}

/// Artifact health, resolved features, policy and priors.
///
/// The runtime prior is read fresh on every call.
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Engine status report", body = StatusResponse)
    ),
    tag = "Status"
)]
pub async fn engine_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse::from(&state.engine.status()))
}
