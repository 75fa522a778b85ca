//! Scoring endpoint.

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    routing::post,
    Extension, Json, Router,
};
use cr_core::{AttributionStatus, ScoreResponse};
use cr_observability::{score_span, DecisionAuditEntry, ScoreObservation};
use std::time::Instant;
use tracing::{debug, error};
use validator::Validate;

use crate::dto::{ScoreRequest, ScoreResponseDto};
use crate::error::ApiError;
use crate::middleware::RequestId;
use crate::state::AppState;

/// Creates scoring routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/score", post(score))
}

/// Scores one applicant.
///
/// Data-quality problems never fail the request: they are absorbed and
/// reported in `missing_features`, `coerced_features` and `notes`.
#[utoipa::path(
    post,
    path = "/score",
    request_body = ScoreRequest,
    responses(
        (status = 200, description = "Decision for the applicant", body = ScoreResponseDto),
        (status = 400, description = "Malformed request", body = crate::error::ErrorResponse),
        (status = 422, description = "Invalid option", body = crate::error::ErrorResponse),
        (status = 500, description = "Classifier failure", body = crate::error::ErrorResponse)
    ),
    tag = "Scoring"
)]
pub async fn score(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    payload: Result<Json<ScoreRequest>, JsonRejection>,
) -> Response {
    let request_id = request_id.map(|Extension(RequestId(id))| id);

    match score_request(&state, request_id.as_deref(), payload) {
        Ok(dto) => Json(dto).into_response(),
        Err(err) => {
            if let ApiError::Classifier(reason) = &err {
                error!(request_id = ?request_id, reason = %reason, "Classifier failed");
            }
            state.metrics.record_error(err.metric_label());
            err.into_response_with_id(request_id)
        }
    }
}

fn score_request(
    state: &AppState,
    request_id: Option<&str>,
    payload: Result<Json<ScoreRequest>, JsonRejection>,
) -> Result<ScoreResponseDto, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    request.validate()?;
    let options = request.options()?;

    let start = Instant::now();
    let span = score_span!(request_id.unwrap_or("unknown"));
    let response = span.in_scope(|| state.engine.score(&request.features, options))?;
    let duration = start.elapsed();

    state.metrics.record_score(&ScoreObservation {
        decision: response.decision.as_str(),
        missing_features: response.missing_features.len(),
        prior_shift_applied: response.prior_shift.applied,
        sparsity_downgraded: response.policy.sparsity_downgraded,
        attribution_failed: matches!(response.attribution_status, AttributionStatus::Failed(_)),
        duration,
    });
    state.auditor.record(&audit_entry(&response, request_id));

    debug!(
        request_id = ?request_id,
        decision = response.decision.as_str(),
        score = response.score,
        notes = response.notes.len(),
        "Scored request"
    );

    Ok(ScoreResponseDto::from_response(
        &response,
        request_id.map(str::to_string),
    ))
}

fn audit_entry(response: &ScoreResponse, request_id: Option<&str>) -> DecisionAuditEntry {
    DecisionAuditEntry::builder(response.decision.as_str())
        .request_id(request_id.map(str::to_string))
        .tentative_decision(response.policy.tentative.as_str())
        .pd(response.pd_raw, response.pd_adjusted, response.prior_shift.applied)
        .score(response.score)
        .sparsity_downgraded(response.policy.sparsity_downgraded)
        .policy(response.audit.policy_mode.clone(), response.policy.flagged)
        .versions(
            response.audit.model_version.clone(),
            response.audit.schema_version.clone(),
        )
        .feature_quality(
            response.missing_features.len(),
            response.coerced_features.len(),
        )
        .build()
}
