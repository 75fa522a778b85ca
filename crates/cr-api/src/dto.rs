//! Data Transfer Objects for the API.

use chrono::{DateTime, Utc};
use cr_core::{
    Attribution, AttributionStatus, AuditMetadata, EngineStatus, FeatureMap, Locale,
    PolicyMode, PolicyOutcome, PolicyWarning, PriorShiftOutcome, Reason, ReconciliationNote,
    RequestNote, ScoreOptions, ScoreResponse, ThresholdEquivalents,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::ApiError;

/// Lowercase wire label of a unit-like enum.
pub(crate) fn label<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

// ============================================================================
// Scoring DTOs
// ============================================================================

/// Request to score one applicant.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ScoreRequest {
    /// Named feature values. Unknown names are ignored; absent names are zero.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub features: FeatureMap,
    /// Whether to compute the top-K attribution.
    #[serde(default = "default_return_explain")]
    pub return_explain: bool,
    /// Override for the number of attributions returned.
    #[validate(range(min = 1, max = 50))]
    pub top_k: Option<usize>,
    /// Render reasons in this language (`en` or `vi`).
    #[schema(example = "en")]
    pub locale: Option<String>,
}

fn default_return_explain() -> bool {
    true
}

impl ScoreRequest {
    /// Engine options for this request.
    pub fn options(&self) -> Result<ScoreOptions, ApiError> {
        let locale = match self.locale.as_deref() {
            Some(raw) => Some(raw.parse::<Locale>().map_err(|_| {
                ApiError::validation_field(
                    "locale",
                    "invalid_locale",
                    &format!("Unsupported locale '{}', expected 'en' or 'vi'", raw),
                )
            })?),
            None => None,
        };
        Ok(ScoreOptions {
            return_explain: self.return_explain,
            top_k: self.top_k,
            locale,
        })
    }
}

/// Scoring result.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScoreResponseDto {
    /// Correlation ID of this request.
    pub request_id: Option<String>,
    /// PD the decision was made on.
    pub pd: f64,
    pub pd_raw: f64,
    pub pd_adjusted: f64,
    pub prior_shift: PriorShiftDto,
    /// Score in [300, 900].
    pub score: i32,
    /// Final decision (`approve`, `review` or `reject`).
    pub decision: String,
    pub policy: PolicyOutcomeDto,
    pub missing_features: Vec<String>,
    pub coerced_features: Vec<String>,
    pub attributions: Vec<AttributionDto>,
    pub attribution_status: AttributionStatusDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasons: Option<Vec<ReasonDto>>,
    pub notes: Vec<RequestNoteDto>,
    pub audit: AuditDto,
}

impl ScoreResponseDto {
    pub fn from_response(response: &ScoreResponse, request_id: Option<String>) -> Self {
        Self {
            request_id,
            pd: response.pd,
            pd_raw: response.pd_raw,
            pd_adjusted: response.pd_adjusted,
            prior_shift: PriorShiftDto::from(&response.prior_shift),
            score: response.score,
            decision: response.decision.as_str().to_string(),
            policy: PolicyOutcomeDto::from(&response.policy),
            missing_features: response.missing_features.clone(),
            coerced_features: response.coerced_features.clone(),
            attributions: response.attributions.iter().map(AttributionDto::from).collect(),
            attribution_status: AttributionStatusDto::from(&response.attribution_status),
            reasons: response
                .reasons
                .as_ref()
                .map(|reasons| reasons.iter().map(ReasonDto::from).collect()),
            notes: response.notes.iter().map(RequestNoteDto::from).collect(),
            audit: AuditDto::from(&response.audit),
        }
    }
}

/// What the prior-shift calibrator did.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PriorShiftDto {
    pub applied: bool,
    pub pi_train: Option<f64>,
    pub pi_target: Option<f64>,
    /// Why the shift was skipped, if it was.
    pub skipped: Option<String>,
}

impl From<&PriorShiftOutcome> for PriorShiftDto {
    fn from(outcome: &PriorShiftOutcome) -> Self {
        Self {
            applied: outcome.applied,
            pi_train: outcome.pi_train,
            pi_target: outcome.pi_target,
            skipped: outcome.skipped.as_ref().map(label),
        }
    }
}

/// Policy evaluation details.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PolicyOutcomeDto {
    pub decision: String,
    /// Decision before the sparsity gate.
    pub tentative_decision: String,
    pub sparsity_downgraded: bool,
    pub nonzero_features: usize,
    /// Set when the thresholds are misconfigured.
    pub flagged: bool,
    /// Set when the classifier could not score and the decision was capped at review.
    pub held_for_review: bool,
}

impl From<&PolicyOutcome> for PolicyOutcomeDto {
    fn from(outcome: &PolicyOutcome) -> Self {
        Self {
            decision: outcome.decision.as_str().to_string(),
            tentative_decision: outcome.tentative.as_str().to_string(),
            sparsity_downgraded: outcome.sparsity_downgraded,
            nonzero_features: outcome.nonzero_features,
            flagged: outcome.flagged,
            held_for_review: outcome.held_for_review,
        }
    }
}

/// One feature's contribution.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttributionDto {
    pub feature: String,
    pub value: f64,
    pub contribution: f64,
    pub abs_contribution: f64,
    /// `up` raises risk, `down` lowers it.
    pub direction: String,
}

impl From<&Attribution> for AttributionDto {
    fn from(a: &Attribution) -> Self {
        Self {
            feature: a.feature.clone(),
            value: a.value,
            contribution: a.contribution,
            abs_contribution: a.abs_contribution,
            direction: label(&a.direction),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttributionStatusDto {
    /// `available`, `unavailable`, `skipped` or `failed`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&AttributionStatus> for AttributionStatusDto {
    fn from(status: &AttributionStatus) -> Self {
        let (status, reason) = match status {
            AttributionStatus::Available => ("available", None),
            AttributionStatus::Unavailable => ("unavailable", None),
            AttributionStatus::Skipped => ("skipped", None),
            AttributionStatus::Failed(reason) => ("failed", Some(reason.clone())),
        };
        Self {
            status: status.to_string(),
            reason,
        }
    }
}

/// Human-readable reason.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReasonDto {
    pub feature: String,
    pub title: String,
    pub text: String,
    pub direction: String,
}

impl From<&Reason> for ReasonDto {
    fn from(r: &Reason) -> Self {
        Self {
            feature: r.feature.clone(),
            title: r.title.clone(),
            text: r.text.clone(),
            direction: label(&r.direction),
        }
    }
}

/// A recoverable condition absorbed while scoring.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RequestNoteDto {
    pub kind: String,
    pub message: String,
}

impl From<&RequestNote> for RequestNoteDto {
    fn from(note: &RequestNote) -> Self {
        Self {
            kind: label(&note.kind),
            message: note.message.clone(),
        }
    }
}

/// Artifact and policy identity.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditDto {
    pub model_version: Option<String>,
    pub schema_version: Option<String>,
    pub policy: PolicyDto,
    pub policy_warnings: Vec<PolicyWarningDto>,
    pub schema_relation: String,
    pub reconciliation_notes: Vec<ReconciliationNoteDto>,
    pub feature_count: usize,
}

impl From<&AuditMetadata> for AuditDto {
    fn from(audit: &AuditMetadata) -> Self {
        Self {
            model_version: audit.model_version.clone(),
            schema_version: audit.schema_version.clone(),
            policy: PolicyDto::new(&audit.policy, audit.min_nonzero_features),
            policy_warnings: audit.policy_warnings.iter().map(PolicyWarningDto::from).collect(),
            schema_relation: label(&audit.schema_relation),
            reconciliation_notes: audit
                .reconciliation_notes
                .iter()
                .map(ReconciliationNoteDto::from)
                .collect(),
            feature_count: audit.feature_count,
        }
    }
}

// ============================================================================
// Policy / Schema DTOs
// ============================================================================

/// Active decision policy. Only the threshold pair of the active mode is set.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PolicyDto {
    /// `pd` or `score`.
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approve_max_pd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_max_pd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approve_min_score: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_min_score: Option<i32>,
    pub min_nonzero_features: usize,
}

impl PolicyDto {
    pub fn new(mode: &PolicyMode, min_nonzero_features: usize) -> Self {
        let mut dto = Self {
            mode: mode.name().to_string(),
            approve_max_pd: None,
            review_max_pd: None,
            approve_min_score: None,
            review_min_score: None,
            min_nonzero_features,
        };
        match mode {
            PolicyMode::PdThreshold(t) => {
                dto.approve_max_pd = Some(t.approve_max);
                dto.review_max_pd = Some(t.review_max);
            }
            PolicyMode::ScoreThreshold(t) => {
                dto.approve_min_score = Some(t.approve_min);
                dto.review_min_score = Some(t.review_min);
            }
        }
        dto
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PolicyWarningDto {
    pub code: String,
    pub message: String,
}

impl From<&PolicyWarning> for PolicyWarningDto {
    fn from(w: &PolicyWarning) -> Self {
        Self {
            code: w.code.clone(),
            message: w.message.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReconciliationNoteDto {
    /// `info`, `warning` or `critical`.
    pub severity: String,
    pub kind: String,
    pub message: String,
    pub features: Vec<String>,
}

impl From<&ReconciliationNote> for ReconciliationNoteDto {
    fn from(note: &ReconciliationNote) -> Self {
        Self {
            severity: label(&note.severity),
            kind: label(&note.kind),
            message: note.message.clone(),
            features: note.features.clone(),
        }
    }
}

/// Active thresholds on both the PD and the score axis.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ThresholdEquivalentsDto {
    pub approve_pd: f64,
    pub review_pd: f64,
    pub approve_score: i32,
    pub review_score: i32,
}

impl From<&ThresholdEquivalents> for ThresholdEquivalentsDto {
    fn from(t: &ThresholdEquivalents) -> Self {
        Self {
            approve_pd: t.approve_pd,
            review_pd: t.review_pd,
            approve_score: t.approve_score,
            review_score: t.review_score,
        }
    }
}

// ============================================================================
// Status / Health DTOs
// ============================================================================

/// Operator status report.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    /// `healthy` or `degraded`.
    pub status: String,
    pub feature_count: usize,
    /// Resolved feature order.
    pub features: Vec<String>,
    /// Model features the request can never supply.
    pub zero_filled_features: Vec<String>,
    pub schema_relation: String,
    pub reconciliation_notes: Vec<ReconciliationNoteDto>,
    pub removed_features: Vec<String>,
    pub forbidden_columns: Vec<String>,
    pub policy: PolicyDto,
    pub policy_flagged: bool,
    pub policy_warnings: Vec<PolicyWarningDto>,
    pub threshold_equivalents: ThresholdEquivalentsDto,
    pub train_prior: Option<f64>,
    /// Runtime prior as read for this call.
    pub runtime_prior: Option<f64>,
    pub runtime_prior_source: String,
    pub attribution_available: bool,
    pub default_top_k: usize,
    pub model_version: Option<String>,
    pub schema_version: Option<String>,
    pub loaded_at: DateTime<Utc>,
}

impl From<&EngineStatus> for StatusResponse {
    fn from(status: &EngineStatus) -> Self {
        Self {
            status: status.status.as_str().to_string(),
            feature_count: status.feature_count,
            features: status.features.clone(),
            zero_filled_features: status.zero_filled_features.clone(),
            schema_relation: label(&status.schema_relation),
            reconciliation_notes: status
                .reconciliation_notes
                .iter()
                .map(ReconciliationNoteDto::from)
                .collect(),
            removed_features: status.removed_features.clone(),
            forbidden_columns: status.forbidden_columns.clone(),
            policy: PolicyDto::new(status.policy.mode(), status.policy.min_nonzero_features()),
            policy_flagged: status.policy_flagged,
            policy_warnings: status.policy_warnings.iter().map(PolicyWarningDto::from).collect(),
            threshold_equivalents: ThresholdEquivalentsDto::from(&status.threshold_equivalents),
            train_prior: status.train_prior,
            runtime_prior: status.runtime_prior,
            runtime_prior_source: status.runtime_prior_source.clone(),
            attribution_available: status.attribution_available,
            default_top_k: status.default_top_k,
            model_version: status.model_version.clone(),
            schema_version: status.schema_version.clone(),
            loaded_at: status.loaded_at,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy` or `degraded`.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
    pub feature_count: usize,
    pub schema_relation: String,
    /// Warning and critical reconciliation notes.
    pub reconciliation_notes: Vec<ReconciliationNoteDto>,
    pub policy_warnings: Vec<PolicyWarningDto>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use cr_core::{Direction, PdThresholds, ScoreThresholds, SchemaRelation};

    #[test]
    fn test_score_request_defaults() {
        let req: ScoreRequest = serde_json::from_str(r#"{"features": {"x1": 1.0}}"#).unwrap();
        assert!(req.return_explain);
        assert!(req.top_k.is_none());
        assert!(req.validate().is_ok());

        let req: ScoreRequest = serde_json::from_str("{}").unwrap();
        assert!(req.features.is_empty());
    }

    #[test]
    fn test_score_request_top_k_range() {
        let req: ScoreRequest = serde_json::from_str(r#"{"features": {}, "top_k": 0}"#).unwrap();
        assert!(req.validate().is_err());
        let req: ScoreRequest = serde_json::from_str(r#"{"features": {}, "top_k": 51}"#).unwrap();
        assert!(req.validate().is_err());
        let req: ScoreRequest = serde_json::from_str(r#"{"features": {}, "top_k": 50}"#).unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_score_request_locale() {
        let req: ScoreRequest =
            serde_json::from_str(r#"{"features": {}, "locale": "vi", "return_explain": false}"#)
                .unwrap();
        let options = req.options().unwrap();
        assert_eq!(options.locale, Some(Locale::Vi));
        assert!(!options.return_explain);

        let req: ScoreRequest =
            serde_json::from_str(r#"{"features": {}, "locale": "fr"}"#).unwrap();
        assert!(matches!(req.options(), Err(ApiError::ValidationError(_))));
    }

    #[test]
    fn test_policy_dto_sets_active_pair_only() {
        let dto = PolicyDto::new(&PolicyMode::ScoreThreshold(ScoreThresholds::default()), 5);
        assert_eq!(dto.mode, "score");
        assert_eq!(dto.approve_min_score, Some(700));
        assert!(dto.approve_max_pd.is_none());

        let dto = PolicyDto::new(&PolicyMode::PdThreshold(PdThresholds::default()), 3);
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["mode"], "pd");
        assert!(json.get("approve_min_score").is_none());
        assert_eq!(json["min_nonzero_features"], 3);
    }

    #[test]
    fn test_labels() {
        assert_eq!(label(&Direction::Up), "up");
        assert_eq!(label(&SchemaRelation::ModelSuperset), "model_superset");
        let failed = AttributionStatusDto::from(&AttributionStatus::Failed("length".into()));
        assert_eq!(failed.status, "failed");
        assert_eq!(failed.reason.as_deref(), Some("length"));
    }
}
