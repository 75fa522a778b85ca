//! The scoring engine context handle.
//!
//! [`ScoringEngine`] owns every process-wide artifact. It is built once at
//! startup (load-or-fail), never mutated afterwards, and shared across
//! request handlers behind an `Arc`. The runtime prior is the only value read
//! per request, and it is read exactly once per call to [`ScoringEngine::score`].

use crate::artifacts::{load_feature_schema, load_train_prior, ArtifactError, ArtifactPaths, FeatureSchema};
use crate::attribution::{
    Attribution, AttributionExtractor, AttributionOutcome, AttributionStatus, DEFAULT_TOP_K,
};
use crate::model::{estimate_pd, AttributionModel, EstimatorError, ModelError, ProbabilityModel};
use crate::prior::{
    FileRuntimePrior, FixedRuntimePrior, PriorShiftCalibrator, PriorShiftOutcome, PriorShiftSkip,
    RuntimePriorSource,
};
use crate::reasons::{render_reasons, Locale, Reason};
use crate::schema::{reconcile, ForbiddenColumns, ReconcileError, ReconciledSchema, ReconciliationNote, SchemaRelation};
use crate::score::{pd_at_score, score_from_pd};
use crate::scorecard::LogisticScorecard;
use crate::vector::{build_vector, FeatureMap};
use chrono::{DateTime, Utc};
use cr_policy::{Decision, DecisionPolicy, PolicyMode, PolicyOutcome, PolicyWarning};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Upper bound on a per-request attribution count.
pub const MAX_TOP_K: usize = 50;

/// PD used when the classifier cannot score and no train prior is known.
pub const UNSCORED_PD: f64 = 0.5;

/// Fatal startup errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("Scoring engine requires a {0}")]
    Missing(&'static str),
}

/// Per-request failures. Data-quality problems never produce one.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error(transparent)]
    Estimator(#[from] EstimatorError),

    #[error("Invalid scoring option: {0}")]
    InvalidOption(String),
}

/// Deployment-level engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineSettings {
    /// Attributions returned when a request does not override K.
    pub top_k: usize,
    /// Whether the classifier's attribution capability is used.
    pub attribution_enabled: bool,
    /// Forbidden names in addition to the built-in candidates.
    pub extra_forbidden: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            attribution_enabled: true,
            extra_forbidden: Vec::new(),
        }
    }
}

/// Per-request options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScoreOptions {
    pub return_explain: bool,
    pub top_k: Option<usize>,
    /// Render reasons in this language.
    pub locale: Option<Locale>,
}

impl Default for ScoreOptions {
    fn default() -> Self {
        Self {
            return_explain: true,
            top_k: None,
            locale: None,
        }
    }
}

/// Kind of a per-request note.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestNoteKind {
    MissingFeatures,
    CoercedFeatures,
    SparsityDowngrade,
    AttributionFailed,
    AttributionUnavailable,
    InvalidTargetPrior,
    PriorShiftFailed,
    PolicyMisconfigured,
    SchemaDivergent,
    HeldForReview,
}

/// A recoverable condition absorbed while scoring one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestNote {
    pub kind: RequestNoteKind,
    pub message: String,
}

impl RequestNote {
    fn new(kind: RequestNoteKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Artifact and policy identity attached to every response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditMetadata {
    pub model_version: Option<String>,
    pub schema_version: Option<String>,
    pub policy_mode: String,
    pub policy: PolicyMode,
    pub min_nonzero_features: usize,
    pub policy_warnings: Vec<PolicyWarning>,
    pub schema_relation: SchemaRelation,
    pub reconciliation_notes: Vec<ReconciliationNote>,
    pub feature_count: usize,
}

/// Result of scoring one applicant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreResponse {
    /// PD the decision was made on.
    pub pd: f64,
    pub pd_raw: f64,
    pub pd_adjusted: f64,
    pub prior_shift: PriorShiftOutcome,
    pub score: i32,
    pub decision: Decision,
    pub policy: PolicyOutcome,
    pub missing_features: Vec<String>,
    pub coerced_features: Vec<String>,
    pub attributions: Vec<Attribution>,
    pub attribution_status: AttributionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasons: Option<Vec<Reason>>,
    pub notes: Vec<RequestNote>,
    pub audit: AuditMetadata,
}

/// Overall engine condition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineHealth {
    Healthy,
    Degraded,
}

impl EngineHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineHealth::Healthy => "healthy",
            EngineHealth::Degraded => "degraded",
        }
    }
}

/// Where the active thresholds sit on both the PD and the score axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ThresholdEquivalents {
    pub approve_pd: f64,
    pub review_pd: f64,
    pub approve_score: i32,
    pub review_score: i32,
}

impl ThresholdEquivalents {
    fn of(mode: &PolicyMode) -> Self {
        match mode {
            PolicyMode::PdThreshold(t) => Self {
                approve_pd: t.approve_max,
                review_pd: t.review_max,
                approve_score: score_from_pd(t.approve_max),
                review_score: score_from_pd(t.review_max),
            },
            PolicyMode::ScoreThreshold(t) => Self {
                approve_pd: pd_at_score(t.approve_min),
                review_pd: pd_at_score(t.review_min),
                approve_score: t.approve_min,
                review_score: t.review_min,
            },
        }
    }
}

/// Operator-facing introspection report.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EngineStatus {
    pub status: EngineHealth,
    pub feature_count: usize,
    pub features: Vec<String>,
    pub zero_filled_features: Vec<String>,
    pub schema_relation: SchemaRelation,
    pub reconciliation_notes: Vec<ReconciliationNote>,
    pub removed_features: Vec<String>,
    pub forbidden_columns: Vec<String>,
    pub policy: DecisionPolicy,
    pub policy_flagged: bool,
    pub policy_warnings: Vec<PolicyWarning>,
    pub threshold_equivalents: ThresholdEquivalents,
    pub train_prior: Option<f64>,
    pub runtime_prior: Option<f64>,
    pub runtime_prior_source: String,
    pub attribution_available: bool,
    pub default_top_k: usize,
    pub model_version: Option<String>,
    pub schema_version: Option<String>,
    pub loaded_at: DateTime<Utc>,
}

/// Assembles a [`ScoringEngine`] from already-loaded parts.
pub struct EngineBuilder {
    schema: Option<FeatureSchema>,
    classifier: Option<Arc<dyn ProbabilityModel>>,
    attribution: Option<Arc<dyn AttributionModel>>,
    train_prior: Option<f64>,
    runtime_prior: Arc<dyn RuntimePriorSource>,
    policy: DecisionPolicy,
    settings: EngineSettings,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            schema: None,
            classifier: None,
            attribution: None,
            train_prior: None,
            runtime_prior: Arc::new(FixedRuntimePrior(None)),
            policy: DecisionPolicy::default(),
            settings: EngineSettings::default(),
        }
    }

    pub fn schema(mut self, schema: FeatureSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn ProbabilityModel>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn attribution(mut self, attribution: Arc<dyn AttributionModel>) -> Self {
        self.attribution = Some(attribution);
        self
    }

    pub fn train_prior(mut self, pi_train: Option<f64>) -> Self {
        self.train_prior = pi_train;
        self
    }

    pub fn runtime_prior(mut self, source: Arc<dyn RuntimePriorSource>) -> Self {
        self.runtime_prior = source;
        self
    }

    pub fn policy(mut self, policy: DecisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Reconciles the schema and freezes the engine.
    pub fn build(self) -> Result<ScoringEngine, EngineError> {
        let schema = self.schema.ok_or(EngineError::Missing("feature schema"))?;
        let classifier = self.classifier.ok_or(EngineError::Missing("classifier"))?;

        let forbidden = ForbiddenColumns::defaults()
            .with_names(self.settings.extra_forbidden.iter().cloned())
            .with_schema_metadata(&schema);
        let reconciled = reconcile(&schema, &classifier.introspect(), forbidden)?;

        let attribution_model = if self.settings.attribution_enabled {
            self.attribution
        } else {
            None
        };
        let attribution = AttributionExtractor::new(attribution_model, self.settings.top_k);
        let calibrator = PriorShiftCalibrator::new(self.train_prior, self.runtime_prior);

        let engine = ScoringEngine {
            model_version: classifier.version().map(str::to_string),
            schema_version: schema.version_label().map(str::to_string),
            classifier,
            schema: reconciled,
            calibrator,
            policy: self.policy,
            attribution,
            loaded_at: Utc::now(),
        };

        info!(
            features = engine.schema.len(),
            relation = ?engine.schema.relation(),
            notes = engine.schema.notes().len(),
            removed = engine.schema.removed().len(),
            policy_mode = engine.policy.mode().name(),
            train_prior = ?engine.calibrator.train_prior(),
            runtime_prior = %engine.calibrator.source_description(),
            attribution = engine.attribution.is_available(),
            model_version = ?engine.model_version,
            "Scoring engine ready"
        );
        if engine.health() == EngineHealth::Degraded {
            warn!("Scoring engine started in degraded state; see status for details");
        }

        Ok(engine)
    }
}

/// Immutable, shareable scoring context.
pub struct ScoringEngine {
    classifier: Arc<dyn ProbabilityModel>,
    schema: ReconciledSchema,
    calibrator: PriorShiftCalibrator,
    policy: DecisionPolicy,
    attribution: AttributionExtractor,
    model_version: Option<String>,
    schema_version: Option<String>,
    loaded_at: DateTime<Utc>,
}

impl std::fmt::Debug for ScoringEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringEngine")
            .field("features", &self.schema.len())
            .field("relation", &self.schema.relation())
            .field("calibrator", &self.calibrator)
            .field("policy", &self.policy)
            .field("attribution", &self.attribution)
            .field("model_version", &self.model_version)
            .finish()
    }
}

impl ScoringEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Loads every artifact from disk. Fails if the classifier or schema is
    /// unusable; optional artifacts only disable their feature.
    #[instrument(skip_all, fields(model = %paths.model.display(), schema = %paths.schema.display()))]
    pub fn load(
        paths: &ArtifactPaths,
        settings: EngineSettings,
        policy: DecisionPolicy,
    ) -> Result<Self, EngineError> {
        let schema = load_feature_schema(&paths.schema)?;
        let scorecard = Arc::new(LogisticScorecard::load(&paths.model)?);
        let train_prior = paths.train_prior.as_deref().and_then(load_train_prior);
        let runtime_prior: Arc<dyn RuntimePriorSource> = match &paths.runtime_prior {
            Some(path) => Arc::new(FileRuntimePrior::new(path)),
            None => Arc::new(FixedRuntimePrior(None)),
        };

        EngineBuilder::new()
            .schema(schema)
            .classifier(scorecard.clone())
            .attribution(scorecard)
            .train_prior(train_prior)
            .runtime_prior(runtime_prior)
            .policy(policy)
            .settings(settings)
            .build()
    }

    pub fn schema(&self) -> &ReconciledSchema {
        &self.schema
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    pub fn model_version(&self) -> Option<&str> {
        self.model_version.as_deref()
    }

    pub fn schema_version(&self) -> Option<&str> {
        self.schema_version.as_deref()
    }

    pub fn health(&self) -> EngineHealth {
        if self.schema.has_critical_notes() || self.policy.is_flagged() {
            EngineHealth::Degraded
        } else {
            EngineHealth::Healthy
        }
    }

    /// Scores one applicant.
    #[instrument(skip_all, fields(keys = features.len()))]
    pub fn score(
        &self,
        features: &FeatureMap,
        options: ScoreOptions,
    ) -> Result<ScoreResponse, ScoringError> {
        if let Some(k) = options.top_k {
            if k == 0 || k > MAX_TOP_K {
                return Err(ScoringError::InvalidOption(format!(
                    "top_k must be between 1 and {}, got {}",
                    MAX_TOP_K, k
                )));
            }
        }

        let pi_target = self.calibrator.current_target();
        let vector = build_vector(features, &self.schema);
        let (raw_pd, unscored) = match estimate_pd(self.classifier.as_ref(), &vector.values) {
            Ok(pd) => (pd, false),
            Err(EstimatorError::Model(ModelError::DimensionMismatch { expected, actual }))
                if self.schema.has_critical_notes() =>
            {
                warn!(
                    expected,
                    actual,
                    "Classifier rejected the unverified feature order; holding for review"
                );
                (self.calibrator.train_prior().unwrap_or(UNSCORED_PD), true)
            }
            Err(e) => return Err(e.into()),
        };
        let prior_shift = self.calibrator.apply_with_target(raw_pd, pi_target);
        let pd = prior_shift.adjusted_pd;
        let score = score_from_pd(pd);
        let policy = if unscored {
            self.policy.hold_for_review(pd, score, vector.nonzero_count())
        } else {
            self.policy.evaluate(pd, score, vector.nonzero_count())
        };

        let attribution = if options.return_explain {
            self.attribution.extract(
                self.schema.order(),
                &vector.values,
                self.schema.forbidden(),
                options.top_k,
            )
        } else {
            AttributionOutcome {
                attributions: Vec::new(),
                status: AttributionStatus::Skipped,
            }
        };
        let reasons = options
            .locale
            .map(|locale| render_reasons(&attribution.attributions, locale));

        let notes = self.request_notes(&vector.missing, &vector.coerced, &prior_shift, &policy, &attribution.status);

        Ok(ScoreResponse {
            pd,
            pd_raw: raw_pd,
            pd_adjusted: pd,
            prior_shift,
            score,
            decision: policy.decision,
            policy,
            missing_features: vector.missing,
            coerced_features: vector.coerced,
            attributions: attribution.attributions,
            attribution_status: attribution.status,
            reasons,
            notes,
            audit: self.audit_metadata(),
        })
    }

    fn request_notes(
        &self,
        missing: &[String],
        coerced: &[String],
        prior_shift: &PriorShiftOutcome,
        policy: &PolicyOutcome,
        attribution: &AttributionStatus,
    ) -> Vec<RequestNote> {
        let mut notes = Vec::new();

        if !missing.is_empty() {
            notes.push(RequestNote::new(
                RequestNoteKind::MissingFeatures,
                format!("{} feature(s) absent from request, treated as zero", missing.len()),
            ));
        }
        if !coerced.is_empty() {
            notes.push(RequestNote::new(
                RequestNoteKind::CoercedFeatures,
                format!("{} feature(s) not numeric, treated as zero", coerced.len()),
            ));
        }
        if policy.sparsity_downgraded {
            notes.push(RequestNote::new(
                RequestNoteKind::SparsityDowngrade,
                format!(
                    "Only {} nonzero feature(s), below the minimum of {}; approval downgraded to review",
                    policy.nonzero_features,
                    self.policy.min_nonzero_features()
                ),
            ));
        }
        match prior_shift.skipped {
            Some(PriorShiftSkip::InvalidTargetPrior) => notes.push(RequestNote::new(
                RequestNoteKind::InvalidTargetPrior,
                "Target prevalence outside (0, 1); raw PD used",
            )),
            Some(PriorShiftSkip::NumericalFailure) => notes.push(RequestNote::new(
                RequestNoteKind::PriorShiftFailed,
                "Prior shift failed numerically; raw PD used",
            )),
            _ => {}
        }
        match attribution {
            AttributionStatus::Failed(reason) => notes.push(RequestNote::new(
                RequestNoteKind::AttributionFailed,
                format!("Attribution unavailable for this request: {}", reason),
            )),
            AttributionStatus::Unavailable => notes.push(RequestNote::new(
                RequestNoteKind::AttributionUnavailable,
                "No attribution model is configured",
            )),
            AttributionStatus::Available | AttributionStatus::Skipped => {}
        }
        if policy.flagged {
            notes.push(RequestNote::new(
                RequestNoteKind::PolicyMisconfigured,
                "Decision policy thresholds are misconfigured; decision is flagged",
            ));
        }
        if self.schema.has_critical_notes() {
            notes.push(RequestNote::new(
                RequestNoteKind::SchemaDivergent,
                "Feature order could not be verified against the classifier; score may be invalid",
            ));
        }
        if policy.held_for_review {
            notes.push(RequestNote::new(
                RequestNoteKind::HeldForReview,
                "Classifier could not score the resolved feature vector; PD is the population prior and the decision is held for review",
            ));
        }

        notes
    }

    fn audit_metadata(&self) -> AuditMetadata {
        AuditMetadata {
            model_version: self.model_version.clone(),
            schema_version: self.schema_version.clone(),
            policy_mode: self.policy.mode().name().to_string(),
            policy: *self.policy.mode(),
            min_nonzero_features: self.policy.min_nonzero_features(),
            policy_warnings: self.policy.warnings().to_vec(),
            schema_relation: self.schema.relation(),
            reconciliation_notes: self.schema.notes().to_vec(),
            feature_count: self.schema.len(),
        }
    }

    /// Builds the status report. Reads the runtime prior fresh.
    pub fn status(&self) -> EngineStatus {
        let order = self.schema.order();
        EngineStatus {
            status: self.health(),
            feature_count: order.len(),
            features: order.to_vec(),
            zero_filled_features: order
                .iter()
                .filter(|name| self.schema.is_zero_filled(name))
                .cloned()
                .collect(),
            schema_relation: self.schema.relation(),
            reconciliation_notes: self.schema.notes().to_vec(),
            removed_features: self.schema.removed().to_vec(),
            forbidden_columns: self.schema.forbidden().sorted(),
            policy: self.policy.clone(),
            policy_flagged: self.policy.is_flagged(),
            policy_warnings: self.policy.warnings().to_vec(),
            threshold_equivalents: ThresholdEquivalents::of(self.policy.mode()),
            train_prior: self.calibrator.train_prior(),
            runtime_prior: self.calibrator.current_target(),
            runtime_prior_source: self.calibrator.source_description(),
            attribution_available: self.attribution.is_available(),
            default_top_k: self.attribution.top_k(),
            model_version: self.model_version.clone(),
            schema_version: self.schema_version.clone(),
            loaded_at: self.loaded_at,
        }
    }
}
