//! # cr-core
//!
//! Serving-time decision engine for Credo.
//!
//! This crate reconciles the stored feature schema against the trained
//! classifier, builds dense request vectors, estimates and recalibrates the
//! probability of default, maps it to a 300-900 score and extracts a top-K
//! feature attribution. [`ScoringEngine`] ties the pieces together.

pub mod artifacts;
pub mod attribution;
pub mod engine;
pub mod model;
pub mod prior;
pub mod reasons;
pub mod schema;
pub mod score;
pub mod scorecard;
pub mod vector;

pub use artifacts::{load_feature_schema, load_train_prior, ArtifactError, ArtifactPaths, FeatureSchema};
pub use attribution::{
    rank_contributions, Attribution, AttributionExtractor, AttributionOutcome, AttributionStatus,
    Direction, DEFAULT_TOP_K,
};
pub use engine::{
    AuditMetadata, EngineBuilder, EngineError, EngineHealth, EngineSettings, EngineStatus,
    RequestNote, RequestNoteKind, ScoreOptions, ScoreResponse, ScoringEngine, ScoringError,
    ThresholdEquivalents, MAX_TOP_K, UNSCORED_PD,
};
pub use model::{
    estimate_pd, AttributionModel, EstimatorError, ModelError, ModelIntrospection,
    ProbabilityModel,
};
pub use prior::{
    shift_prior, FileRuntimePrior, FixedRuntimePrior, PriorShiftCalibrator, PriorShiftOutcome,
    PriorShiftSkip, RuntimePriorSource,
};
pub use reasons::{render_reason, render_reasons, Locale, Reason};
pub use schema::{
    reconcile, ForbiddenColumns, NoteKind, NoteSeverity, ReconcileError, ReconciledSchema,
    ReconciliationNote, SchemaRelation,
};
pub use score::{pd_at_score, score_from_pd};
pub use scorecard::{IsotonicCurve, LogisticScorecard, Scaler};
pub use vector::{build_vector, coerce_value, FeatureMap, FeatureVector};

// Policy types appear in every response.
pub use cr_policy::{
    Decision, DecisionPolicy, PdThresholds, PolicyMode, PolicyOutcome, PolicyWarning,
    ScoreThresholds,
};
