//! End-to-end scoring scenarios.
//!
//! These tests drive `ScoringEngine` through fake classifiers and on-disk
//! artifacts to verify:
//! - Schema reconciliation outcomes and their effect on request vectors
//! - Missing-feature reporting and zero-filling
//! - The sparsity gate
//! - Attribution filtering of identifier columns
//! - Per-request runtime prior refresh

use std::io::Write;
use std::sync::{Arc, Mutex};

use cr_core::{
    score_from_pd, AttributionModel, AttributionStatus, Decision, DecisionPolicy, Direction, EngineBuilder,
    EngineHealth, EngineSettings, FeatureMap, FeatureSchema, FileRuntimePrior, FixedRuntimePrior,
    Locale, ModelError, ModelIntrospection, NoteKind, NoteSeverity, PolicyMode, ProbabilityModel,
    RequestNoteKind, SchemaRelation, ScoreOptions, ScoreThresholds, ScoringEngine,
};
use cr_core::{ArtifactPaths, PdThresholds};
use serde_json::json;
use tempfile::{NamedTempFile, TempDir};

// =============================================================================
// Fakes
// =============================================================================

/// Classifier returning a fixed PD and recording every vector it sees.
struct RecordingClassifier {
    pd: f64,
    names: Vec<String>,
    seen: Mutex<Vec<Vec<f64>>>,
}

impl RecordingClassifier {
    fn new(pd: f64, names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            pd,
            names: names.iter().map(|s| s.to_string()).collect(),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn last_vector(&self) -> Vec<f64> {
        self.seen.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

impl ProbabilityModel for RecordingClassifier {
    fn predict_probability(&self, features: &[f64]) -> Result<f64, ModelError> {
        self.seen.lock().unwrap().push(features.to_vec());
        Ok(self.pd)
    }

    fn introspect(&self) -> ModelIntrospection {
        ModelIntrospection::Names(self.names.clone())
    }
}

/// Attribution model with fixed contributions.
struct FixedContributions(Vec<f64>);

impl AttributionModel for FixedContributions {
    fn explain(&self, _features: &[f64]) -> Result<Vec<f64>, ModelError> {
        Ok(self.0.clone())
    }
}

fn request(value: serde_json::Value) -> FeatureMap {
    serde_json::from_value(value).unwrap()
}

fn score_policy(approve_min: i32, review_min: i32, min_nonzero: usize) -> DecisionPolicy {
    DecisionPolicy::new(
        PolicyMode::ScoreThreshold(ScoreThresholds {
            approve_min,
            review_min,
        }),
        min_nonzero,
    )
}

// =============================================================================
// End-to-end Scenario
// =============================================================================

#[test]
fn test_end_to_end_without_prior_shift() {
    let classifier = RecordingClassifier::new(0.02, &["x1", "x2"]);
    let engine = EngineBuilder::new()
        .schema(FeatureSchema::from_names(["x1", "x2"]))
        .classifier(classifier.clone())
        .policy(score_policy(700, 650, 0))
        .build()
        .unwrap();

    let response = engine
        .score(&request(json!({"x1": 1, "x2": 0})), ScoreOptions::default())
        .unwrap();

    assert_eq!(response.score, score_from_pd(0.02));
    assert_eq!(response.score, 665);
    assert_eq!(response.decision, Decision::Review);
    assert!(response.missing_features.is_empty());
    assert_eq!(response.pd_raw, response.pd_adjusted);
    assert_eq!(response.pd_raw, 0.02);
    assert!(!response.prior_shift.applied);
    assert_eq!(classifier.last_vector(), vec![1.0, 0.0]);
    assert_eq!(response.audit.policy_mode, "score");
}

// =============================================================================
// Reconciliation Scenarios
// =============================================================================

#[test]
fn test_equal_sets_adopt_model_order_without_notes() {
    let classifier = RecordingClassifier::new(0.1, &["C", "A", "B"]);
    let engine = EngineBuilder::new()
        .schema(FeatureSchema::from_names(["A", "B", "C"]))
        .classifier(classifier.clone())
        .build()
        .unwrap();

    let status = engine.status();
    assert_eq!(status.features, vec!["C", "A", "B"]);
    assert_eq!(status.schema_relation, SchemaRelation::Equal);
    assert!(status.reconciliation_notes.is_empty());

    engine
        .score(&request(json!({"A": 1, "B": 2, "C": 3})), ScoreOptions::default())
        .unwrap();
    assert_eq!(classifier.last_vector(), vec![3.0, 1.0, 2.0]);
}

#[test]
fn test_model_superset_zero_fills_extra_features() {
    let classifier = RecordingClassifier::new(0.1, &["A", "B", "C"]);
    let engine = EngineBuilder::new()
        .schema(FeatureSchema::from_names(["A", "B"]))
        .classifier(classifier.clone())
        .build()
        .unwrap();

    let status = engine.status();
    assert_eq!(status.features, vec!["A", "B", "C"]);
    assert_eq!(status.schema_relation, SchemaRelation::ModelSuperset);
    let note = status
        .reconciliation_notes
        .iter()
        .find(|n| n.kind == NoteKind::ModelOnlyFeatures)
        .expect("superset note");
    assert_eq!(note.features, vec!["C"]);
    assert_ne!(note.severity, NoteSeverity::Critical);
    assert_eq!(status.status, EngineHealth::Healthy);

    let response = engine
        .score(&request(json!({"A": 1, "B": 2, "C": 9})), ScoreOptions::default())
        .unwrap();
    assert_eq!(classifier.last_vector(), vec![1.0, 2.0, 0.0]);
    assert!(response.missing_features.is_empty());

    // A request lacking C still scores, with C zero-filled and reported.
    let response = engine
        .score(&request(json!({"A": 1, "B": 2})), ScoreOptions::default())
        .unwrap();
    assert_eq!(classifier.last_vector(), vec![1.0, 2.0, 0.0]);
    assert_eq!(response.missing_features, vec!["C"]);
}

#[test]
fn test_model_subset_drops_unused_schema_features() {
    let classifier = RecordingClassifier::new(0.1, &["A"]);
    let engine = EngineBuilder::new()
        .schema(FeatureSchema::from_names(["A", "B"]))
        .classifier(classifier.clone())
        .build()
        .unwrap();

    assert_eq!(engine.status().schema_relation, SchemaRelation::ModelSubset);
    let response = engine
        .score(&request(json!({"A": 4, "B": 5})), ScoreOptions::default())
        .unwrap();
    assert_eq!(classifier.last_vector(), vec![4.0]);
    assert!(response.missing_features.is_empty());
}

#[test]
fn test_divergent_sets_keep_schema_order_and_degrade() {
    let classifier = RecordingClassifier::new(0.1, &["a", "b", "x"]);
    let engine = EngineBuilder::new()
        .schema(FeatureSchema::from_names(["a", "b", "z"]))
        .classifier(classifier.clone())
        .build()
        .unwrap();

    let status = engine.status();
    assert_eq!(status.features, vec!["a", "b", "z"]);
    assert_eq!(status.schema_relation, SchemaRelation::Divergent);
    assert_eq!(status.status, EngineHealth::Degraded);
    assert!(status
        .reconciliation_notes
        .iter()
        .any(|n| n.severity == NoteSeverity::Critical));

    // Scoring still proceeds, flagged on every response.
    let response = engine
        .score(&request(json!({"a": 1, "b": 1, "z": 1})), ScoreOptions::default())
        .unwrap();
    assert_eq!(classifier.last_vector(), vec![1.0, 1.0, 1.0]);
    assert!(!response.policy.held_for_review);
    assert!(response
        .notes
        .iter()
        .any(|n| n.kind == RequestNoteKind::SchemaDivergent));
    assert!(response
        .audit
        .reconciliation_notes
        .iter()
        .any(|n| n.kind == NoteKind::DivergentFeatureSets));
}

#[test]
fn test_schema_identifier_columns_are_removed() {
    let mut schema = FeatureSchema::from_names(["customer_ref", "income", "label"]);
    schema.id_col = Some("customer_ref".to_string());
    let classifier = RecordingClassifier::new(0.1, &[]);
    let engine = EngineBuilder::new()
        .schema(schema)
        .classifier(classifier.clone())
        .build()
        .unwrap();

    let status = engine.status();
    assert_eq!(status.features, vec!["income"]);
    assert_eq!(status.removed_features, vec!["customer_ref", "label"]);

    engine
        .score(
            &request(json!({"customer_ref": 77, "income": 3, "label": 1})),
            ScoreOptions::default(),
        )
        .unwrap();
    assert_eq!(classifier.last_vector(), vec![3.0]);
}

// =============================================================================
// Vector and Policy Scenarios
// =============================================================================

#[test]
fn test_missing_features_are_reported() {
    let classifier = RecordingClassifier::new(0.1, &["A", "B", "C"]);
    let engine = EngineBuilder::new()
        .schema(FeatureSchema::from_names(["A", "B", "C"]))
        .classifier(classifier.clone())
        .build()
        .unwrap();

    let response = engine
        .score(&request(json!({"A": 1.0})), ScoreOptions::default())
        .unwrap();
    assert_eq!(response.missing_features, vec!["B", "C"]);
    assert_eq!(classifier.last_vector(), vec![1.0, 0.0, 0.0]);
    assert!(response
        .notes
        .iter()
        .any(|n| n.kind == RequestNoteKind::MissingFeatures));
}

#[test]
fn test_malformed_values_never_fail_the_request() {
    let engine = EngineBuilder::new()
        .schema(FeatureSchema::from_names(["a", "b", "c"]))
        .classifier(RecordingClassifier::new(0.1, &["a", "b", "c"]))
        .build()
        .unwrap();

    let response = engine
        .score(
            &request(json!({"a": "oops", "b": true, "c": [1]})),
            ScoreOptions::default(),
        )
        .unwrap();
    assert_eq!(response.coerced_features, vec!["a", "c"]);
    assert!(response.missing_features.is_empty());
}

#[test]
fn test_sparsity_gate_downgrades_approval_only() {
    let names: Vec<String> = (0..11).map(|i| format!("f{}", i)).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let sparse = request(json!({"f0": 1}));

    let approving = EngineBuilder::new()
        .schema(FeatureSchema::from_names(name_refs.iter().copied()))
        .classifier(RecordingClassifier::new(0.001, &name_refs))
        .policy(score_policy(700, 650, 10))
        .build()
        .unwrap();
    let response = approving.score(&sparse, ScoreOptions::default()).unwrap();
    assert_eq!(response.policy.tentative, Decision::Approve);
    assert_eq!(response.decision, Decision::Review);
    assert!(response.policy.sparsity_downgraded);
    assert!(response
        .notes
        .iter()
        .any(|n| n.kind == RequestNoteKind::SparsityDowngrade));

    let rejecting = EngineBuilder::new()
        .schema(FeatureSchema::from_names(name_refs.iter().copied()))
        .classifier(RecordingClassifier::new(0.6, &name_refs))
        .policy(score_policy(700, 650, 10))
        .build()
        .unwrap();
    let response = rejecting.score(&sparse, ScoreOptions::default()).unwrap();
    assert_eq!(response.decision, Decision::Reject);
    assert!(!response.policy.sparsity_downgraded);
}

#[test]
fn test_pd_threshold_mode() {
    let policy = DecisionPolicy::new(
        PolicyMode::PdThreshold(PdThresholds {
            approve_max: 0.03,
            review_max: 0.08,
        }),
        0,
    );
    let engine = EngineBuilder::new()
        .schema(FeatureSchema::from_names(["a"]))
        .classifier(RecordingClassifier::new(0.05, &["a"]))
        .policy(policy)
        .build()
        .unwrap();

    let response = engine
        .score(&request(json!({"a": 1})), ScoreOptions::default())
        .unwrap();
    assert_eq!(response.decision, Decision::Review);
    assert_eq!(response.audit.policy_mode, "pd");
}

// =============================================================================
// Attribution Scenarios
// =============================================================================

#[test]
fn test_identifier_attribution_never_surfaces() {
    let classifier = RecordingClassifier::new(0.1, &["app_id", "income", "tenure"]);
    let engine = EngineBuilder::new()
        .schema(FeatureSchema::from_names(["income", "tenure"]))
        .classifier(classifier)
        .attribution(Arc::new(FixedContributions(vec![100.0, 0.5, -0.2])))
        .build()
        .unwrap();

    let response = engine
        .score(
            &request(json!({"app_id": 99, "income": 2, "tenure": 3})),
            ScoreOptions::default(),
        )
        .unwrap();
    let features: Vec<&str> = response
        .attributions
        .iter()
        .map(|a| a.feature.as_str())
        .collect();
    assert_eq!(features, vec!["income", "tenure"]);
    assert_eq!(response.attributions[0].value, 2.0);
    assert_eq!(response.attributions[1].direction, Direction::Down);
}

#[test]
fn test_reasons_follow_attribution_order() {
    let engine = EngineBuilder::new()
        .schema(FeatureSchema::from_names(["sms_count", "contacts_count"]))
        .classifier(RecordingClassifier::new(0.1, &["sms_count", "contacts_count"]))
        .attribution(Arc::new(FixedContributions(vec![0.1, -0.9])))
        .build()
        .unwrap();

    let options = ScoreOptions {
        locale: Some(Locale::En),
        top_k: Some(1),
        ..Default::default()
    };
    let response = engine
        .score(&request(json!({"sms_count": 40, "contacts_count": 12})), options)
        .unwrap();
    let reasons = response.reasons.expect("reasons requested");
    assert_eq!(reasons.len(), 1);
    assert_eq!(reasons[0].title, "Contacts size");
    assert_eq!(reasons[0].text, "Contacts count = 12 decreases risk (0.900).");
}

// =============================================================================
// Prior Shift Scenarios
// =============================================================================

#[test]
fn test_runtime_prior_is_reread_per_request() {
    let mut prior_file = NamedTempFile::new().unwrap();
    prior_file.write_all(br#"{"target_prevalence": 0.1}"#).unwrap();

    let engine = EngineBuilder::new()
        .schema(FeatureSchema::from_names(["a"]))
        .classifier(RecordingClassifier::new(0.2, &["a"]))
        .train_prior(Some(0.1))
        .runtime_prior(Arc::new(FileRuntimePrior::new(prior_file.path())))
        .build()
        .unwrap();
    let features = request(json!({"a": 1}));

    // Equal priors: identity.
    let response = engine.score(&features, ScoreOptions::default()).unwrap();
    assert_eq!(response.pd_adjusted, 0.2);

    // Higher live prevalence raises the PD without a restart.
    std::fs::write(prior_file.path(), r#"{"target_prevalence": 0.3}"#).unwrap();
    let response = engine.score(&features, ScoreOptions::default()).unwrap();
    assert!(response.prior_shift.applied);
    assert!(response.pd_adjusted > response.pd_raw);
    assert_eq!(response.pd, response.pd_adjusted);
    assert_eq!(response.score, score_from_pd(response.pd_adjusted));

    // Unreadable config: raw PD passes through exactly.
    std::fs::write(prior_file.path(), "not json").unwrap();
    let response = engine.score(&features, ScoreOptions::default()).unwrap();
    assert_eq!(response.pd_adjusted, response.pd_raw);
    assert!(!response.prior_shift.applied);
}

#[test]
fn test_out_of_range_target_prior_is_noted() {
    let engine = EngineBuilder::new()
        .schema(FeatureSchema::from_names(["a"]))
        .classifier(RecordingClassifier::new(0.2, &["a"]))
        .train_prior(Some(0.1))
        .runtime_prior(Arc::new(FixedRuntimePrior(Some(1.5))))
        .build()
        .unwrap();

    let response = engine
        .score(&request(json!({"a": 1})), ScoreOptions::default())
        .unwrap();
    assert_eq!(response.pd_adjusted, 0.2);
    assert!(response
        .notes
        .iter()
        .any(|n| n.kind == RequestNoteKind::InvalidTargetPrior));
}

// =============================================================================
// Loading From Disk
// =============================================================================

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_artifacts_from_disk() {
    let dir = TempDir::new().unwrap();
    let model = write(
        &dir,
        "model.json",
        r#"{
            "version": "lr-test",
            "feature_names": ["income", "tenure"],
            "intercept": -3.0,
            "coefficients": [0.8, -0.4],
            "scaler": {"mean": [1.0, 2.0], "scale": [0.5, 1.0]}
        }"#,
    );
    let schema = write(
        &dir,
        "feature_schema.json",
        r#"{"feature_names": ["tenure", "income"], "target": "label", "id_col": "app_id",
            "created_at": "2024-06-01T00:00:00"}"#,
    );
    let metrics = write(&dir, "metrics.json", r#"{"auc": 0.71, "default_rate_train": 0.08}"#);
    let runtime = write(&dir, "runtime_prior.json", "0.04");

    let paths = ArtifactPaths {
        model,
        schema,
        train_prior: Some(metrics),
        runtime_prior: Some(runtime),
    };
    let engine = ScoringEngine::load(&paths, EngineSettings::default(), DecisionPolicy::default()).unwrap();

    let status = engine.status();
    assert_eq!(status.features, vec!["income", "tenure"]);
    assert_eq!(status.train_prior, Some(0.08));
    assert_eq!(status.runtime_prior, Some(0.04));
    assert_eq!(status.model_version.as_deref(), Some("lr-test"));
    assert!(status.attribution_available);

    let response = engine
        .score(&request(json!({"income": 1.0, "tenure": 2.0})), ScoreOptions::default())
        .unwrap();
    // At the training means the log-odds is the intercept.
    let raw = 1.0 / (1.0 + 3f64.exp());
    assert!((response.pd_raw - raw).abs() < 1e-12);
    assert!(response.pd_adjusted < response.pd_raw);
    assert_eq!(response.attributions.len(), 2);
    assert!(response.attributions.iter().all(|a| a.contribution == 0.0));
}

fn load_with(dir: &TempDir, model: &str, schema: &str, policy: DecisionPolicy) -> ScoringEngine {
    let paths = ArtifactPaths {
        model: write(dir, "model.json", model),
        schema: write(dir, "feature_schema.json", schema),
        train_prior: Some(write(dir, "metrics.json", r#"{"pi_train": 0.06}"#)),
        runtime_prior: None,
    };
    ScoringEngine::load(&paths, EngineSettings::default(), policy).unwrap()
}

#[test]
fn test_count_mismatch_degrades_and_holds_for_review() {
    let dir = TempDir::new().unwrap();
    let engine = load_with(
        &dir,
        r#"{"intercept": -4.0, "coefficients": [0.5, 0.5, 0.5]}"#,
        r#"{"names": ["a", "b"]}"#,
        score_policy(700, 650, 0),
    );

    let status = engine.status();
    assert_eq!(status.schema_relation, SchemaRelation::CountOnly);
    assert_eq!(status.status, EngineHealth::Degraded);
    let note = &status.reconciliation_notes[0];
    assert_eq!(note.kind, NoteKind::FeatureCountMismatch);
    assert_eq!(note.severity, NoteSeverity::Critical);

    let response = engine
        .score(&request(json!({"a": 1, "b": 2})), ScoreOptions::default())
        .unwrap();
    assert_eq!(response.decision, Decision::Review);
    assert!(response.policy.held_for_review);
    assert_eq!(response.pd_raw, 0.06);
    assert!(matches!(response.attribution_status, AttributionStatus::Failed(_)));
    assert!(response.attributions.is_empty());
    assert!(response
        .notes
        .iter()
        .any(|n| n.kind == RequestNoteKind::HeldForReview));
    assert!(response
        .notes
        .iter()
        .any(|n| n.kind == RequestNoteKind::SchemaDivergent));
}

#[test]
fn test_divergent_sets_of_different_length_still_decide() {
    let dir = TempDir::new().unwrap();
    let engine = load_with(
        &dir,
        r#"{"feature_names": ["b", "c", "d", "e"], "intercept": 2.0,
            "coefficients": [1.0, 1.0, 1.0, 1.0]}"#,
        r#"{"names": ["a", "b", "c"]}"#,
        score_policy(700, 650, 0),
    );

    let status = engine.status();
    assert_eq!(status.schema_relation, SchemaRelation::Divergent);
    assert_eq!(status.features, vec!["a", "b", "c"]);
    assert_eq!(status.status, EngineHealth::Degraded);

    let response = engine
        .score(&request(json!({"a": 1, "b": 1, "c": 1})), ScoreOptions::default())
        .unwrap();
    assert_eq!(response.decision, Decision::Review);
    assert_eq!(response.policy.tentative, Decision::Reject);
    assert!(response.policy.held_for_review);
    assert!(response.missing_features.is_empty());
}

#[test]
fn test_missing_model_artifact_is_fatal() {
    let dir = TempDir::new().unwrap();
    let schema = write(&dir, "feature_schema.json", r#"{"names": ["a"]}"#);
    let paths = ArtifactPaths {
        model: dir.path().join("missing.json"),
        schema,
        train_prior: None,
        runtime_prior: None,
    };
    assert!(ScoringEngine::load(&paths, EngineSettings::default(), DecisionPolicy::default()).is_err());
}

#[test]
fn test_missing_train_prior_disables_shift() {
    let dir = TempDir::new().unwrap();
    let model = write(&dir, "model.json", r#"{"intercept": 0.0, "coefficients": [1.0]}"#);
    let schema = write(&dir, "feature_schema.json", r#"{"names": ["a"]}"#);
    let runtime = write(&dir, "runtime_prior.json", r#"{"pi_target": 0.5}"#);
    let paths = ArtifactPaths {
        model,
        schema,
        train_prior: Some(dir.path().join("absent.json")),
        runtime_prior: Some(runtime),
    };
    let engine = ScoringEngine::load(&paths, EngineSettings::default(), DecisionPolicy::default()).unwrap();
    let response = engine
        .score(&request(json!({"a": 0})), ScoreOptions::default())
        .unwrap();
    assert_eq!(response.pd_raw, 0.5);
    assert_eq!(response.pd_adjusted, 0.5);
    assert!(!response.prior_shift.applied);
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_engine_is_shared_across_threads() {
    let engine = Arc::new(
        EngineBuilder::new()
            .schema(FeatureSchema::from_names(["a", "b"]))
            .classifier(RecordingClassifier::new(0.05, &["a", "b"]))
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let features = request(json!({"a": i, "b": 1}));
                engine.score(&features, ScoreOptions::default()).unwrap().score
            })
        })
        .collect();

    let expected = score_from_pd(0.05);
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}
