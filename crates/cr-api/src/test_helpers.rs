//! Shared test helpers for the cr-api crate.
//!
//! Engines here are built from in-memory fakes, so route tests never touch
//! artifact files.

use cr_core::{
    AttributionModel, FeatureSchema, FixedRuntimePrior, ModelError, ModelIntrospection,
    ProbabilityModel, ScoringEngine,
};
use cr_observability::DecisionAuditor;
use std::sync::Arc;

use crate::state::AppState;

/// Resolved feature order of the default test engine.
pub const FEATURES: [&str; 6] = [
    "email_overdue_ratio",
    "sms_fin_ratio",
    "sms_count",
    "contacts_count",
    "social_posts_sum",
    "monthly_income_vnd",
];

/// Returns a fixed PD and uses each feature value as its own contribution.
pub struct FakeClassifier {
    pub pd: f64,
    pub names: Vec<String>,
}

impl ProbabilityModel for FakeClassifier {
    fn predict_probability(&self, _features: &[f64]) -> Result<f64, ModelError> {
        Ok(self.pd)
    }

    fn introspect(&self) -> ModelIntrospection {
        ModelIntrospection::Names(self.names.clone())
    }

    fn version(&self) -> Option<&str> {
        Some("fake-1")
    }
}

impl AttributionModel for FakeClassifier {
    fn explain(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        Ok(features.to_vec())
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn state_for(classifier: FakeClassifier, schema: &[&str]) -> AppState {
    let classifier = Arc::new(classifier);
    let engine = ScoringEngine::builder()
        .schema(FeatureSchema::from_names(schema.iter().copied()))
        .classifier(classifier.clone())
        .attribution(classifier)
        .train_prior(Some(0.05))
        .runtime_prior(Arc::new(FixedRuntimePrior(Some(0.05))))
        .build()
        .expect("test engine should build");
    AppState::new(Arc::new(engine)).with_auditor(DecisionAuditor::disabled())
}

/// State around a healthy engine that always returns `pd`.
///
/// Train and runtime priors are equal, so the PD passes through unchanged.
pub fn test_state(pd: f64) -> AppState {
    state_for(
        FakeClassifier {
            pd,
            names: names(&FEATURES),
        },
        &FEATURES,
    )
}

/// State whose classifier returns a non-probability.
pub fn failing_state() -> AppState {
    state_for(
        FakeClassifier {
            pd: f64::NAN,
            names: names(&FEATURES),
        },
        &FEATURES,
    )
}

/// State whose schema and model feature sets only overlap.
pub fn divergent_state() -> AppState {
    state_for(
        FakeClassifier {
            pd: 0.02,
            names: names(&["sms_count", "contacts_count", "device_age_days"]),
        },
        &["email_overdue_ratio", "sms_count", "contacts_count"],
    )
}
