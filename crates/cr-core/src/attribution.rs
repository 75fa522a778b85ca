//! Top-K feature attribution.

use crate::model::AttributionModel;
use crate::schema::ForbiddenColumns;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Default number of attributions returned.
pub const DEFAULT_TOP_K: usize = 5;

/// Which way a feature pushed the prediction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Toward default.
    Up,
    /// Away from default.
    Down,
}

impl Direction {
    pub fn of(contribution: f64) -> Self {
        if contribution > 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}

/// One ranked attribution entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attribution {
    pub feature: String,
    /// Value used in the dense vector.
    pub value: f64,
    pub contribution: f64,
    pub abs_contribution: f64,
    pub direction: Direction,
}

/// Availability of the explanation for one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum AttributionStatus {
    Available,
    /// No attribution model is configured.
    Unavailable,
    /// The caller did not ask for an explanation.
    Skipped,
    Failed(String),
}

/// Attributions plus how they were obtained.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributionOutcome {
    pub attributions: Vec<Attribution>,
    pub status: AttributionStatus,
}

impl AttributionOutcome {
    fn empty(status: AttributionStatus) -> Self {
        Self {
            attributions: Vec::new(),
            status,
        }
    }
}

/// Ranks contributions by magnitude and keeps the first `k` allowed ones.
pub fn rank_contributions(
    names: &[String],
    values: &[f64],
    contributions: &[f64],
    forbidden: &ForbiddenColumns,
    k: usize,
) -> Vec<Attribution> {
    let mut ranked: Vec<Attribution> = names
        .iter()
        .zip(values)
        .zip(contributions)
        .filter(|((name, _), c)| c.is_finite() && !forbidden.contains(name))
        .map(|((name, value), c)| Attribution {
            feature: name.clone(),
            value: *value,
            contribution: *c,
            abs_contribution: c.abs(),
            direction: Direction::of(*c),
        })
        .collect();

    // stable: ties keep feature order
    ranked.sort_by(|a, b| b.abs_contribution.total_cmp(&a.abs_contribution));
    ranked.truncate(k);
    ranked
}

/// Wraps the optional attribution model.
#[derive(Clone)]
pub struct AttributionExtractor {
    model: Option<Arc<dyn AttributionModel>>,
    top_k: usize,
}

impl std::fmt::Debug for AttributionExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributionExtractor")
            .field("available", &self.model.is_some())
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl AttributionExtractor {
    pub fn new(model: Option<Arc<dyn AttributionModel>>, top_k: usize) -> Self {
        Self { model, top_k }
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Explains one vector. Never fails; problems yield an empty list.
    pub fn extract(
        &self,
        names: &[String],
        values: &[f64],
        forbidden: &ForbiddenColumns,
        top_k: Option<usize>,
    ) -> AttributionOutcome {
        let Some(model) = &self.model else {
            return AttributionOutcome::empty(AttributionStatus::Unavailable);
        };

        let contributions = match model.explain(values) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Attribution model failed; returning no attributions");
                return AttributionOutcome::empty(AttributionStatus::Failed(e.to_string()));
            }
        };
        if contributions.len() != names.len() {
            let message = format!(
                "attribution model returned {} values for {} features",
                contributions.len(),
                names.len()
            );
            warn!("{}", message);
            return AttributionOutcome::empty(AttributionStatus::Failed(message));
        }

        AttributionOutcome {
            attributions: rank_contributions(
                names,
                values,
                &contributions,
                forbidden,
                top_k.unwrap_or(self.top_k),
            ),
            status: AttributionStatus::Available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelError;

    struct Fixed(Vec<f64>);

    impl AttributionModel for Fixed {
        fn explain(&self, _features: &[f64]) -> Result<Vec<f64>, ModelError> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl AttributionModel for Broken {
        fn explain(&self, _features: &[f64]) -> Result<Vec<f64>, ModelError> {
            Err(ModelError::Inference("explainer crashed".to_string()))
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ranked_by_absolute_contribution() {
        let ranked = rank_contributions(
            &names(&["a", "b", "c", "d"]),
            &[1.0, 2.0, 3.0, 4.0],
            &[0.1, -0.7, 0.4, 0.0],
            &ForbiddenColumns::default(),
            3,
        );
        let order: Vec<&str> = ranked.iter().map(|a| a.feature.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert_eq!(ranked[0].direction, Direction::Down);
        assert_eq!(ranked[0].abs_contribution, 0.7);
        assert_eq!(ranked[0].value, 2.0);
        assert_eq!(ranked[1].direction, Direction::Up);
    }

    #[test]
    fn test_forbidden_features_never_appear() {
        let extractor = AttributionExtractor::new(Some(Arc::new(Fixed(vec![9.0, 0.2, -0.1]))), 2);
        let outcome = extractor.extract(
            &names(&["app_id", "income", "tenure"]),
            &[12345.0, 1.0, 1.0],
            &ForbiddenColumns::defaults(),
            None,
        );
        assert_eq!(outcome.status, AttributionStatus::Available);
        let order: Vec<&str> = outcome.attributions.iter().map(|a| a.feature.as_str()).collect();
        assert_eq!(order, vec!["income", "tenure"]);
    }

    #[test]
    fn test_ties_keep_feature_order() {
        let ranked = rank_contributions(
            &names(&["x", "y", "z"]),
            &[0.0; 3],
            &[0.5, -0.5, 0.5],
            &ForbiddenColumns::default(),
            3,
        );
        let order: Vec<&str> = ranked.iter().map(|a| a.feature.as_str()).collect();
        assert_eq!(order, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_non_finite_contributions_are_skipped() {
        let ranked = rank_contributions(
            &names(&["x", "y"]),
            &[0.0; 2],
            &[f64::NAN, 0.1],
            &ForbiddenColumns::default(),
            5,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].feature, "y");
    }

    #[test]
    fn test_missing_model_is_not_an_error() {
        let extractor = AttributionExtractor::new(None, 5);
        let outcome = extractor.extract(&names(&["a"]), &[1.0], &ForbiddenColumns::default(), None);
        assert!(outcome.attributions.is_empty());
        assert_eq!(outcome.status, AttributionStatus::Unavailable);
    }

    #[test]
    fn test_model_failure_yields_empty_list() {
        let extractor = AttributionExtractor::new(Some(Arc::new(Broken)), 5);
        let outcome = extractor.extract(&names(&["a"]), &[1.0], &ForbiddenColumns::default(), None);
        assert!(outcome.attributions.is_empty());
        assert!(matches!(outcome.status, AttributionStatus::Failed(_)));
    }

    #[test]
    fn test_length_mismatch_yields_empty_list() {
        let extractor = AttributionExtractor::new(Some(Arc::new(Fixed(vec![0.1]))), 5);
        let outcome = extractor.extract(
            &names(&["a", "b"]),
            &[1.0, 2.0],
            &ForbiddenColumns::default(),
            None,
        );
        assert!(outcome.attributions.is_empty());
        assert!(matches!(outcome.status, AttributionStatus::Failed(_)));
    }

    #[test]
    fn test_per_request_top_k_override() {
        let extractor = AttributionExtractor::new(Some(Arc::new(Fixed(vec![0.3, 0.2, 0.1]))), 1);
        let outcome = extractor.extract(
            &names(&["a", "b", "c"]),
            &[1.0; 3],
            &ForbiddenColumns::default(),
            Some(3),
        );
        assert_eq!(outcome.attributions.len(), 3);
    }
}
