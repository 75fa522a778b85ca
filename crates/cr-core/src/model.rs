//! Capabilities the engine needs from trained artifacts.
//!
//! The classifier and the attribution model are opaque: the engine only
//! knows that one produces a probability and the other produces per-feature
//! contributions. Both are trait objects so that reconciliation and decision
//! logic can be exercised against fakes.

use thiserror::Error;

/// Lower/upper clip applied to raw classifier output.
pub const PD_EPSILON: f64 = 1e-9;

/// Errors reported by model implementations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// The input vector does not have the length the model was fit on.
    #[error("Expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Inference failed for an implementation-specific reason.
    #[error("Inference failed: {0}")]
    Inference(String),
}

/// What a classifier can say about its own inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelIntrospection {
    /// Ordered feature names the model was fit on.
    Names(Vec<String>),
    /// Only the number of features is known.
    Count(usize),
    /// Nothing is exposed.
    Opaque,
}

/// A trained classifier that outputs the positive-class probability.
pub trait ProbabilityModel: Send + Sync {
    /// Probability of default for one dense, ordered feature vector.
    fn predict_probability(&self, features: &[f64]) -> Result<f64, ModelError>;

    /// Feature order or count the model exposes, if any.
    fn introspect(&self) -> ModelIntrospection {
        ModelIntrospection::Opaque
    }

    /// Version identifier for audit metadata.
    fn version(&self) -> Option<&str> {
        None
    }
}

/// Produces signed per-feature contributions for a single observation.
///
/// The returned vector is aligned with the input: element `i` is the
/// contribution of feature `i`. Positive values push toward default.
pub trait AttributionModel: Send + Sync {
    fn explain(&self, features: &[f64]) -> Result<Vec<f64>, ModelError>;
}

/// Errors from the probability estimation step.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EstimatorError {
    #[error("Classifier failed: {0}")]
    Model(#[from] ModelError),

    #[error("Classifier returned an invalid probability: {0}")]
    InvalidProbability(f64),
}

/// Calls the classifier and returns a raw PD in the open interval (0, 1).
pub fn estimate_pd(model: &dyn ProbabilityModel, features: &[f64]) -> Result<f64, EstimatorError> {
    let pd = model.predict_probability(features)?;
    if !pd.is_finite() || !(0.0..=1.0).contains(&pd) {
        return Err(EstimatorError::InvalidProbability(pd));
    }
    Ok(pd.clamp(PD_EPSILON, 1.0 - PD_EPSILON))
}
