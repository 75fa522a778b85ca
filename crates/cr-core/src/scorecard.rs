//! Logistic scorecard artifact.
//!
//! A standardized logistic regression with an optional isotonic calibration
//! curve. It serves both as the classifier and as its own attribution model:
//! each feature's contribution is its standardized log-odds term.

use crate::artifacts::{read_json, ArtifactError};
use crate::model::{AttributionModel, ModelError, ModelIntrospection, ProbabilityModel};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

const KIND: &str = "classifier";

/// Per-feature standardization applied before the linear term.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Monotone piecewise-linear map from sigmoid output to calibrated PD.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IsotonicCurve {
    /// Breakpoints, ascending.
    pub x: Vec<f64>,
    /// Calibrated values at each breakpoint, non-decreasing.
    pub y: Vec<f64>,
}

impl IsotonicCurve {
    /// Linear interpolation, clamped to the end values outside the range.
    pub fn apply(&self, p: f64) -> f64 {
        let n = self.x.len();
        if n == 0 {
            return p;
        }
        if p <= self.x[0] {
            return self.y[0];
        }
        if p >= self.x[n - 1] {
            return self.y[n - 1];
        }

        let upper = self.x.partition_point(|&x| x < p);
        let (x0, x1) = (self.x[upper - 1], self.x[upper]);
        let (y0, y1) = (self.y[upper - 1], self.y[upper]);
        if x1 - x0 <= f64::EPSILON {
            return y1;
        }
        y0 + (y1 - y0) * (p - x0) / (x1 - x0)
    }

    fn validate(&self) -> Result<(), String> {
        if self.x.len() != self.y.len() {
            return Err(format!(
                "calibration has {} breakpoints but {} values",
                self.x.len(),
                self.y.len()
            ));
        }
        if self.x.iter().chain(&self.y).any(|v| !v.is_finite()) {
            return Err("calibration contains non-finite values".to_string());
        }
        if self.x.windows(2).any(|w| w[1] < w[0]) {
            return Err("calibration breakpoints are not ascending".to_string());
        }
        if self.y.windows(2).any(|w| w[1] < w[0]) {
            return Err("calibration values are not monotone".to_string());
        }
        if self.y.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return Err("calibration values must lie in [0, 1]".to_string());
        }
        Ok(())
    }
}

/// Serialized logistic scorecard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogisticScorecard {
    #[serde(default)]
    pub version: Option<String>,
    /// Feature order the model was fit on. Absent in older artifacts.
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub scaler: Option<Scaler>,
    #[serde(default)]
    pub calibration: Option<IsotonicCurve>,
}

impl LogisticScorecard {
    /// Loads and validates a scorecard artifact.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let model: Self = read_json(KIND, path)?;
        model.validate()?;
        debug!(
            path = %path.display(),
            features = model.coefficients.len(),
            calibrated = model.calibration.is_some(),
            "Loaded logistic scorecard"
        );
        Ok(model)
    }

    /// Checks internal consistency.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        let invalid = |message: String| ArtifactError::Invalid {
            kind: KIND,
            message,
        };
        let n = self.coefficients.len();

        if n == 0 {
            return Err(invalid("scorecard has no coefficients".to_string()));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(invalid("scorecard contains non-finite weights".to_string()));
        }
        if let Some(names) = &self.feature_names {
            if names.len() != n {
                return Err(invalid(format!(
                    "{} feature names for {} coefficients",
                    names.len(),
                    n
                )));
            }
        }
        if let Some(scaler) = &self.scaler {
            if scaler.mean.len() != n || scaler.scale.len() != n {
                return Err(invalid(format!(
                    "scaler dimensions ({}, {}) do not match {} coefficients",
                    scaler.mean.len(),
                    scaler.scale.len(),
                    n
                )));
            }
            if scaler.mean.iter().any(|m| !m.is_finite())
                || scaler.scale.iter().any(|s| !s.is_finite() || *s == 0.0)
            {
                return Err(invalid(
                    "scaler entries must be finite and scales non-zero".to_string(),
                ));
            }
        }
        if let Some(curve) = &self.calibration {
            curve.validate().map_err(invalid)?;
        }
        Ok(())
    }

    fn check_len(&self, features: &[f64]) -> Result<(), ModelError> {
        if features.len() != self.coefficients.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.coefficients.len(),
                actual: features.len(),
            });
        }
        Ok(())
    }

    /// Standardized log-odds term for each feature.
    fn terms(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(&self.coefficients)
            .enumerate()
            .map(|(i, (x, coef))| {
                let z = match &self.scaler {
                    Some(s) => (x - s.mean[i]) / s.scale[i],
                    None => *x,
                };
                coef * z
            })
            .collect()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl ProbabilityModel for LogisticScorecard {
    fn predict_probability(&self, features: &[f64]) -> Result<f64, ModelError> {
        self.check_len(features)?;
        let z = self.intercept + self.terms(features).iter().sum::<f64>();
        let p = sigmoid(z);
        let p = match &self.calibration {
            Some(curve) => curve.apply(p),
            None => p,
        };
        if p.is_finite() {
            Ok(p)
        } else {
            Err(ModelError::Inference(format!("non-finite probability for log-odds {}", z)))
        }
    }

    fn introspect(&self) -> ModelIntrospection {
        match &self.feature_names {
            Some(names) => ModelIntrospection::Names(names.clone()),
            None => ModelIntrospection::Count(self.coefficients.len()),
        }
    }

    fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl AttributionModel for LogisticScorecard {
    fn explain(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        self.check_len(features)?;
        Ok(self.terms(features))
    }
}
