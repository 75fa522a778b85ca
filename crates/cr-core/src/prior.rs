//! Prior-shift recalibration.
//!
//! Operators can move the decision boundary to a live population's event
//! rate without retraining: the classifier's PD is re-weighted from the
//! train-time prevalence to a target prevalence with the closed-form Bayes
//! correction. The target is re-read on every request.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Clip applied around the transform.
pub const PRIOR_EPSILON: f64 = 1e-9;

/// Source of the live target prevalence.
///
/// Implementations must never fail: any read problem is reported as `None`.
pub trait RuntimePriorSource: Send + Sync {
    fn target_prevalence(&self) -> Option<f64>;

    /// Where the value comes from, for status output.
    fn describe(&self) -> String;
}

/// A constant target prevalence (or none).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FixedRuntimePrior(pub Option<f64>);

impl RuntimePriorSource for FixedRuntimePrior {
    fn target_prevalence(&self) -> Option<f64> {
        self.0
    }

    fn describe(&self) -> String {
        match self.0 {
            Some(v) => format!("fixed({})", v),
            None => "none".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RuntimePriorRecord {
    Record {
        #[serde(alias = "pi_target")]
        target_prevalence: Option<f64>,
    },
    Bare(f64),
}

/// Reads the target prevalence from a JSON file on every call.
#[derive(Debug, Clone)]
pub struct FileRuntimePrior {
    path: PathBuf,
}

impl FileRuntimePrior {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuntimePriorSource for FileRuntimePrior {
    fn target_prevalence(&self) -> Option<f64> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Runtime prior not readable");
                return None;
            }
        };
        match serde_json::from_str::<RuntimePriorRecord>(&content) {
            Ok(RuntimePriorRecord::Record { target_prevalence }) => target_prevalence,
            Ok(RuntimePriorRecord::Bare(v)) => Some(v),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Runtime prior not parseable; ignoring");
                None
            }
        }
    }

    fn describe(&self) -> String {
        format!("file({})", self.path.display())
    }
}

/// Re-weights `p` from prevalence `pi_train` to prevalence `pi_target`.
///
/// Returns `None` when either prior lies outside (0, 1) or the arithmetic
/// degenerates. Equal priors return `p` unchanged.
pub fn shift_prior(p: f64, pi_train: f64, pi_target: f64) -> Option<f64> {
    let valid_prior = |v: f64| v.is_finite() && v > 0.0 && v < 1.0;
    if !p.is_finite() || !valid_prior(pi_train) || !valid_prior(pi_target) {
        return None;
    }
    if pi_train == pi_target {
        return Some(p);
    }

    let p = p.clamp(PRIOR_EPSILON, 1.0 - PRIOR_EPSILON);
    let positive = p * (pi_target / pi_train);
    let negative = (1.0 - p) * ((1.0 - pi_target) / (1.0 - pi_train));
    let adjusted = positive / (positive + negative);

    if adjusted.is_finite() {
        Some(adjusted.clamp(PRIOR_EPSILON, 1.0 - PRIOR_EPSILON))
    } else {
        None
    }
}

/// Why the calibrator left the PD untouched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PriorShiftSkip {
    NoTrainPrior,
    NoTargetPrior,
    InvalidTargetPrior,
    NumericalFailure,
}

/// Outcome of calibrating one PD.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriorShiftOutcome {
    pub raw_pd: f64,
    pub adjusted_pd: f64,
    pub applied: bool,
    pub pi_train: Option<f64>,
    pub pi_target: Option<f64>,
    pub skipped: Option<PriorShiftSkip>,
}

impl PriorShiftOutcome {
    fn passthrough(raw_pd: f64, pi_train: Option<f64>, pi_target: Option<f64>, skip: PriorShiftSkip) -> Self {
        Self {
            raw_pd,
            adjusted_pd: raw_pd,
            applied: false,
            pi_train,
            pi_target,
            skipped: Some(skip),
        }
    }
}

/// Applies the prior shift using the fixed train prior and a live target.
#[derive(Clone)]
pub struct PriorShiftCalibrator {
    train_prior: Option<f64>,
    runtime: Arc<dyn RuntimePriorSource>,
}

impl std::fmt::Debug for PriorShiftCalibrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorShiftCalibrator")
            .field("train_prior", &self.train_prior)
            .field("runtime", &self.runtime.describe())
            .finish()
    }
}

impl PriorShiftCalibrator {
    pub fn new(train_prior: Option<f64>, runtime: Arc<dyn RuntimePriorSource>) -> Self {
        Self {
            train_prior,
            runtime,
        }
    }

    /// A calibrator that never shifts.
    pub fn disabled() -> Self {
        Self::new(None, Arc::new(FixedRuntimePrior(None)))
    }

    pub fn train_prior(&self) -> Option<f64> {
        self.train_prior
    }

    /// Current target prevalence, read fresh.
    pub fn current_target(&self) -> Option<f64> {
        self.runtime.target_prevalence()
    }

    pub fn source_description(&self) -> String {
        self.runtime.describe()
    }

    /// Calibrates with a target already read for this request.
    pub fn apply_with_target(&self, raw_pd: f64, pi_target: Option<f64>) -> PriorShiftOutcome {
        let Some(pi_train) = self.train_prior else {
            return PriorShiftOutcome::passthrough(raw_pd, None, pi_target, PriorShiftSkip::NoTrainPrior);
        };
        let Some(target) = pi_target else {
            return PriorShiftOutcome::passthrough(raw_pd, Some(pi_train), None, PriorShiftSkip::NoTargetPrior);
        };
        if !(target.is_finite() && target > 0.0 && target < 1.0) {
            warn!(pi_target = target, "Target prevalence outside (0, 1); prior shift skipped");
            return PriorShiftOutcome::passthrough(
                raw_pd,
                Some(pi_train),
                Some(target),
                PriorShiftSkip::InvalidTargetPrior,
            );
        }

        match shift_prior(raw_pd, pi_train, target) {
            Some(adjusted_pd) => PriorShiftOutcome {
                raw_pd,
                adjusted_pd,
                applied: true,
                pi_train: Some(pi_train),
                pi_target: Some(target),
                skipped: None,
            },
            None => {
                warn!(raw_pd, pi_train, pi_target = target, "Prior shift failed; using raw PD");
                PriorShiftOutcome::passthrough(
                    raw_pd,
                    Some(pi_train),
                    Some(target),
                    PriorShiftSkip::NumericalFailure,
                )
            }
        }
    }

    /// Reads the live target once and calibrates.
    pub fn apply(&self, raw_pd: f64) -> PriorShiftOutcome {
        self.apply_with_target(raw_pd, self.current_target())
    }
}
