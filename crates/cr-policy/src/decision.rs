//! Decision banding for Credo.
//!
//! A [`DecisionPolicy`] holds exactly one [`PolicyMode`] and a minimum
//! nonzero-feature count. Evaluation bands the applicant first, then applies
//! the sparsity gate, which can only make a decision stricter.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Lowest score the score mapper can produce.
pub const SCORE_MIN: i32 = 300;
/// Highest score the score mapper can produce.
pub const SCORE_MAX: i32 = 900;

/// Minimum nonzero features required before an approval can stand.
pub const DEFAULT_MIN_NONZERO_FEATURES: usize = 5;

/// Final credit decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Review,
    Reject,
}

impl Decision {
    /// Lowercase label used on the wire and in metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Review => "review",
            Decision::Reject => "reject",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bands on the (possibly prior-shifted) probability of default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PdThresholds {
    /// Approve when PD is strictly below this value.
    pub approve_max: f64,
    /// Review when PD is strictly below this value (and not approved).
    pub review_max: f64,
}

impl Default for PdThresholds {
    fn default() -> Self {
        Self {
            approve_max: 0.03,
            review_max: 0.08,
        }
    }
}

/// Bands on the integer credit score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreThresholds {
    /// Approve when the score is at least this value.
    pub approve_min: i32,
    /// Review when the score is at least this value (and not approved).
    pub review_min: i32,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            approve_min: 700,
            review_min: 650,
        }
    }
}

/// Banding strategy. Only one can be active at a time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PolicyMode {
    PdThreshold(PdThresholds),
    ScoreThreshold(ScoreThresholds),
}

impl PolicyMode {
    /// Short mode label (`pd` or `score`).
    pub fn name(&self) -> &'static str {
        match self {
            PolicyMode::PdThreshold(_) => "pd",
            PolicyMode::ScoreThreshold(_) => "score",
        }
    }

    fn band(&self, pd: f64, score: i32) -> Decision {
        match self {
            PolicyMode::PdThreshold(t) => {
                if pd < t.approve_max {
                    Decision::Approve
                } else if pd < t.review_max {
                    Decision::Review
                } else {
                    Decision::Reject
                }
            }
            PolicyMode::ScoreThreshold(t) => {
                if score >= t.approve_min {
                    Decision::Approve
                } else if score >= t.review_min {
                    Decision::Review
                } else {
                    Decision::Reject
                }
            }
        }
    }
}

impl Default for PolicyMode {
    fn default() -> Self {
        PolicyMode::ScoreThreshold(ScoreThresholds::default())
    }
}

/// A configuration problem that degrades, but does not stop, decisioning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyWarning {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable explanation.
    pub message: String,
}

impl PolicyWarning {
    fn new(code: &str, message: String) -> Self {
        Self {
            code: code.to_string(),
            message,
        }
    }
}

/// Result of evaluating one applicant against the policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyOutcome {
    /// Decision after the sparsity gate.
    pub decision: Decision,
    /// Decision from banding alone.
    pub tentative: Decision,
    /// Whether the sparsity gate downgraded an approval.
    pub sparsity_downgraded: bool,
    /// Number of nonzero entries in the dense feature vector.
    pub nonzero_features: usize,
    /// Whether the policy carries misconfiguration warnings.
    pub flagged: bool,
    /// Whether the decision was capped at review because the PD could not be
    /// computed by the classifier.
    #[serde(default)]
    pub held_for_review: bool,
}

/// Decision policy: one banding mode plus the sparsity gate.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DecisionPolicy {
    #[serde(flatten)]
    mode: PolicyMode,
    min_nonzero_features: usize,
    #[serde(skip)]
    warnings: Vec<PolicyWarning>,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::new(PolicyMode::default(), DEFAULT_MIN_NONZERO_FEATURES)
    }
}

impl DecisionPolicy {
    /// Creates a policy and validates its thresholds once.
    pub fn new(mode: PolicyMode, min_nonzero_features: usize) -> Self {
        let warnings = validate_mode(&mode);
        for w in &warnings {
            warn!(code = %w.code, "{}", w.message);
        }
        Self {
            mode,
            min_nonzero_features,
            warnings,
        }
    }

    pub fn mode(&self) -> &PolicyMode {
        &self.mode
    }

    pub fn min_nonzero_features(&self) -> usize {
        self.min_nonzero_features
    }

    /// Misconfiguration warnings computed at construction.
    pub fn warnings(&self) -> &[PolicyWarning] {
        &self.warnings
    }

    /// Whether decisions from this policy should be treated as suspect.
    pub fn is_flagged(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Bands the applicant, then applies the sparsity gate.
    pub fn evaluate(&self, pd: f64, score: i32, nonzero_features: usize) -> PolicyOutcome {
        let tentative = self.mode.band(pd, score);
        let sparse = nonzero_features < self.min_nonzero_features;
        let (decision, sparsity_downgraded) = match tentative {
            Decision::Approve if sparse => (Decision::Review, true),
            other => (other, false),
        };

        if sparsity_downgraded {
            debug!(
                nonzero_features,
                min_nonzero_features = self.min_nonzero_features,
                "Approval downgraded to review by sparsity gate"
            );
        }

        PolicyOutcome {
            decision,
            tentative,
            sparsity_downgraded,
            nonzero_features,
            flagged: self.is_flagged(),
            held_for_review: false,
        }
    }

    /// Evaluates as usual, then forces the decision to review.
    ///
    /// Used when the PD is a fallback estimate rather than a classifier output:
    /// neither an approval nor a rejection can rest on it.
    pub fn hold_for_review(&self, pd: f64, score: i32, nonzero_features: usize) -> PolicyOutcome {
        let outcome = self.evaluate(pd, score, nonzero_features);
        debug!(tentative = %outcome.tentative, "Decision held for review");
        PolicyOutcome {
            decision: Decision::Review,
            held_for_review: true,
            ..outcome
        }
    }
}

fn validate_mode(mode: &PolicyMode) -> Vec<PolicyWarning> {
    let mut warnings = Vec::new();
    match mode {
        PolicyMode::PdThreshold(t) => {
            if !t.approve_max.is_finite() || !t.review_max.is_finite() {
                warnings.push(PolicyWarning::new(
                    "pd_threshold_not_finite",
                    format!(
                        "PD thresholds must be finite (approve_max={}, review_max={})",
                        t.approve_max, t.review_max
                    ),
                ));
                return warnings;
            }
            if t.approve_max > t.review_max {
                warnings.push(PolicyWarning::new(
                    "pd_thresholds_inverted",
                    format!(
                        "approve_max ({}) exceeds review_max ({}); the review band is empty",
                        t.approve_max, t.review_max
                    ),
                ));
            }
            for (name, value) in [("approve_max", t.approve_max), ("review_max", t.review_max)] {
                if value <= 0.0 || value >= 1.0 {
                    warnings.push(PolicyWarning::new(
                        "pd_threshold_out_of_range",
                        format!("{} ({}) lies outside the open interval (0, 1)", name, value),
                    ));
                }
            }
        }
        PolicyMode::ScoreThreshold(t) => {
            if t.approve_min < t.review_min {
                warnings.push(PolicyWarning::new(
                    "score_thresholds_inverted",
                    format!(
                        "approve_min ({}) is below review_min ({}); the review band is empty",
                        t.approve_min, t.review_min
                    ),
                ));
            }
            for (name, value) in [("approve_min", t.approve_min), ("review_min", t.review_min)] {
                if !(SCORE_MIN..=SCORE_MAX).contains(&value) {
                    warnings.push(PolicyWarning::new(
                        "score_threshold_out_of_range",
                        format!(
                            "{} ({}) lies outside the score range [{}, {}]",
                            name, value, SCORE_MIN, SCORE_MAX
                        ),
                    ));
                }
            }
        }
    }
    warnings
}
