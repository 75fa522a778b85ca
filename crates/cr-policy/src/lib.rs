//! # cr-policy
//!
//! Decision policy for Credo.
//!
//! This crate turns a probability of default and its banded score into an
//! approve/review/reject decision. It supports two mutually exclusive banding
//! modes (PD thresholds or score thresholds) and a sparsity gate that refuses
//! to approve applicants with too little nonzero evidence.

pub mod config;
pub mod decision;

pub use config::{load_policy, parse_policy, ConfigError, PolicyConfig, PolicyModeKind};
pub use decision::{
    Decision, DecisionPolicy, PdThresholds, PolicyMode, PolicyOutcome, PolicyWarning,
    ScoreThresholds, DEFAULT_MIN_NONZERO_FEATURES, SCORE_MAX, SCORE_MIN,
};
