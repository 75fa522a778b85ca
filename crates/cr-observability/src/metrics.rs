//! Metrics collection for Credo.
//!
//! This module records scoring metrics using the metrics crate
//! with Prometheus export support.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Once;
use std::time::Duration;

static REGISTER: Once = Once::new();

/// Installs the global Prometheus recorder and returns its render handle.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// What one scored request looked like, for metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreObservation<'a> {
    pub decision: &'a str,
    pub missing_features: usize,
    pub prior_shift_applied: bool,
    pub sparsity_downgraded: bool,
    pub attribution_failed: bool,
    pub duration: Duration,
}

/// Records scoring metrics. Holds no state of its own.
#[derive(Debug, Clone)]
pub struct ScoringMetrics;

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoringMetrics {
    /// Creates a collector, registering metric descriptions once per process.
    pub fn new() -> Self {
        REGISTER.call_once(Self::register_metrics);
        Self
    }

    /// Registers metric descriptions.
    pub fn register_metrics() {
        describe_counter!("credo_scores_total", "Total number of scored requests by decision");
        describe_counter!(
            "credo_prior_shift_applied_total",
            "Scored requests whose PD was prior-shift adjusted"
        );
        describe_counter!(
            "credo_sparsity_downgrades_total",
            "Approvals downgraded to review by the sparsity gate"
        );
        describe_counter!(
            "credo_attribution_failures_total",
            "Requests whose attribution could not be computed"
        );
        describe_counter!("credo_scoring_errors_total", "Scoring requests that failed");

        describe_histogram!(
            "credo_missing_features",
            "Number of resolved features absent from each request"
        );
        describe_histogram!(
            "credo_scoring_duration_seconds",
            "Time to score one request"
        );
    }

    /// Records one successful score.
    pub fn record_score(&self, observation: &ScoreObservation<'_>) {
        counter!("credo_scores_total", "decision" => observation.decision.to_string()).increment(1);
        if observation.prior_shift_applied {
            counter!("credo_prior_shift_applied_total").increment(1);
        }
        if observation.sparsity_downgraded {
            counter!("credo_sparsity_downgrades_total").increment(1);
        }
        if observation.attribution_failed {
            counter!("credo_attribution_failures_total").increment(1);
        }
        histogram!("credo_missing_features").record(observation.missing_features as f64);
        histogram!("credo_scoring_duration_seconds").record(observation.duration.as_secs_f64());
    }

    /// Records a failed scoring request.
    pub fn record_error(&self, error_type: &str) {
        counter!("credo_scoring_errors_total", "type" => error_type.to_string()).increment(1);
    }
}
