//! Application state shared across handlers.

use cr_core::ScoringEngine;
use cr_observability::{DecisionAuditor, ScoringMetrics};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The loaded scoring engine. Immutable for the life of the process.
    pub engine: Arc<ScoringEngine>,
    /// Scoring metrics recorder.
    pub metrics: ScoringMetrics,
    /// Decision audit sink.
    pub auditor: DecisionAuditor,
    /// Prometheus metrics handle for rendering metrics (optional).
    pub prometheus_handle: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    /// Creates a new application state around a loaded engine.
    pub fn new(engine: Arc<ScoringEngine>) -> Self {
        Self {
            engine,
            metrics: ScoringMetrics::new(),
            auditor: DecisionAuditor::new(),
            prometheus_handle: None,
        }
    }

    /// Sets the Prometheus handle for metrics rendering.
    pub fn with_prometheus_handle(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus_handle = Some(Arc::new(handle));
        self
    }

    /// Replaces the decision auditor.
    pub fn with_auditor(mut self, auditor: DecisionAuditor) -> Self {
        self.auditor = auditor;
        self
    }
}
