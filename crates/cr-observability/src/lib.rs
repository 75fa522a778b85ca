//! # cr-observability
//!
//! Logging, metrics, and audit infrastructure for Credo.
//!
//! This crate provides structured logging with tracing, Prometheus metrics
//! for the scoring path, and one structured audit event per decision.
//!
//! ## Decision Audit
//!
//! Audit events are emitted on the `credo::audit` tracing target so they can
//! be routed to a separate sink. Nothing is retained in memory.

pub mod audit;
pub mod logging;
pub mod metrics;

pub use audit::{DecisionAuditEntry, DecisionAuditEntryBuilder, DecisionAuditor, AUDIT_TARGET};
pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
pub use metrics::{install_prometheus_recorder, ScoreObservation, ScoringMetrics};
