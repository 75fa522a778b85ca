//! Decision audit logging for Credo.
//!
//! Every decision produces one structured [`DecisionAuditEntry`] on the
//! [`AUDIT_TARGET`] tracing target. Entries are not stored: each request is
//! independent and the service keeps no history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Tracing target for audit events.
pub const AUDIT_TARGET: &str = "credo::audit";

/// One audited decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionAuditEntry {
    /// Unique entry ID.
    pub id: Uuid,
    /// Timestamp.
    pub timestamp: DateTime<Utc>,
    /// Correlation ID of the originating request.
    pub request_id: Option<String>,
    /// Final decision label.
    pub decision: String,
    /// Decision before the sparsity gate.
    pub tentative_decision: String,
    pub pd_raw: f64,
    pub pd_adjusted: f64,
    pub score: i32,
    pub prior_shift_applied: bool,
    pub sparsity_downgraded: bool,
    /// Active policy mode (`pd` or `score`).
    pub policy_mode: String,
    pub policy_flagged: bool,
    pub model_version: Option<String>,
    pub schema_version: Option<String>,
    pub missing_features: usize,
    pub coerced_features: usize,
}

impl DecisionAuditEntry {
    /// Starts an entry for a decision.
    pub fn builder(decision: impl Into<String>) -> DecisionAuditEntryBuilder {
        DecisionAuditEntryBuilder::new(decision)
    }
}

/// Builder for [`DecisionAuditEntry`].
#[derive(Debug, Clone)]
pub struct DecisionAuditEntryBuilder {
    entry: DecisionAuditEntry,
}

impl DecisionAuditEntryBuilder {
    fn new(decision: impl Into<String>) -> Self {
        let decision = decision.into();
        Self {
            entry: DecisionAuditEntry {
                id: Uuid::new_v4(),
                timestamp: Utc::now(),
                request_id: None,
                tentative_decision: decision.clone(),
                decision,
                pd_raw: 0.0,
                pd_adjusted: 0.0,
                score: 0,
                prior_shift_applied: false,
                sparsity_downgraded: false,
                policy_mode: String::new(),
                policy_flagged: false,
                model_version: None,
                schema_version: None,
                missing_features: 0,
                coerced_features: 0,
            },
        }
    }

    pub fn request_id(mut self, request_id: Option<String>) -> Self {
        self.entry.request_id = request_id;
        self
    }

    pub fn tentative_decision(mut self, tentative: impl Into<String>) -> Self {
        self.entry.tentative_decision = tentative.into();
        self
    }

    /// Raw and adjusted PD plus whether the prior shift changed anything.
    pub fn pd(mut self, raw: f64, adjusted: f64, prior_shift_applied: bool) -> Self {
        self.entry.pd_raw = raw;
        self.entry.pd_adjusted = adjusted;
        self.entry.prior_shift_applied = prior_shift_applied;
        self
    }

    pub fn score(mut self, score: i32) -> Self {
        self.entry.score = score;
        self
    }

    pub fn sparsity_downgraded(mut self, downgraded: bool) -> Self {
        self.entry.sparsity_downgraded = downgraded;
        self
    }

    pub fn policy(mut self, mode: impl Into<String>, flagged: bool) -> Self {
        self.entry.policy_mode = mode.into();
        self.entry.policy_flagged = flagged;
        self
    }

    pub fn versions(mut self, model: Option<String>, schema: Option<String>) -> Self {
        self.entry.model_version = model;
        self.entry.schema_version = schema;
        self
    }

    pub fn feature_quality(mut self, missing: usize, coerced: usize) -> Self {
        self.entry.missing_features = missing;
        self.entry.coerced_features = coerced;
        self
    }

    pub fn build(self) -> DecisionAuditEntry {
        self.entry
    }
}

/// Writes audit entries to the tracing pipeline.
#[derive(Debug, Clone)]
pub struct DecisionAuditor {
    enabled: bool,
}

impl Default for DecisionAuditor {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionAuditor {
    pub fn new() -> Self {
        Self { enabled: true }
    }

    /// An auditor that drops every entry.
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Emits one entry.
    pub fn record(&self, entry: &DecisionAuditEntry) {
        if !self.enabled {
            return;
        }
        let payload = serde_json::to_string(entry).unwrap_or_else(|_| "{}".to_string());
        info!(
            target: AUDIT_TARGET,
            audit_id = %entry.id,
            request_id = ?entry.request_id,
            decision = %entry.decision,
            score = entry.score,
            pd_adjusted = entry.pd_adjusted,
            policy_flagged = entry.policy_flagged,
            entry = %payload,
            "Audit: decision {}",
            entry.decision
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> DecisionAuditEntry {
        DecisionAuditEntry::builder("review")
            .request_id(Some("req-1".to_string()))
            .tentative_decision("approve")
            .pd(0.02, 0.015, true)
            .score(686)
            .sparsity_downgraded(true)
            .policy("score", false)
            .versions(Some("lr-1".to_string()), Some("2024-05-01".to_string()))
            .feature_quality(3, 1)
            .build()
    }

    #[test]
    fn test_builder_sets_fields() {
        let entry = entry();
        assert_eq!(entry.decision, "review");
        assert_eq!(entry.tentative_decision, "approve");
        assert_eq!(entry.pd_raw, 0.02);
        assert_eq!(entry.pd_adjusted, 0.015);
        assert!(entry.prior_shift_applied);
        assert!(entry.sparsity_downgraded);
        assert_eq!(entry.missing_features, 3);
        assert_eq!(entry.model_version.as_deref(), Some("lr-1"));
    }

    #[test]
    fn test_tentative_defaults_to_decision() {
        let entry = DecisionAuditEntry::builder("reject").build();
        assert_eq!(entry.tentative_decision, "reject");
    }

    #[test]
    fn test_entries_have_unique_ids() {
        assert_ne!(entry().id, entry().id);
    }

    #[test]
    fn test_serialization_round_trip() {
        let entry = entry();
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"request_id\":\"req-1\""));
        let back: DecisionAuditEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_disabled_auditor() {
        let auditor = DecisionAuditor::disabled();
        assert!(!auditor.is_enabled());
        auditor.record(&entry());
        assert!(DecisionAuditor::new().is_enabled());
    }
}
