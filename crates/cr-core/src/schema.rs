//! Schema reconciliation.
//!
//! Resolves the single feature order used for every request by comparing
//! the stored [`FeatureSchema`] against what the classifier reports about
//! itself. Runs once at startup; the result is immutable.

use crate::artifacts::FeatureSchema;
use crate::model::ModelIntrospection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{info, warn};

/// Label columns the training pipeline may have used.
pub const TARGET_COLUMN_CANDIDATES: &[&str] = &["label", "target", "default", "bad_flag", "pd_12m", "y"];

/// Identifier columns the training pipeline may have used.
pub const ID_COLUMN_CANDIDATES: &[&str] = &["app_id", "application_id", "id", "_row_id"];

/// Fatal reconciliation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Feature schema has no usable features after removing forbidden columns {removed:?}")]
    NoUsableFeatures { removed: Vec<String> },
}

/// Names that must never reach the classifier as request-supplied values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForbiddenColumns {
    names: HashSet<String>,
}

impl ForbiddenColumns {
    /// The default target and identifier candidates.
    pub fn defaults() -> Self {
        Self::default().with_names(
            TARGET_COLUMN_CANDIDATES
                .iter()
                .chain(ID_COLUMN_CANDIDATES)
                .copied(),
        )
    }

    /// Adds names to the set.
    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Adds the schema's own target and id columns.
    pub fn with_schema_metadata(self, schema: &FeatureSchema) -> Self {
        self.with_names(schema.target.iter().chain(schema.id_col.iter()).cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Sorted names, for reporting.
    pub fn sorted(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.iter().cloned().collect();
        names.sort();
        names
    }
}

/// How serious a reconciliation note is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum NoteSeverity {
    Info,
    Warning,
    Critical,
}

/// What a reconciliation note is about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    ForbiddenRemoved,
    DuplicateSchemaNames,
    FeatureCountMismatch,
    ModelOnlyFeatures,
    SchemaOnlyFeatures,
    DivergentFeatureSets,
    ForbiddenModelFeatures,
}

/// A non-fatal finding from reconciliation, surfaced on every status call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconciliationNote {
    pub severity: NoteSeverity,
    pub kind: NoteKind,
    pub message: String,
    pub features: Vec<String>,
}

impl ReconciliationNote {
    fn new(severity: NoteSeverity, kind: NoteKind, message: String, features: Vec<String>) -> Self {
        Self {
            severity,
            kind,
            message,
            features,
        }
    }
}

/// How the model's feature set relates to the schema's.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SchemaRelation {
    /// Same set; model order adopted.
    Equal,
    /// Model has extra features; model order adopted, extras zero-filled.
    ModelSuperset,
    /// Model uses fewer features; model order adopted, extras dropped.
    ModelSubset,
    /// Neither contains the other; schema order kept and flagged.
    Divergent,
    /// Model only reports a feature count.
    CountOnly,
    /// Model exposes nothing to compare against.
    Unverified,
}

/// The resolved feature order and everything learned while resolving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledSchema {
    order: Vec<String>,
    zero_filled: HashSet<String>,
    removed: Vec<String>,
    relation: SchemaRelation,
    notes: Vec<ReconciliationNote>,
    forbidden: ForbiddenColumns,
}

impl ReconciledSchema {
    /// Feature order every dense vector uses.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether a feature is always written as zero, whatever the request says.
    pub fn is_zero_filled(&self, name: &str) -> bool {
        self.zero_filled.contains(name)
    }

    /// Forbidden names stripped from the schema.
    pub fn removed(&self) -> &[String] {
        &self.removed
    }

    pub fn relation(&self) -> SchemaRelation {
        self.relation
    }

    pub fn notes(&self) -> &[ReconciliationNote] {
        &self.notes
    }

    pub fn forbidden(&self) -> &ForbiddenColumns {
        &self.forbidden
    }

    /// Whether any note puts scoring validity at risk.
    pub fn has_critical_notes(&self) -> bool {
        self.notes
            .iter()
            .any(|n| n.severity == NoteSeverity::Critical)
    }
}

/// Reconciles the stored schema against the classifier's own view.
pub fn reconcile(
    schema: &FeatureSchema,
    model: &ModelIntrospection,
    forbidden: ForbiddenColumns,
) -> Result<ReconciledSchema, ReconcileError> {
    let mut notes = Vec::new();

    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    let mut removed = Vec::new();
    let mut schema_order = Vec::with_capacity(schema.names.len());
    for name in &schema.names {
        if !seen.insert(name.as_str()) {
            duplicates.push(name.clone());
        } else if forbidden.contains(name) {
            removed.push(name.clone());
        } else {
            schema_order.push(name.clone());
        }
    }

    if !duplicates.is_empty() {
        notes.push(ReconciliationNote::new(
            NoteSeverity::Info,
            NoteKind::DuplicateSchemaNames,
            format!(
                "Schema lists {} duplicate feature name(s); first occurrence kept",
                duplicates.len()
            ),
            duplicates,
        ));
    }

    if !removed.is_empty() {
        notes.push(ReconciliationNote::new(
            NoteSeverity::Info,
            NoteKind::ForbiddenRemoved,
            format!(
                "Removed {} identifier/label column(s) from the schema",
                removed.len()
            ),
            removed.clone(),
        ));
    }

    if schema_order.is_empty() {
        return Err(ReconcileError::NoUsableFeatures { removed });
    }

    let mut zero_filled = HashSet::new();
    let (order, relation) = match model {
        ModelIntrospection::Opaque => (schema_order, SchemaRelation::Unverified),
        ModelIntrospection::Count(expected) => {
            if *expected != schema_order.len() {
                notes.push(ReconciliationNote::new(
                    NoteSeverity::Critical,
                    NoteKind::FeatureCountMismatch,
                    format!(
                        "Classifier expects {} features but the schema provides {}; scoring may be invalid",
                        expected,
                        schema_order.len()
                    ),
                    Vec::new(),
                ));
            }
            (schema_order, SchemaRelation::CountOnly)
        }
        ModelIntrospection::Names(model_order) if model_order.is_empty() => {
            (schema_order, SchemaRelation::Unverified)
        }
        ModelIntrospection::Names(model_order) => {
            let schema_set: HashSet<&str> = schema_order.iter().map(String::as_str).collect();
            let model_set: HashSet<&str> = model_order.iter().map(String::as_str).collect();

            let model_only: Vec<String> = model_order
                .iter()
                .filter(|n| !schema_set.contains(n.as_str()))
                .cloned()
                .collect();
            let schema_only: Vec<String> = schema_order
                .iter()
                .filter(|n| !model_set.contains(n.as_str()))
                .cloned()
                .collect();

            match (model_only.is_empty(), schema_only.is_empty()) {
                (true, true) => (model_order.clone(), SchemaRelation::Equal),
                (false, true) => {
                    zero_filled.extend(model_only.iter().cloned());
                    notes.push(ReconciliationNote::new(
                        NoteSeverity::Warning,
                        NoteKind::ModelOnlyFeatures,
                        format!(
                            "Classifier uses {} feature(s) missing from the schema; they are always zero",
                            model_only.len()
                        ),
                        model_only,
                    ));
                    (model_order.clone(), SchemaRelation::ModelSuperset)
                }
                (true, false) => {
                    notes.push(ReconciliationNote::new(
                        NoteSeverity::Info,
                        NoteKind::SchemaOnlyFeatures,
                        format!(
                            "Schema lists {} feature(s) the classifier does not use; they are dropped",
                            schema_only.len()
                        ),
                        schema_only,
                    ));
                    (model_order.clone(), SchemaRelation::ModelSubset)
                }
                (false, false) => {
                    let mut features = model_only;
                    features.extend(schema_only);
                    notes.push(ReconciliationNote::new(
                        NoteSeverity::Critical,
                        NoteKind::DivergentFeatureSets,
                        "Classifier and schema feature sets diverge; scoring in schema order may be invalid"
                            .to_string(),
                        features,
                    ));
                    (schema_order, SchemaRelation::Divergent)
                }
            }
        }
    };

    let forbidden_in_order: Vec<String> = order
        .iter()
        .filter(|n| forbidden.contains(n))
        .cloned()
        .collect();
    if !forbidden_in_order.is_empty() {
        zero_filled.extend(forbidden_in_order.iter().cloned());
        notes.push(ReconciliationNote::new(
            NoteSeverity::Warning,
            NoteKind::ForbiddenModelFeatures,
            "Classifier expects identifier/label column(s); they are always zero".to_string(),
            forbidden_in_order,
        ));
    }

    for note in &notes {
        match note.severity {
            NoteSeverity::Info => info!(kind = ?note.kind, features = ?note.features, "{}", note.message),
            _ => warn!(
                severity = ?note.severity,
                kind = ?note.kind,
                features = ?note.features,
                "{}",
                note.message
            ),
        }
    }
    info!(
        features = order.len(),
        relation = ?relation,
        "Resolved feature order"
    );

    Ok(ReconciledSchema {
        order,
        zero_filled,
        removed,
        relation,
        notes,
        forbidden,
    })
}
