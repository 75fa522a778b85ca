//! On-disk artifacts produced by the training pipeline.
//!
//! The feature schema and the classifier are required; the train-time prior
//! is optional and its absence only disables prior shifting.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while loading startup artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The artifact file could not be read.
    #[error("Failed to read {kind} artifact at {path}: {source}")]
    Io {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The artifact file is not valid JSON for its type.
    #[error("Failed to parse {kind} artifact at {path}: {source}")]
    Parse {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The artifact parsed but its contents are unusable.
    #[error("Invalid {kind} artifact: {message}")]
    Invalid { kind: &'static str, message: String },
}

/// Locations of the artifacts the engine loads at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArtifactPaths {
    /// Classifier artifact (logistic scorecard JSON).
    pub model: PathBuf,
    /// Feature schema JSON.
    pub schema: PathBuf,
    /// Record holding the prevalence seen at training time.
    pub train_prior: Option<PathBuf>,
    /// Refreshable record holding the live target prevalence.
    pub runtime_prior: Option<PathBuf>,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            model: PathBuf::from("artifacts/model.json"),
            schema: PathBuf::from("artifacts/feature_schema.json"),
            train_prior: Some(PathBuf::from("artifacts/metrics.json")),
            runtime_prior: None,
        }
    }
}

/// Ordered feature list the classifier was trained on, plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureSchema {
    /// Ordered feature names. Older artifacts call this `feature_names`.
    #[serde(alias = "feature_names")]
    pub names: Vec<String>,
    /// Label column used during training.
    #[serde(default)]
    pub target: Option<String>,
    /// Identifier column used during training.
    #[serde(default)]
    pub id_col: Option<String>,
    /// Creation timestamp as written by the training job.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Explicit schema version, if the pipeline stamps one.
    #[serde(default)]
    pub version: Option<String>,
}

impl FeatureSchema {
    /// Builds a schema from names alone.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            target: None,
            id_col: None,
            created_at: None,
            version: None,
        }
    }

    /// Version identifier for audit metadata.
    pub fn version_label(&self) -> Option<&str> {
        self.version.as_deref().or(self.created_at.as_deref())
    }
}

/// Loads the feature schema artifact.
pub fn load_feature_schema(path: &Path) -> Result<FeatureSchema, ArtifactError> {
    let schema: FeatureSchema = read_json("feature schema", path)?;
    debug!(path = %path.display(), features = schema.names.len(), "Loaded feature schema");
    Ok(schema)
}

/// Train-time prior record. Accepts the training metrics file directly.
#[derive(Debug, Clone, Deserialize)]
struct TrainPriorRecord {
    #[serde(alias = "train_prior", alias = "default_rate_train")]
    pi_train: f64,
}

/// Loads the train-time prior.
///
/// The prior is optional: an unreadable, unparseable or out-of-range record
/// is logged and treated as unavailable.
pub fn load_train_prior(path: &Path) -> Option<f64> {
    let record: TrainPriorRecord = match read_json("train prior", path) {
        Ok(record) => record,
        Err(e) => {
            warn!(error = %e, "Train-time prior unavailable; prior shift disabled");
            return None;
        }
    };

    if record.pi_train.is_finite() && record.pi_train > 0.0 && record.pi_train < 1.0 {
        Some(record.pi_train)
    } else {
        warn!(
            pi_train = record.pi_train,
            "Train-time prior outside (0, 1); prior shift disabled"
        );
        None
    }
}

pub(crate) fn read_json<T>(kind: &'static str, path: &Path) -> Result<T, ArtifactError>
where
    T: serde::de::DeserializeOwned,
{
    let content = std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        kind,
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ArtifactError::Parse {
        kind,
        path: path.to_path_buf(),
        source,
    })
}
