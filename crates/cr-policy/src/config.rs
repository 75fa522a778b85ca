//! YAML configuration loader for the Credo decision policy.
//!
//! The policy file names one banding `mode` and may carry threshold blocks
//! for both modes; only the block selected by `mode` becomes active.
//!
//! ```yaml
//! mode: score
//! score:
//!   approve_min: 700
//!   review_min: 650
//! pd:
//!   approve_max: 0.03
//!   review_max: 0.08
//! min_nonzero_features: 5
//! ```

use crate::decision::{
    DecisionPolicy, PdThresholds, PolicyMode, ScoreThresholds, DEFAULT_MIN_NONZERO_FEATURES,
};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Errors that can occur during policy configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read policy file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML policy: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Which banding mode the configuration activates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PolicyModeKind {
    Pd,
    #[default]
    Score,
}

/// Policy configuration as written in YAML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyConfig {
    /// Active banding mode.
    #[serde(default)]
    pub mode: PolicyModeKind,
    /// PD-threshold bands, used when `mode: pd`.
    #[serde(default)]
    pub pd: Option<PdThresholds>,
    /// Score-threshold bands, used when `mode: score`.
    #[serde(default)]
    pub score: Option<ScoreThresholds>,
    /// Approvals need at least this many nonzero features.
    #[serde(default = "default_min_nonzero")]
    pub min_nonzero_features: usize,
}

fn default_min_nonzero() -> usize {
    DEFAULT_MIN_NONZERO_FEATURES
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            mode: PolicyModeKind::default(),
            pd: None,
            score: None,
            min_nonzero_features: default_min_nonzero(),
        }
    }
}

impl PolicyConfig {
    /// Resolves the active mode. The inactive block, if present, is ignored.
    pub fn to_mode(&self) -> PolicyMode {
        match self.mode {
            PolicyModeKind::Pd => {
                if self.score.is_some() {
                    warn!("Policy mode is 'pd'; ignoring the 'score' threshold block");
                }
                PolicyMode::PdThreshold(self.pd.unwrap_or_default())
            }
            PolicyModeKind::Score => {
                if self.pd.is_some() {
                    warn!("Policy mode is 'score'; ignoring the 'pd' threshold block");
                }
                PolicyMode::ScoreThreshold(self.score.unwrap_or_default())
            }
        }
    }

    /// Builds the runtime decision policy.
    pub fn to_policy(&self) -> DecisionPolicy {
        DecisionPolicy::new(self.to_mode(), self.min_nonzero_features)
    }
}

/// Replaces `${VAR_NAME}` patterns with environment variable values.
fn substitute_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
    let mut missing = Vec::new();

    let result = re.replace_all(input, |caps: &Captures| {
        let name = &caps[1];
        match env::var(name) {
            Ok(value) => value,
            Err(_) => {
                missing.push(name.to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(ConfigError::EnvVarNotFound(missing.join(", ")));
    }

    Ok(result.into_owned())
}

/// Parses a policy configuration from YAML text.
pub fn parse_policy(content: &str) -> Result<PolicyConfig, ConfigError> {
    let content = substitute_env_vars(content)?;
    let config: PolicyConfig = serde_yaml::from_str(&content)?;
    Ok(config)
}

/// Loads and parses a policy configuration file.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use cr_policy::config::load_policy;
///
/// let policy = load_policy(Path::new("config/policy.yaml")).unwrap().to_policy();
/// ```
pub fn load_policy(path: &Path) -> Result<PolicyConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_policy(&content)
}
