//! Configuration loading for the Credo CLI.

use anyhow::{Context, Result};
use cr_core::{ArtifactPaths, DecisionPolicy, EngineSettings, DEFAULT_TOP_K};
use cr_policy::{load_policy, PolicyConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Artifact locations.
    #[serde(default)]
    pub artifacts: ArtifactPaths,

    /// Inline decision policy.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Separate policy YAML. Takes precedence over the inline `policy` block.
    #[serde(default)]
    pub policy_file: Option<PathBuf>,

    /// Attribution settings.
    #[serde(default)]
    pub attribution: AttributionConfig,

    /// Extra columns that must never reach the classifier.
    #[serde(default)]
    pub forbidden_columns: ForbiddenColumnsConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Resolves the decision policy, reading `policy_file` when set.
    pub fn decision_policy(&self) -> Result<DecisionPolicy> {
        let policy = match &self.policy_file {
            Some(path) => load_policy(path)
                .with_context(|| format!("Failed to load policy file: {}", path.display()))?,
            None => self.policy.clone(),
        };
        Ok(policy.to_policy())
    }

    /// Engine settings derived from the attribution and forbidden-column sections.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            top_k: self.attribution.top_k,
            attribution_enabled: self.attribution.enabled,
            extra_forbidden: self.forbidden_columns.extra.clone(),
        }
    }
}

/// Attribution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionConfig {
    /// Whether attributions are computed at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Attributions returned when a request does not ask for a number.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_true() -> bool {
    true
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            top_k: default_top_k(),
        }
    }
}

/// Operator-configured forbidden columns.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ForbiddenColumnsConfig {
    #[serde(default)]
    pub extra: Vec<String>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Serve `/api-docs/openapi.json`.
    #[serde(default = "default_true")]
    pub openapi: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            openapi: default_true(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of text.
    #[serde(default)]
    pub json_format: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}
