//! CLI command implementations.

mod score;
mod serve;

pub use score::{run_score, ScoreArgs};
pub use serve::{run_server, ServeConfig};

use anyhow::{Context, Result};
use cr_core::ScoringEngine;

use crate::config::AppConfig;

/// Loads every artifact named by the configuration. Any failure is fatal.
pub fn load_engine(config: &AppConfig) -> Result<ScoringEngine> {
    let policy = config.decision_policy()?;
    ScoringEngine::load(&config.artifacts, config.engine_settings(), policy).with_context(|| {
        format!(
            "Failed to load scoring artifacts (model: {}, schema: {})",
            config.artifacts.model.display(),
            config.artifacts.schema.display()
        )
    })
}
