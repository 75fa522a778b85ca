//! Startup validation for Credo.
//!
//! Checks the configuration before artifacts are loaded, then inspects what
//! the loaded engine reports. Only problems that would stop the engine from
//! loading are errors; everything the engine can absorb is a warning.

use colored::Colorize;
use cr_core::{NoteSeverity, ScoringEngine, MAX_TOP_K};
use std::path::Path;

use crate::config::AppConfig;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Problems that prevent startup.
    pub errors: Vec<String>,
    /// Problems the engine absorbs but an operator should see.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Prints the validation result to the console.
    pub fn print(&self) {
        if !self.warnings.is_empty() {
            println!();
            println!("{}", "Warnings:".yellow().bold());
            for warning in &self.warnings {
                println!("  {} {}", "⚠".yellow(), warning);
            }
        }

        if !self.errors.is_empty() {
            println!();
            println!("{}", "Errors:".red().bold());
            for error in &self.errors {
                println!("  {} {}", "✗".red(), error);
            }
        }

        if self.errors.is_empty() && self.warnings.is_empty() {
            println!("  {} Configuration OK", "✓".green());
        }
    }
}

/// Validates application configuration before startup.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the configuration without loading artifacts.
    pub fn validate(config: &AppConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        Self::validate_artifacts(config, &mut result);
        Self::validate_policy(config, &mut result);
        Self::validate_attribution(config, &mut result);
        Self::validate_logging(config, &mut result);

        result
    }

    /// Adds what a loaded engine reports about itself.
    pub fn inspect_engine(engine: &ScoringEngine, result: &mut ValidationResult) {
        for note in engine.schema().notes() {
            match note.severity {
                NoteSeverity::Critical => result.add_warning(format!(
                    "{} (scores may be invalid until the artifacts are fixed)",
                    note.message
                )),
                NoteSeverity::Warning => result.add_warning(note.message.clone()),
                NoteSeverity::Info => {}
            }
        }
    }

    fn validate_artifacts(config: &AppConfig, result: &mut ValidationResult) {
        let artifacts = &config.artifacts;

        for (label, path) in [("Model", &artifacts.model), ("Feature schema", &artifacts.schema)] {
            if !path.exists() {
                result.add_error(format!("{} artifact not found: {}", label, path.display()));
            }
        }

        match &artifacts.train_prior {
            Some(path) if !path.exists() => result.add_warning(format!(
                "Train prior file not found: {}. Prior shift will be disabled.",
                path.display()
            )),
            None => result.add_warning("No train prior configured. Prior shift will be disabled."),
            _ => {}
        }

        if let Some(path) = &artifacts.runtime_prior {
            if !path.exists() {
                result.add_warning(format!(
                    "Runtime prior file not found: {}. Raw PDs are used until it appears.",
                    path.display()
                ));
            }
        }
    }

    fn validate_policy(config: &AppConfig, result: &mut ValidationResult) {
        if let Some(path) = &config.policy_file {
            if !Path::new(path).exists() {
                result.add_error(format!("Policy file not found: {}", path.display()));
                return;
            }
        }

        match config.decision_policy() {
            Ok(policy) => {
                for warning in policy.warnings() {
                    result.add_warning(format!("Policy: {}", warning.message));
                }
            }
            Err(e) => result.add_error(format!("{:#}", e)),
        }
    }

    fn validate_attribution(config: &AppConfig, result: &mut ValidationResult) {
        let top_k = config.attribution.top_k;
        if top_k == 0 || top_k > MAX_TOP_K {
            result.add_error(format!(
                "attribution.top_k must be between 1 and {}, got {}",
                MAX_TOP_K, top_k
            ));
        }
    }

    fn validate_logging(config: &AppConfig, result: &mut ValidationResult) {
        if config.logging.level.parse::<tracing::Level>().is_err() {
            result.add_warning(format!(
                "Unknown log level '{}', using info",
                config.logging.level
            ));
        }
    }
}
