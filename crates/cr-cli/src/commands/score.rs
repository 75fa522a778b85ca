//! Score command - scores one request offline.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use cr_core::{Decision, FeatureMap, Locale, ScoreOptions, ScoreResponse};
use std::path::{Path, PathBuf};

use super::load_engine;
use crate::config::AppConfig;

/// Arguments of the score command.
#[derive(Debug, Clone)]
pub struct ScoreArgs {
    /// JSON file with the feature map.
    pub features: PathBuf,
    pub top_k: Option<usize>,
    pub locale: Option<String>,
    pub explain: bool,
}

/// Reads a feature map. Accepts a bare object or a `/score` request body.
pub fn read_features(path: &Path) -> Result<FeatureMap> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read features file: {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse features file: {}", path.display()))?;

    let map = match value {
        serde_json::Value::Object(mut object) => match object.remove("features") {
            Some(serde_json::Value::Object(inner)) => inner,
            Some(serde_json::Value::Null) | None => object,
            Some(_) => bail!("'features' in {} must be an object", path.display()),
        },
        _ => bail!("Features file {} must contain a JSON object", path.display()),
    };

    Ok(map.into_iter().collect())
}

/// Scores one request and prints the response.
pub fn run_score(args: ScoreArgs, config: &AppConfig, json: bool) -> Result<()> {
    let locale = args
        .locale
        .as_deref()
        .map(str::parse::<Locale>)
        .transpose()
        .map_err(anyhow::Error::msg)?;
    let features = read_features(&args.features)?;
    let engine = load_engine(config)?;

    let response = engine
        .score(
            &features,
            ScoreOptions {
                return_explain: args.explain,
                top_k: args.top_k,
                locale,
            },
        )
        .context("Scoring failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }
    Ok(())
}

fn print_response(response: &ScoreResponse) {
    let decision = match response.decision {
        Decision::Approve => response.decision.as_str().green().bold(),
        Decision::Review => response.decision.as_str().yellow().bold(),
        Decision::Reject => response.decision.as_str().red().bold(),
    };

    println!("{}", "Credit Decision".bold());
    println!("─────────────────────");
    println!("  Decision: {}", decision);
    if response.policy.sparsity_downgraded {
        println!(
            "  {} downgraded from {} ({} nonzero features)",
            "⚠".yellow(),
            response.policy.tentative.as_str(),
            response.policy.nonzero_features
        );
    }
    println!("  Score:    {}", response.score);
    println!("  PD:       {:.4}", response.pd);
    if response.prior_shift.applied {
        println!("  Raw PD:   {:.4}", response.pd_raw);
    }

    if !response.missing_features.is_empty() {
        println!(
            "  Missing:  {}",
            response.missing_features.join(", ").dimmed()
        );
    }
    if !response.coerced_features.is_empty() {
        println!(
            "  Coerced:  {}",
            response.coerced_features.join(", ").dimmed()
        );
    }

    if !response.attributions.is_empty() {
        println!();
        println!("{}", "Top Factors".bold());
        for a in &response.attributions {
            let arrow = if a.contribution > 0.0 {
                "↑".red()
            } else {
                "↓".green()
            };
            println!(
                "  {} {:<28} {:>10.4}  (value {})",
                arrow, a.feature, a.contribution, a.value
            );
        }
    }

    if let Some(reasons) = &response.reasons {
        println!();
        println!("{}", "Reasons".bold());
        for reason in reasons {
            println!("  • {}: {}", reason.title, reason.text);
        }
    }

    if !response.notes.is_empty() {
        println!();
        println!("{}", "Notes".bold());
        for note in &response.notes {
            println!("  {} {}", "⚠".yellow(), note.message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "{}", content).unwrap();
        f
    }

    #[test]
    fn test_read_bare_feature_map() {
        let f = file(r#"{"sms_count": 12, "contacts_count": "40"}"#);
        let features = read_features(f.path()).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features["sms_count"], 12);
    }

    #[test]
    fn test_read_request_body() {
        let f = file(r#"{"features": {"sms_count": 12}, "top_k": 3}"#);
        let features = read_features(f.path()).unwrap();
        assert_eq!(features.len(), 1);
        assert!(features.contains_key("sms_count"));
    }

    #[test]
    fn test_rejects_non_object() {
        let f = file("[1, 2, 3]");
        assert!(read_features(f.path()).is_err());

        let f = file(r#"{"features": [1]}"#);
        assert!(read_features(f.path()).is_err());
    }
}
