//! Credo CLI
//!
//! Command-line interface for the Credo credit scoring engine.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use cr_core::{EngineStatus, NoteSeverity};
use cr_observability::{init_logging_with_config, LoggingConfig};
use std::path::{Path, PathBuf};

mod commands;
mod config;
mod validator;

use commands::{load_engine, run_score, run_server, ScoreArgs, ServeConfig};
use config::AppConfig;
use validator::{ConfigValidator, ValidationResult};

/// Config file used when `--config` is not given, if it exists.
const DEFAULT_CONFIG_PATH: &str = "config/credo.yaml";

#[derive(Parser)]
#[command(name = "credo")]
#[command(author = "Credo Team")]
#[command(version)]
#[command(about = "Credit scoring and decisioning for thin-file applicants", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to listen on (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Do not serve the OpenAPI document
        #[arg(long)]
        no_openapi: bool,
    },

    /// Score one request offline
    Score {
        /// JSON file holding the feature map or a /score request body
        #[arg(short, long, value_name = "FILE")]
        features: PathBuf,

        /// Number of attributions to return
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Render reasons in this language (en, vi)
        #[arg(short, long)]
        locale: Option<String>,

        /// Skip the attribution
        #[arg(long)]
        no_explain: bool,
    },

    /// Load the artifacts and print the status report
    Status,

    /// Validate configuration and artifacts
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            AppConfig::load(Path::new(DEFAULT_CONFIG_PATH))?
        }
        None => {
            if cli.verbose {
                eprintln!("Using default configuration (no config file found)");
            }
            AppConfig::default()
        }
    };

    // Offline commands print to stdout, so only the server logs at the configured level.
    let level = if cli.verbose {
        "debug"
    } else if matches!(cli.command, Commands::Serve { .. }) {
        config.logging.level.as_str()
    } else {
        "warn"
    };
    init_logging_with_config(LoggingConfig::from_level_str(level, config.logging.json_format))?;

    match cli.command {
        Commands::Serve {
            port,
            host,
            no_openapi,
        } => {
            let serve_config = ServeConfig::resolve(&config, host, port, no_openapi);
            run_server(serve_config, config).await
        }
        Commands::Score {
            features,
            top_k,
            locale,
            no_explain,
        } => run_score(
            ScoreArgs {
                features,
                top_k,
                locale,
                explain: !no_explain,
            },
            &config,
            cli.format == OutputFormat::Json,
        ),
        Commands::Status => cmd_status(&config, cli.format),
        Commands::Validate => cmd_validate(&config),
    }
}

fn cmd_status(config: &AppConfig, format: OutputFormat) -> Result<()> {
    let engine = load_engine(config)?;
    let status = engine.status();

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }

    Ok(())
}

fn print_status(status: &EngineStatus) {
    let health = match status.status.as_str() {
        "healthy" => status.status.as_str().green(),
        other => other.yellow(),
    };
    let or_none = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    let prior = |v: Option<f64>| v.map(|p| format!("{:.4}", p)).unwrap_or_else(|| "-".to_string());

    println!("{}", "Credo Status".bold());
    println!("─────────────────────");
    println!("Status:          {}", health);
    println!("Model version:   {}", or_none(&status.model_version));
    println!("Schema version:  {}", or_none(&status.schema_version));
    println!("Loaded at:       {}", status.loaded_at.to_rfc3339());
    println!();
    println!("{}", "Features".bold());
    println!("  Count:         {}", status.feature_count);
    println!("  Relation:      {:?}", status.schema_relation);
    if !status.zero_filled_features.is_empty() {
        println!("  Zero-filled:   {}", status.zero_filled_features.join(", "));
    }
    if !status.removed_features.is_empty() {
        println!("  Removed:       {}", status.removed_features.join(", "));
    }
    for note in &status.reconciliation_notes {
        let marker = match note.severity {
            NoteSeverity::Critical => "✗".red(),
            NoteSeverity::Warning => "⚠".yellow(),
            NoteSeverity::Info => "•".normal(),
        };
        println!("  {} {}", marker, note.message);
    }
    println!();
    println!("{}", "Policy".bold());
    println!("  Mode:          {}", status.policy.mode().name());
    println!(
        "  Approve at:    score >= {} (PD <= {:.4})",
        status.threshold_equivalents.approve_score, status.threshold_equivalents.approve_pd
    );
    println!(
        "  Review at:     score >= {} (PD <= {:.4})",
        status.threshold_equivalents.review_score, status.threshold_equivalents.review_pd
    );
    println!("  Min nonzero:   {}", status.policy.min_nonzero_features());
    for warning in &status.policy_warnings {
        println!("  {} {}", "⚠".yellow(), warning.message);
    }
    println!();
    println!("{}", "Priors".bold());
    println!("  Train:         {}", prior(status.train_prior));
    println!(
        "  Runtime:       {} ({})",
        prior(status.runtime_prior),
        status.runtime_prior_source
    );
    println!();
    println!(
        "Attribution:     {} (top {})",
        if status.attribution_available {
            "available".green()
        } else {
            "unavailable".yellow()
        },
        status.default_top_k
    );
}

fn cmd_validate(config: &AppConfig) -> Result<()> {
    println!("{}", "Validating configuration...".cyan());

    let mut result: ValidationResult = ConfigValidator::validate(config);

    let engine = if result.has_errors() {
        None
    } else {
        match load_engine(config) {
            Ok(engine) => {
                ConfigValidator::inspect_engine(&engine, &mut result);
                Some(engine)
            }
            Err(e) => {
                result.add_error(format!("{:#}", e));
                None
            }
        }
    };

    result.print();

    if let Some(engine) = &engine {
        let status = engine.status();
        println!();
        println!("{}", "Summary".bold());
        println!("─────────────────────");
        println!("  Features: {}", status.feature_count);
        println!("  Relation: {:?}", status.schema_relation);
        println!("  Policy:   {}", status.policy.mode().name());
        println!("  Status:   {}", status.status.as_str());
    }

    println!();
    if result.has_errors() {
        println!(
            "{}",
            "Validation failed. Fix the errors above before starting the server."
                .red()
                .bold()
        );
        std::process::exit(1);
    } else if result.has_warnings() {
        println!(
            "{}",
            "Configuration is valid with warnings. Review the warnings above."
                .yellow()
                .bold()
        );
    } else {
        println!("{}", "Configuration is valid.".green().bold());
    }

    Ok(())
}
