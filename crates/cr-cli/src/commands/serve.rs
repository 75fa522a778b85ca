//! Serve command - starts the API server.

use anyhow::{Context, Result};
use colored::Colorize;
use cr_api::{ApiServer, ApiServerConfig, AppState};
use cr_observability::install_prometheus_recorder;
use std::net::SocketAddr;
use std::sync::Arc;

use super::load_engine;
use crate::config::AppConfig;

/// Server configuration resolved from the config file and CLI flags.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Port to listen on.
    pub port: u16,
    /// Hostname to bind to.
    pub host: String,
    /// Serve the OpenAPI document.
    pub enable_openapi: bool,
}

impl ServeConfig {
    /// Applies CLI overrides on top of the config file's server section.
    pub fn resolve(app_config: &AppConfig, host: Option<String>, port: Option<u16>, no_openapi: bool) -> Self {
        Self {
            port: port.unwrap_or(app_config.server.port),
            host: host.unwrap_or_else(|| app_config.server.host.clone()),
            enable_openapi: app_config.server.openapi && !no_openapi,
        }
    }
}

/// Runs the API server.
pub async fn run_server(config: ServeConfig, app_config: AppConfig) -> Result<()> {
    println!("{} Starting Credo API Server...", "[server]".cyan());

    println!(
        "  {} Model: {}",
        "→".green(),
        app_config.artifacts.model.display()
    );
    println!(
        "  {} Schema: {}",
        "→".green(),
        app_config.artifacts.schema.display()
    );
    let engine = load_engine(&app_config)?;
    let status = engine.status();
    println!(
        "  {} Engine loaded: {} features ({})",
        "✓".green(),
        status.feature_count,
        status.status.as_str()
    );

    let handle = install_prometheus_recorder().context("Failed to install Prometheus recorder")?;
    let state = AppState::new(Arc::new(engine)).with_prometheus_handle(handle);

    let bind_address: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid bind address")?;

    let server_config = ApiServerConfig {
        bind_address,
        enable_openapi: config.enable_openapi,
    };

    println!();
    println!("{}", "Credo API Server".bold());
    println!("{}", "═".repeat(40));
    println!("  {} http://{}", "Address:".cyan(), bind_address);
    println!("  {} {}", "Policy:".cyan(), status.policy.mode().name());
    if config.enable_openapi {
        println!(
            "  {} http://{}/api-docs/openapi.json",
            "OpenAPI:".cyan(),
            bind_address
        );
    }

    println!();
    println!("{}", "Endpoints:".bold());
    println!("  POST /score                   - Score one applicant");
    println!("  GET  /status                  - Artifact and policy status");
    println!("  GET  /health                  - Health check");
    println!("  GET  /ready                   - Readiness check");
    println!("  GET  /live                    - Liveness check");
    println!("  GET  /metrics                 - Prometheus metrics");
    println!();
    println!("Press {} to stop", "Ctrl+C".yellow());
    println!();

    let server = ApiServer::new(state, server_config);
    server.run().await.context("Server error")?;

    println!();
    println!("{} Server stopped", "[server]".cyan());

    Ok(())
}
