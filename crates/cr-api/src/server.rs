//! API server implementation.

use axum::{
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::any::Any;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use utoipa::OpenApi;

use crate::dto::*;
use crate::error::{ApiError, ErrorResponse};
use crate::middleware::{cors_layer, request_id, request_logging};
use crate::routes;
use crate::state::AppState;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Address to bind to.
    pub bind_address: SocketAddr,
    /// Whether to serve the OpenAPI document.
    pub enable_openapi: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            enable_openapi: true,
        }
    }
}

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::score::score,
        crate::routes::status::engine_status,
        crate::routes::health::health_check,
        crate::routes::health::readiness_check,
        crate::routes::health::liveness_check,
        crate::routes::metrics::prometheus_metrics,
    ),
    components(
        schemas(
            ScoreRequest,
            ScoreResponseDto,
            PriorShiftDto,
            PolicyOutcomeDto,
            AttributionDto,
            AttributionStatusDto,
            ReasonDto,
            RequestNoteDto,
            AuditDto,
            PolicyDto,
            PolicyWarningDto,
            ReconciliationNoteDto,
            ThresholdEquivalentsDto,
            StatusResponse,
            HealthResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Scoring", description = "Credit decisions"),
        (name = "Status", description = "Artifact and policy introspection"),
        (name = "Health", description = "Health check endpoints"),
        (name = "Metrics", description = "Prometheus metrics")
    ),
    info(
        title = "Credo API",
        version = "0.1.0",
        description = "Credit scoring and decision API",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    /// Creates a new API server.
    pub fn new(state: AppState, config: ApiServerConfig) -> Self {
        Self { config, state }
    }

    /// Creates a new API server with default config.
    pub fn with_state(state: AppState) -> Self {
        Self::new(state, ApiServerConfig::default())
    }

    /// Builds the router.
    pub fn router(&self) -> Router {
        routes::health::init_start_time();

        let mut app = routes::create_router(self.state.clone());

        if self.config.enable_openapi {
            app = app.route("/api-docs/openapi.json", get(openapi_json));
        }

        app
            // Request logging
            .layer(middleware::from_fn(request_logging))
            // Request ID
            .layer(middleware::from_fn(request_id))
            // Tracing
            .layer(TraceLayer::new_for_http())
            // CORS
            .layer(cors_layer())
            // Catch panics and return 500
            .layer(CatchPanicLayer::custom(panic_response))
    }

    /// Runs the server.
    pub async fn run(self) -> Result<(), std::io::Error> {
        self.run_until(shutdown_signal()).await
    }

    /// Runs the server with a custom shutdown signal.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), std::io::Error>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let addr = self.config.bind_address;

        info!("Starting API server on {}", addr);

        let listener = TcpListener::bind(addr).await?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("API server shut down gracefully");
        Ok(())
    }
}

/// Renders a handler panic as a JSON internal error.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!(panic = %detail, "Request handler panicked");
    ApiError::Internal("request handler panicked".to_string()).into_response()
}

/// Default shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
