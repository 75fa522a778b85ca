//! API routes.

pub mod health;
pub mod metrics;
pub mod score;
pub mod status;

use axum::Router;

use crate::state::AppState;

/// Creates the main API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(score::routes())
        .merge(status::routes())
        .merge(metrics::routes())
        .with_state(state)
}
