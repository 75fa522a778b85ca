//! # cr-api
//!
//! HTTP API for Credo.
//!
//! This crate exposes the scoring engine over REST with axum: one-applicant
//! scoring, operator status, health checks and Prometheus metrics.

pub mod dto;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use error::ApiError;
pub use server::{ApiServer, ApiServerConfig};
pub use state::AppState;
