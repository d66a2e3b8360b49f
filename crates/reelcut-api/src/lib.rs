//! Axum HTTP API server.
//!
//! This crate provides:
//! - Whole-file and chunked upload endpoints
//! - Cut validation and random cut generation
//! - Job submission, progress polling, cancellation and archive download
//! - Background probing and retention sweeps
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{Janitor, SweepReport};
pub use state::AppState;
