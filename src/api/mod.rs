//! API routes and handlers
//!
//! This module defines all HTTP endpoints and their routing.

use axum::{routing::get, Router};

use crate::AppState;

mod health;
mod hello;

pub use health::*;
pub use hello::*;

/// All routes served by the greeting service
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/hello", get(hello::hello))
        // Health check endpoints
        .route("/health", get(health::health_check))
        .route("/health/detailed", get(health::health_check_detailed))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
}
