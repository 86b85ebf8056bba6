//! Hello World library
//!
//! Schema migration tracker plus the single-endpoint greeting service that
//! reads from the migrated schema.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod utils;

pub use config::AppConfig;
pub use db::DbPool;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Database connection pool
    pub db: DbPool,
}
