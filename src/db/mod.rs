//! Database layer
//!
//! This module handles:
//! - SQLite connection pooling
//! - The migration tracker and the on-disk migration source
//! - Repositories for application tables

pub mod message_repository;
pub mod migration_source;
pub mod migrations;

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::config::DatabaseConfig;

pub use message_repository::MessageRepository;
pub use migration_source::{load_dir, MigrationUnit};
pub use migrations::{MigrationTracker, Migrator};

/// Database connection pool type
pub type DbPool = Pool<Sqlite>;

/// Initialize the database connection pool
///
/// The database file is created if it does not exist yet. Schema changes are
/// left to the migration runner.
pub async fn init_pool(config: &DatabaseConfig) -> Result<DbPool> {
    ensure_data_directory(&config.url)?;

    let connect_options = config
        .url
        .parse::<SqliteConnectOptions>()
        .context("Failed to parse database URL")?
        .busy_timeout(Duration::from_secs(config.connect_timeout_secs))
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect_with(connect_options)
        .await
        .context("Failed to connect to database")?;

    Ok(pool)
}

/// Check database connectivity
pub async fn check_health(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Ensure the parent directory of a file-backed SQLite URL exists
fn ensure_data_directory(url: &str) -> Result<()> {
    if let Some(path) = database_file(url) {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create data directory")?;
                info!("Created data directory: {:?}", parent);
            }
        }
    }
    Ok(())
}

/// File path part of a SQLite URL, `None` for in-memory databases
fn database_file(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);

    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(path)
    }
}
