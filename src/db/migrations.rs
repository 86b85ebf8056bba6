//! Migration tracker
//!
//! Applies schema units exactly once and records them in a bookkeeping table
//! (`schema_migrations` by default):
//!
//! ```sql
//! CREATE TABLE schema_migrations (
//!     version VARCHAR(255) PRIMARY KEY,
//!     applied_at TIMESTAMP NOT NULL
//! )
//! ```
//!
//! A record for a version exists if and only if the unit's DDL is in effect.
//! DDL execution and the bookkeeping write share one transaction, so a failed
//! unit leaves neither its schema changes nor its record behind.
//!
//! The applied check is repeated inside the transaction that performs the
//! change. Together with the primary key on `version`, a second process racing
//! on the same unit fails and rolls back instead of applying it twice.

use chrono::{SecondsFormat, Utc};
use sqlx::{Executor, Sqlite};
use tracing::{debug, info};

use super::migration_source::MigrationUnit;
use super::DbPool;
use crate::models::{ApplyOutcome, MigrationRecord, MigrationStatus, RollbackOutcome};
use crate::utils::MigrationError;

/// Default bookkeeping table name
pub const DEFAULT_TRACKING_TABLE: &str = "schema_migrations";

/// Version of the initial schema unit shipped in `migrations/`
pub const INITIAL_SCHEMA_VERSION: &str = "001_initial_schema";

/// Tracks applied migration units in a bookkeeping table
#[derive(Clone)]
pub struct MigrationTracker {
    pool: DbPool,
    table: String,
}

impl MigrationTracker {
    /// Tracker using the default `schema_migrations` table
    pub fn new(pool: DbPool) -> Self {
        Self::with_table(pool, DEFAULT_TRACKING_TABLE)
    }

    /// Tracker using a custom bookkeeping table
    pub fn with_table(pool: DbPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn quoted_table(&self) -> String {
        format!("\"{}\"", self.table.replace('"', "\"\""))
    }

    /// Create the bookkeeping table if it does not exist
    pub async fn ensure_tracking_table(&self) -> Result<(), MigrationError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                version VARCHAR(255) PRIMARY KEY,
                applied_at TIMESTAMP NOT NULL
            )",
            self.quoted_table()
        );

        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(MigrationError::TrackingTable)?;

        Ok(())
    }

    /// Whether the bookkeeping table exists
    pub async fn tracking_table_exists(&self) -> Result<bool, MigrationError> {
        table_exists(&self.pool, &self.table)
            .await
            .map_err(MigrationError::Query)
    }

    /// Whether a record exists for `version`
    ///
    /// Reports `false` when the bookkeeping table has not been created yet.
    pub async fn is_applied(&self, version: &str) -> Result<bool, MigrationError> {
        if !self.tracking_table_exists().await? {
            return Ok(false);
        }

        self.version_recorded(&self.pool, version)
            .await
            .map_err(MigrationError::Query)
    }

    async fn version_recorded<'e, E>(&self, executor: E, version: &str) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE version = ?",
            self.quoted_table()
        );

        let count: i64 = sqlx::query_scalar(&sql)
            .bind(version)
            .fetch_one(executor)
            .await?;

        Ok(count > 0)
    }

    /// Apply `ddl` as migration `version`
    ///
    /// No-op when the version is already recorded. Otherwise the DDL batch and
    /// the bookkeeping insert are committed together or not at all.
    pub async fn apply(&self, version: &str, ddl: &str) -> Result<ApplyOutcome, MigrationError> {
        if self.is_applied(version).await? {
            info!(version, "Migration already applied, skipping");
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        if ddl.trim().is_empty() {
            return Err(MigrationError::InvalidSource(format!(
                "migration {} has no statements",
                version
            )));
        }

        self.ensure_tracking_table().await?;

        let mut tx = self.pool.begin().await.map_err(|source| MigrationError::Begin {
            version: version.to_string(),
            source,
        })?;

        if self
            .version_recorded(&mut *tx, version)
            .await
            .map_err(MigrationError::Query)?
        {
            info!(version, "Migration applied concurrently, skipping");
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        debug!(version, "Executing migration statements");
        sqlx::raw_sql(ddl)
            .execute(&mut *tx)
            .await
            .map_err(|source| MigrationError::Execute {
                version: version.to_string(),
                source,
            })?;

        let insert = format!(
            "INSERT INTO {} (version, applied_at) VALUES (?, ?)",
            self.quoted_table()
        );
        sqlx::query(&insert)
            .bind(version)
            .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
            .execute(&mut *tx)
            .await
            .map_err(|source| MigrationError::Record {
                version: version.to_string(),
                source,
            })?;

        tx.commit().await.map_err(|source| MigrationError::Commit {
            version: version.to_string(),
            source,
        })?;

        info!(version, "Applied migration");
        Ok(ApplyOutcome::Applied)
    }

    /// Reverse migration `version` with `reverse_sql`
    ///
    /// No-op when the version is not recorded. Otherwise the reverse action
    /// and the record deletion are committed together or not at all.
    pub async fn rollback(
        &self,
        version: &str,
        reverse_sql: &str,
    ) -> Result<RollbackOutcome, MigrationError> {
        if !self.is_applied(version).await? {
            info!(version, "Migration not applied, nothing to roll back");
            return Ok(RollbackOutcome::NotApplied);
        }

        let mut tx = self.pool.begin().await.map_err(|source| MigrationError::Begin {
            version: version.to_string(),
            source,
        })?;

        if !self
            .version_recorded(&mut *tx, version)
            .await
            .map_err(MigrationError::Query)?
        {
            info!(version, "Migration rolled back concurrently, skipping");
            return Ok(RollbackOutcome::NotApplied);
        }

        if !reverse_sql.trim().is_empty() {
            debug!(version, "Executing reverse statements");
            sqlx::raw_sql(reverse_sql)
                .execute(&mut *tx)
                .await
                .map_err(|source| MigrationError::Execute {
                    version: version.to_string(),
                    source,
                })?;
        }

        let delete = format!("DELETE FROM {} WHERE version = ?", self.quoted_table());
        sqlx::query(&delete)
            .bind(version)
            .execute(&mut *tx)
            .await
            .map_err(|source| MigrationError::Record {
                version: version.to_string(),
                source,
            })?;

        tx.commit().await.map_err(|source| MigrationError::Commit {
            version: version.to_string(),
            source,
        })?;

        info!(version, "Rolled back migration");
        Ok(RollbackOutcome::RolledBack)
    }

    /// Report applied migrations, oldest first
    ///
    /// A missing bookkeeping table is reported as
    /// [`MigrationStatus::NoTrackingTable`], distinct from an empty table.
    pub async fn status(&self) -> Result<MigrationStatus, MigrationError> {
        let mut tx = self.pool.begin().await.map_err(MigrationError::Query)?;

        if !table_exists(&mut *tx, &self.table)
            .await
            .map_err(MigrationError::Query)?
        {
            return Ok(MigrationStatus::NoTrackingTable);
        }

        let sql = format!(
            "SELECT version, applied_at FROM {} ORDER BY applied_at, version",
            self.quoted_table()
        );
        let records = sqlx::query_as::<_, MigrationRecord>(&sql)
            .fetch_all(&mut *tx)
            .await
            .map_err(MigrationError::Query)?;

        tx.commit().await.map_err(MigrationError::Query)?;

        Ok(MigrationStatus::Tracked(records))
    }
}

async fn table_exists<'e, E>(executor: E, table: &str) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(executor)
            .await?;

    Ok(count > 0)
}

/// Runs an ordered list of migration units through a [`MigrationTracker`]
///
/// Each unit keeps the tracker's per-unit guarantees; a failing unit stops the
/// run and leaves earlier units applied.
pub struct Migrator {
    tracker: MigrationTracker,
    units: Vec<MigrationUnit>,
}

impl Migrator {
    pub fn new(tracker: MigrationTracker, units: Vec<MigrationUnit>) -> Self {
        Self { tracker, units }
    }

    pub fn tracker(&self) -> &MigrationTracker {
        &self.tracker
    }

    /// Apply every unit in order
    pub async fn up(&self) -> Result<Vec<(String, ApplyOutcome)>, MigrationError> {
        let mut outcomes = Vec::with_capacity(self.units.len());
        for unit in &self.units {
            let outcome = self.tracker.apply(&unit.version, &unit.up_sql).await?;
            outcomes.push((unit.version.clone(), outcome));
        }
        Ok(outcomes)
    }

    /// Roll back the highest-versioned applied unit
    ///
    /// The target comes from the bookkeeping table. Returns `None` when nothing
    /// is applied, and fails without touching the schema when the target has no
    /// loaded unit.
    pub async fn down(&self) -> Result<Option<(String, RollbackOutcome)>, MigrationError> {
        let Some(version) = self.applied_versions().await?.into_iter().next() else {
            return Ok(None);
        };

        let unit = self.unit_for(&version)?;
        let outcome = self.tracker.rollback(&unit.version, &unit.down_sql).await?;
        Ok(Some((version, outcome)))
    }

    /// Roll back every applied unit, highest version first
    ///
    /// Every recorded version must have a loaded unit; otherwise nothing is
    /// rolled back.
    pub async fn down_all(&self) -> Result<Vec<(String, RollbackOutcome)>, MigrationError> {
        let versions = self.applied_versions().await?;
        let units = versions
            .iter()
            .map(|version| self.unit_for(version))
            .collect::<Result<Vec<_>, _>>()?;

        let mut outcomes = Vec::with_capacity(units.len());
        for unit in units {
            let outcome = self.tracker.rollback(&unit.version, &unit.down_sql).await?;
            outcomes.push((unit.version.clone(), outcome));
        }
        Ok(outcomes)
    }

    /// Recorded versions, highest first
    async fn applied_versions(&self) -> Result<Vec<String>, MigrationError> {
        let mut versions: Vec<String> = self
            .tracker
            .status()
            .await?
            .records()
            .iter()
            .map(|record| record.version.clone())
            .collect();
        versions.sort_unstable_by(|a, b| b.cmp(a));
        Ok(versions)
    }

    fn unit_for(&self, version: &str) -> Result<&MigrationUnit, MigrationError> {
        self.units
            .iter()
            .find(|unit| unit.version == version)
            .ok_or_else(|| {
                MigrationError::InvalidSource(format!(
                    "{} is applied but has no migration files",
                    version
                ))
            })
    }

    pub async fn status(&self) -> Result<MigrationStatus, MigrationError> {
        self.tracker.status().await
    }
}
