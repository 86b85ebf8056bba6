//! Migration bookkeeping models

use chrono::{DateTime, NaiveDateTime, Utc};

/// Fact that a migration unit has been applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub version: String,
    pub applied_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for MigrationRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;

        let applied_at: String = row.try_get("applied_at")?;

        Ok(Self {
            version: row.try_get("version")?,
            applied_at: parse_timestamp(&applied_at).map_err(|e| sqlx::Error::ColumnDecode {
                index: "applied_at".to_string(),
                source: Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            })?,
        })
    }
}

/// Parse a stored `applied_at` value.
///
/// Rows written by the tracker are RFC 3339. SQLite's own `CURRENT_TIMESTAMP`
/// format (`YYYY-MM-DD HH:MM:SS`, UTC) is accepted for rows inserted by hand.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid applied_at timestamp {:?}: {}", value, e))
}

/// Applied state reported by the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    /// The bookkeeping table does not exist; nothing has ever been run
    NoTrackingTable,
    /// The bookkeeping table exists; records are ordered by `applied_at`
    Tracked(Vec<MigrationRecord>),
}

impl MigrationStatus {
    /// Applied records, empty when the table is missing
    pub fn records(&self) -> &[MigrationRecord] {
        match self {
            MigrationStatus::NoTrackingTable => &[],
            MigrationStatus::Tracked(records) => records,
        }
    }
}

/// Result of an apply request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    AlreadyApplied,
}

/// Result of a rollback request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOutcome {
    RolledBack,
    NotApplied,
}
