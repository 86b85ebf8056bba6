//! On-disk migration source
//!
//! A migration directory holds one `<version>.up.sql` and one
//! `<version>.down.sql` file per unit. Units are ordered by version, so
//! versions should carry a zero-padded numeric prefix (`001_initial_schema`).

use std::collections::BTreeMap;
use std::path::Path;

use crate::utils::MigrationError;

/// File suffix of the forward DDL of a unit
pub const UP_SUFFIX: &str = ".up.sql";
/// File suffix of the reverse action of a unit
pub const DOWN_SUFFIX: &str = ".down.sql";

/// A named, versioned schema change with its reverse action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationUnit {
    pub version: String,
    pub up_sql: String,
    pub down_sql: String,
}

impl MigrationUnit {
    pub fn new(
        version: impl Into<String>,
        up_sql: impl Into<String>,
        down_sql: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            up_sql: up_sql.into(),
            down_sql: down_sql.into(),
        }
    }
}

#[derive(Default)]
struct UnitFiles {
    up: Option<String>,
    down: Option<String>,
}

/// Load every migration unit in `dir`, ordered by version
///
/// Files without an `.up.sql` / `.down.sql` suffix are ignored. Each unit must
/// have both files and a non-empty up script.
pub fn load_dir(dir: &Path) -> Result<Vec<MigrationUnit>, MigrationError> {
    let entries = std::fs::read_dir(dir).map_err(|source| MigrationError::Source {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: BTreeMap<String, UnitFiles> = BTreeMap::new();

    for entry in entries {
        let entry = entry.map_err(|source| MigrationError::Source {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let (version, is_up) = if let Some(version) = name.strip_suffix(UP_SUFFIX) {
            (version, true)
        } else if let Some(version) = name.strip_suffix(DOWN_SUFFIX) {
            (version, false)
        } else {
            continue;
        };

        if version.is_empty() {
            return Err(MigrationError::InvalidSource(format!(
                "migration file {:?} has no version",
                path
            )));
        }

        let contents = std::fs::read_to_string(&path)
            .map_err(|source| MigrationError::Source { path: path.clone(), source })?;

        let slot = files.entry(version.to_string()).or_default();
        if is_up {
            slot.up = Some(contents);
        } else {
            slot.down = Some(contents);
        }
    }

    let mut units = Vec::with_capacity(files.len());
    for (version, unit) in files {
        let up_sql = unit.up.ok_or_else(|| {
            MigrationError::InvalidSource(format!("{} has no {} file", version, UP_SUFFIX))
        })?;
        let down_sql = unit.down.ok_or_else(|| {
            MigrationError::InvalidSource(format!("{} has no {} file", version, DOWN_SUFFIX))
        })?;

        if up_sql.trim().is_empty() {
            return Err(MigrationError::InvalidSource(format!(
                "{}{} is empty",
                version, UP_SUFFIX
            )));
        }

        units.push(MigrationUnit::new(version, up_sql, down_sql));
    }

    if units.is_empty() {
        return Err(MigrationError::InvalidSource(format!(
            "no migrations found in {:?}",
            dir
        )));
    }

    Ok(units)
}
