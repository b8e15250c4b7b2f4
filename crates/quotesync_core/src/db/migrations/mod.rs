//! Versioned schema steps for the store database.
//!
//! # Responsibility
//! - List the schema steps the store needs, oldest first.
//! - Bring an older database up to date in a single transaction.
//!
//! # Invariants
//! - Step versions start at 1 and increase by one.
//! - `PRAGMA user_version` equals the last applied step.
//! - A database newer than `latest_version()` is left untouched.

use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

struct Step {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[Step] = &[Step {
    version: 1,
    name: "kv_store",
    sql: include_str!("0001_kv_store.sql"),
}];

/// Why the schema could not be brought up to date.
#[derive(Debug)]
pub enum MigrationError {
    Sqlite(rusqlite::Error),
    NewerSchema { db_version: u32, latest_supported: u32 },
}

impl Display for MigrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "schema migration failed: {err}"),
            Self::NewerSchema {
                db_version,
                latest_supported,
            } => write!(
                f,
                "schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for MigrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::NewerSchema { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for MigrationError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Reads the schema version recorded in the database.
pub fn schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
}

/// Applies every step newer than the recorded schema version.
///
/// Returns the number of steps applied.
pub fn apply_migrations(conn: &mut Connection) -> Result<usize, MigrationError> {
    let current = schema_version(conn)?;
    let latest = latest_version();
    if current > latest {
        return Err(MigrationError::NewerSchema {
            db_version: current,
            latest_supported: latest,
        });
    }

    let pending: Vec<&Step> = STEPS.iter().filter(|step| step.version > current).collect();
    if pending.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    for step in &pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        info!(
            "event=db_migrate module=db status=step version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={current} to_version={latest}");
    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, latest_version, schema_version, STEPS};
    use rusqlite::Connection;

    #[test]
    fn step_versions_are_contiguous_from_one() {
        for (index, step) in STEPS.iter().enumerate() {
            assert_eq!(step.version as usize, index + 1, "step {}", step.name);
        }
    }

    #[test]
    fn second_run_applies_nothing() {
        let mut conn = Connection::open_in_memory().expect("memory db");
        assert_eq!(apply_migrations(&mut conn).expect("first run"), STEPS.len());
        assert_eq!(apply_migrations(&mut conn).expect("second run"), 0);
        assert_eq!(schema_version(&conn).expect("version"), latest_version());
    }
}
