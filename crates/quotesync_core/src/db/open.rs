//! Connection bootstrap for the store database.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure pragmas the store relies on for durability.
//! - Run schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections use `synchronous=FULL`, so committed writes survive a crash.
//! - Returned connections wait up to `BUSY_TIMEOUT` for other processes sharing the file.

use super::migrations::apply_migrations;
use super::{DbError, DbLocation, DbResult};
use log::{error, info, warn};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the store file and applies all pending migrations.
///
/// Parent directories are created when missing.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        // Open below reports the definitive failure.
        if let Err(err) = std::fs::create_dir_all(parent) {
            warn!("event=db_open module=db status=warn mode=file error_code=db_dir_failed error={err}");
        }
    }
    open_at(DbLocation::File(path.to_path_buf()))
}

/// Opens an in-memory database and applies all pending migrations.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_at(DbLocation::Memory)
}

fn open_at(location: DbLocation) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = location.mode();
    info!("event=db_open module=db status=start mode={mode}");

    let result = connect(&location).and_then(|mut conn| {
        bootstrap(&mut conn, &location)?;
        Ok(conn)
    });

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error_code={} error={err}",
            started_at.elapsed().as_millis(),
            error_code(err)
        ),
    }
    result
}

fn connect(location: &DbLocation) -> DbResult<Connection> {
    let opened = match location {
        DbLocation::File(path) => Connection::open(path),
        DbLocation::Memory => Connection::open_in_memory(),
    };
    opened.map_err(|source| DbError::Open {
        location: location.clone(),
        source,
    })
}

fn bootstrap(conn: &mut Connection, location: &DbLocation) -> DbResult<()> {
    let configured = conn
        .execute_batch("PRAGMA synchronous = FULL;")
        .and_then(|()| conn.busy_timeout(BUSY_TIMEOUT));
    configured.map_err(|source| DbError::Open {
        location: location.clone(),
        source,
    })?;

    apply_migrations(conn)
        .map(|_| ())
        .map_err(|err| DbError::from_migration(location.clone(), err))
}

fn error_code(err: &DbError) -> &'static str {
    match err {
        DbError::Open { .. } => "db_open_failed",
        DbError::UnsupportedSchemaVersion { .. } => "db_schema_too_new",
        DbError::Sqlite(_) => "db_bootstrap_failed",
    }
}
