//! SQLite database behind the local quote store.
//!
//! # Responsibility
//! - Open the store file, or a throwaway in-memory database, ready for use.
//! - Keep the `kv_store` schema current.
//!
//! # Invariants
//! - A returned connection has every known migration applied.
//! - A file migrated by a newer build is refused, never downgraded.
//! - Open failures name the database they were about.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod open;

pub use migrations::MigrationError;
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Where a store database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    Memory,
}

impl DbLocation {
    /// Short tag for structured logs.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }
}

impl Display for DbLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Memory => f.write_str(":memory:"),
        }
    }
}

#[derive(Debug)]
pub enum DbError {
    /// SQLite could not open or configure the database.
    Open {
        location: DbLocation,
        source: rusqlite::Error,
    },
    /// The database was migrated by a newer build.
    UnsupportedSchemaVersion {
        location: DbLocation,
        db_version: u32,
        latest_supported: u32,
    },
    /// Statement failure on an open database.
    Sqlite(rusqlite::Error),
}

impl DbError {
    fn from_migration(location: DbLocation, err: MigrationError) -> Self {
        match err {
            MigrationError::Sqlite(source) => Self::Open { location, source },
            MigrationError::NewerSchema {
                db_version,
                latest_supported,
            } => Self::UnsupportedSchemaVersion {
                location,
                db_version,
                latest_supported,
            },
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { location, source } => {
                write!(f, "cannot open quote store `{location}`: {source}")
            }
            Self::UnsupportedSchemaVersion {
                location,
                db_version,
                latest_supported,
            } => write!(
                f,
                "quote store `{location}` has schema version {db_version}; this build supports up to {latest_supported}"
            ),
            Self::Sqlite(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
