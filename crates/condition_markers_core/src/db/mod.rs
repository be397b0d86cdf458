//! Scene database bootstrap.
//!
//! # Responsibility
//! - Open scene databases with every known migration applied.
//! - Refuse files whose schema this build cannot read or has not prepared.
//!
//! # Invariants
//! - The schema version lives in `PRAGMA user_version`.
//! - Stores only wrap connections that pass `ensure_migrated`.

use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use migrations::latest_version;
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was written by a newer build.
    SchemaTooNew { found: u32, supported: u32 },
    /// The connection was opened without running migrations.
    SchemaBehind { found: u32, required: u32 },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "scene schema v{found} is newer than this build supports (v{supported})"
            ),
            Self::SchemaBehind { found, required } => write!(
                f,
                "scene schema v{found} has not been migrated to v{required}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::SchemaTooNew { .. } | Self::SchemaBehind { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Checks that `conn` carries exactly the schema this build writes.
pub fn ensure_migrated(conn: &Connection) -> DbResult<()> {
    let found = migrations::current_user_version(conn)?;
    let required = latest_version();
    if found < required {
        return Err(DbError::SchemaBehind { found, required });
    }
    if found > required {
        return Err(DbError::SchemaTooNew {
            found,
            supported: required,
        });
    }
    Ok(())
}
