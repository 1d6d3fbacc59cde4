//! Storage bootstrap, schema migrations and SQL dialects.
//!
//! # Responsibility
//! - Open configured SQLite connections with the schema fully applied.
//! - Describe the SQL differences between supported backends.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - No catalog data is read or written before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod dialect;
pub mod migrations;
mod open;

pub use dialect::{ColumnDef, Dialect};
pub use open::{open_db, open_db_in_memory, open_db_with_timeout, open_from_config};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// The configured backend has SQL generation only, no driver.
    UnsupportedBackend(&'static str),
    Config(crate::config::ConfigError),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::UnsupportedBackend(backend) => {
                write!(f, "backend `{backend}` cannot be opened by this build")
            }
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::UnsupportedBackend(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<crate::config::ConfigError> for DbError {
    fn from(value: crate::config::ConfigError) -> Self {
        Self::Config(value)
    }
}
