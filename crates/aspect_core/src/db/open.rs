//! Connection bootstrap for SQLite.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - Returned connections have every migration applied.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use crate::config::{EngineConfig, DEFAULT_BUSY_TIMEOUT_MS};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens (or creates) the database file at `path` with the default busy
/// timeout.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_db_with_timeout(path, DEFAULT_BUSY_TIMEOUT_MS)
}

pub fn open_db_with_timeout(path: impl AsRef<Path>, busy_timeout_ms: u64) -> DbResult<Connection> {
    bootstrap("file", busy_timeout_ms, || Connection::open(path))
}

/// Fresh private in-memory database; used by tests and previews.
pub fn open_db_in_memory() -> DbResult<Connection> {
    bootstrap("memory", DEFAULT_BUSY_TIMEOUT_MS, Connection::open_in_memory)
}

/// Opens the backend described by `config`. Relative paths resolve against
/// `base_dir`.
pub fn open_from_config(config: &EngineConfig, base_dir: &Path) -> DbResult<Connection> {
    config.validate()?;
    match config.dialect() {
        super::Dialect::Sqlite => {
            let path = config.sqlite_path(base_dir)?;
            open_db_with_timeout(path, config.busy_timeout_ms())
        }
        other => {
            error!(
                "event=db_open module=db status=error backend={} error_code=unsupported_backend",
                other.name()
            );
            Err(DbError::UnsupportedBackend(other.name()))
        }
    }
}

fn bootstrap<F>(mode: &str, busy_timeout_ms: u64, connect: F) -> DbResult<Connection>
where
    F: FnOnce() -> rusqlite::Result<Connection>,
{
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let result = connect()
        .map_err(DbError::from)
        .and_then(|mut conn| configure(&mut conn, busy_timeout_ms).map(|()| conn));

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn configure(conn: &mut Connection, busy_timeout_ms: u64) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
    apply_migrations(conn)
}
