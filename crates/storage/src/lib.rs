//! Durable storage for the Gatehouse control plane.
//!
//! SQLite behind an r2d2 pool. The write path is always driven by the
//! deployment/API-key services (dual-write protocol): the database is
//! written first, the in-memory store second, so anything visible in
//! memory is durable. On startup everything here is re-imported as
//! `pending` so the first snapshot re-drives the data plane.

mod api_keys;
mod certificates;
mod deployments;
mod migrations;
mod templates;

use std::time::Duration;

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;

use gatehouse_domain::config::DatabaseConfig;
use gatehouse_domain::{Error, Result};

pub(crate) type Conn = PooledConnection<SqliteConnectionManager>;

/// Handle to the SQLite database. Cheap to clone.
#[derive(Clone)]
pub struct PersistentStorage {
    pool: r2d2::Pool<SqliteConnectionManager>,
}

impl PersistentStorage {
    /// Open (or create) the database at the configured path and bring the
    /// schema to the latest migration.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(&config.path).with_init(|c| {
            c.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
        });
        let pool = r2d2::Pool::builder()
            .max_size(config.max_connections)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)
            .map_err(|e| Error::DatabaseUnavailable(format!("opening pool: {e}")))?;

        let storage = Self { pool };
        {
            let mut conn = storage.conn()?;
            // journal_mode returns the resulting mode as a row; accept any.
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))
                .map_err(map_sqlite_err)?;
            migrations::migrate(&mut conn)?;
        }
        tracing::info!(path = %config.path.display(), "persistent storage ready");
        Ok(storage)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = r2d2::Pool::builder()
            // A single connection so every caller sees the same memory db.
            .max_size(1)
            .build(manager)
            .map_err(|e| Error::DatabaseUnavailable(format!("opening pool: {e}")))?;
        let storage = Self { pool };
        {
            let mut conn = storage.conn()?;
            migrations::migrate(&mut conn)?;
        }
        Ok(storage)
    }

    pub(crate) fn conn(&self) -> Result<Conn> {
        self.pool
            .get()
            .map_err(|e| Error::DatabaseUnavailable(format!("acquiring connection: {e}")))
    }
}

/// Translate sqlite errors into the shared taxonomy: uniqueness and other
/// constraint violations surface as `Conflict`, everything else is an
/// internal storage error.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::Conflict(e.to_string())
        }
        rusqlite::Error::QueryReturnedNoRows => Error::NotFound("row not found".into()),
        _ => Error::Internal(format!("sqlite: {e}")),
    }
}

pub(crate) fn parse_dt(raw: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| Error::Internal(format!("bad timestamp {raw:?} in database: {e}")))
}

pub(crate) fn parse_opt_dt(raw: Option<String>) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    raw.as_deref().map(parse_dt).transpose()
}
