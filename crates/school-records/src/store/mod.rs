//! SQLite-backed persistence shared by every core component.
//!
//! All mutations run through [`Database::write`], which wraps the closure in an
//! IMMEDIATE transaction: the closure's `Ok` commits, its `Err` rolls back, so a
//! failed operation never leaves partial state behind. Reads go through
//! [`Database::read`] and never open a write lock.

pub mod migrations;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use tracing::{debug, error, info};

use crate::config::StorageConfig;

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-level failures. Domain errors wrap this via `#[from]`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database schema version {found} is newer than supported {supported}")]
    UnsupportedSchemaVersion { found: u32, supported: u32 },
    #[error("database connection lock poisoned")]
    Poisoned,
    #[error("blocking storage task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

impl StoreError {
    /// True when the failure is a UNIQUE constraint whose message mentions `needle`.
    pub(crate) fn is_unique_violation(&self, needle: &str) -> bool {
        match self {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, Some(message))) => {
                err.code == ErrorCode::ConstraintViolation
                    && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && message.contains(needle)
            }
            _ => false,
        }
    }
}

/// Cloneable handle over a single serialized SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the database described by the storage config.
    pub fn connect(config: &StorageConfig) -> StoreResult<Self> {
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        if config.database_url == ":memory:" {
            Self::bootstrap(Connection::open_in_memory()?, "memory", busy_timeout)
        } else {
            Self::open_with_timeout(&config.database_url, busy_timeout)
        }
    }

    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_timeout(path, Duration::from_secs(5))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::bootstrap(Connection::open_in_memory()?, "memory", Duration::from_secs(5))
    }

    fn open_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::bootstrap(conn, "file", busy_timeout)
    }

    fn bootstrap(mut conn: Connection, mode: &str, busy_timeout: Duration) -> StoreResult<Self> {
        let started_at = Instant::now();
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(busy_timeout)?;

        match migrations::apply_migrations(&mut conn) {
            Ok(version) => {
                info!(
                    mode,
                    schema_version = version,
                    duration_ms = started_at.elapsed().as_millis() as u64,
                    "database ready"
                );
                Ok(Self {
                    conn: Arc::new(Mutex::new(conn)),
                })
            }
            Err(err) => {
                error!(mode, error = %err, "database bootstrap failed");
                Err(err)
            }
        }
    }

    /// Current `PRAGMA user_version` of the open database.
    pub fn schema_version(&self) -> StoreResult<u32> {
        self.read(|conn| migrations::current_version(conn))
    }

    /// Runs a read-only closure against the connection.
    pub fn read<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&*conn)
    }

    /// Runs the closure inside an IMMEDIATE transaction.
    ///
    /// The transaction commits only when the closure returns `Ok`; on `Err` it is
    /// dropped, which rolls back every statement the closure executed.
    pub fn write<T, E>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;

        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(StoreError::from)?;
                Ok(value)
            }
            Err(err) => {
                debug!("write transaction rolled back");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_database_is_fully_migrated() {
        let db = Database::open_in_memory().expect("open");
        assert_eq!(db.schema_version().expect("version"), migrations::latest_version());
    }

    #[test]
    fn connect_honours_the_memory_url() {
        let db = Database::connect(&StorageConfig::in_memory()).expect("connect");
        assert_eq!(db.schema_version().expect("version"), migrations::latest_version());
    }

    #[test]
    fn reopening_a_file_database_keeps_the_schema() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("records.db");

        Database::open(&path).expect("first open");
        let db = Database::open(&path).expect("second open");
        assert_eq!(db.schema_version().expect("version"), migrations::latest_version());
    }

    #[test]
    fn newer_schema_version_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("future.db");
        {
            let conn = Connection::open(&path).expect("raw open");
            conn.execute_batch("PRAGMA user_version = 99;").expect("bump version");
        }

        match Database::open(&path) {
            Err(StoreError::UnsupportedSchemaVersion { found, supported }) => {
                assert_eq!(found, 99);
                assert_eq!(supported, migrations::latest_version());
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("future schema must not open"),
        }
    }

    #[test]
    fn failed_write_rolls_back_every_statement() {
        let db = Database::open_in_memory().expect("open");

        let result: Result<(), StoreError> = db.write(|tx| {
            tx.execute("INSERT INTO schools (name) VALUES ('Escola Centro')", [])?;
            tx.execute("INSERT INTO subjects (name, code) VALUES ('Math', 'MAT')", [])?;
            tx.execute("INSERT INTO subjects (name, code) VALUES ('Maths', 'MAT')", [])?;
            Ok(())
        });
        assert!(result.is_err());

        let schools: i64 = db
            .read(|conn| -> StoreResult<i64> {
                Ok(conn.query_row("SELECT COUNT(*) FROM schools", [], |row| row.get(0))?)
            })
            .expect("count");
        assert_eq!(schools, 0);
    }
}
