//! `SQLite` database connection management.
//!
//! Provides a connection wrapper with proper configuration for:
//! - WAL mode for concurrent reads
//! - Serialized access (via `parking_lot::Mutex`)
//! - Bounded retry when another process holds the write lock

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::StorageError;
use crate::Result;

/// Attempts at `BEGIN IMMEDIATE` before reporting the store unavailable.
const BEGIN_ATTEMPTS: u32 = 5;

/// First backoff delay; doubles on every retry.
const BEGIN_BACKOFF: Duration = Duration::from_millis(10);

/// Default busy timeout used when none is configured.
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection wrapper.
///
/// Wraps a `SQLite` connection with proper configuration and locking.
/// Clone is cheap - it just clones the Arc.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: String,
}

impl Database {
    /// Open a database at the given path with the default busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or configured.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open a database at the given path.
    ///
    /// Creates the database file and parent directories if they don't exist.
    /// Configures WAL mode and performance settings.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the database cannot be opened or configured.
    pub fn open_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let path_str = path.to_string_lossy().to_string();

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StorageError::Unavailable(format!("failed to open database: {e}")))?;

        conn.busy_timeout(busy_timeout)
            .map_err(|e| StorageError::Unavailable(format!("failed to set busy timeout: {e}")))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path_str,
        };

        db.configure()?;

        Ok(db)
    }

    /// Open an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            StorageError::Unavailable(format!("failed to open in-memory database: {e}"))
        })?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: ":memory:".to_string(),
        };

        db.configure()?;

        Ok(db)
    }

    /// Configure database settings for optimal performance.
    fn configure(&self) -> Result<()> {
        {
            let conn = self.conn.lock();

            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA cache_size = -16000;  -- 16MB cache
                PRAGMA temp_store = MEMORY;
                PRAGMA foreign_keys = ON;
                ",
            )
            .map_err(|e| StorageError::Unavailable(format!("failed to configure database: {e}")))?;
        }

        tracing::debug!(path = %self.path, "Database configured with WAL mode");

        Ok(())
    }

    /// Execute a function with exclusive database access.
    ///
    /// # Errors
    ///
    /// Returns an error if the function fails.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Execute a function that may modify the database.
    ///
    /// Wraps the operation in an immediate transaction. Everything the
    /// function wrote is rolled back if it returns an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the write lock cannot be taken
    /// after retrying, or the function's own error.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();

        begin_immediate(&conn)?;

        match f(&conn) {
            Ok(result) => {
                if let Err(e) = conn.execute_batch("COMMIT") {
                    let _ = conn.execute_batch("ROLLBACK");
                    return Err(StorageError::from(e).into());
                }
                Ok(result)
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Get the database path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Check if the database is healthy.
    ///
    /// # Errors
    ///
    /// Returns an error if the health check fails.
    pub fn health_check(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))
                .map_err(|e| StorageError::Unavailable(format!("health check failed: {e}")).into())
        })
    }
}

/// Start a write transaction, backing off while another writer holds the lock.
fn begin_immediate(conn: &Connection) -> Result<()> {
    let mut delay = BEGIN_BACKOFF;
    let mut attempt = 1;

    loop {
        match conn.execute_batch("BEGIN IMMEDIATE") {
            Ok(()) => return Ok(()),
            Err(e) => match StorageError::from(e) {
                StorageError::Unavailable(reason) if attempt < BEGIN_ATTEMPTS => {
                    tracing::debug!(attempt, %reason, "Database busy, retrying");
                    std::thread::sleep(delay);
                    delay *= 2;
                    attempt += 1;
                }
                StorageError::Unavailable(reason) => {
                    return Err(StorageError::Unavailable(format!(
                        "write lock not acquired after {BEGIN_ATTEMPTS} attempts: {reason}"
                    ))
                    .into());
                }
                other => return Err(other.into()),
            },
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
