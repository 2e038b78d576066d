//! Database schema definitions and migrations.
//!
//! Provides versioned schema migrations for safe database upgrades.

use rusqlite::Connection;

use crate::error::StorageError;
use crate::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Run all pending migrations.
///
/// Callers should run this inside a transaction so a failed step leaves the
/// previous version intact.
///
/// # Errors
///
/// Returns `StorageError::IncompatibleSchema` if the database was written by a
/// newer build, or a migration error if a step fails.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| StorageError::Migration(format!("failed to create migrations table: {e}")))?;

    let current_version = current_version(conn)?;
    tracing::info!(
        current = current_version,
        target = SCHEMA_VERSION,
        "Checking database migrations"
    );

    if current_version > SCHEMA_VERSION {
        return Err(StorageError::IncompatibleSchema {
            found: current_version,
            supported: SCHEMA_VERSION,
        }
        .into());
    }

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the persisted schema version (0 for an empty database).
///
/// # Errors
///
/// Returns an error if the migrations table cannot be read.
pub fn current_version(conn: &Connection) -> Result<i32> {
    let result = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    );

    match result {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(StorageError::Migration(format!("failed to get version: {e}")).into()),
    }
}

/// Record a migration as applied.
fn record_migration(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)",
        rusqlite::params![version, chrono::Utc::now().timestamp()],
    )
    .map_err(|e| StorageError::Migration(format!("failed to record migration: {e}")))?;

    Ok(())
}

/// Migration v1: assets, tag dictionary and links.
fn migrate_v1(conn: &Connection) -> Result<()> {
    tracing::info!("Applying migration v1: Initial schema");

    conn.execute_batch(
        r"
        -- AUTOINCREMENT keeps ids from being reused after a purge
        CREATE TABLE IF NOT EXISTS asset (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            extra_data TEXT,
            summary TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            fav INTEGER NOT NULL DEFAULT 0,
            trash INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tag (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            namespace TEXT NOT NULL,
            value TEXT NOT NULL,
            UNIQUE(namespace, value)
        );

        CREATE TABLE IF NOT EXISTS asset_tag (
            asset_id INTEGER NOT NULL REFERENCES asset(id) ON DELETE CASCADE,
            tag_id INTEGER NOT NULL REFERENCES tag(id) ON DELETE CASCADE,
            PRIMARY KEY (asset_id, tag_id)
        );
        ",
    )
    .map_err(|e| StorageError::Migration(format!("v1 migration failed: {e}")))?;

    record_migration(conn, 1)?;
    tracing::info!("Migration v1 complete");

    Ok(())
}

/// Migration v2: content addressing and search ordering indexes.
fn migrate_v2(conn: &Connection) -> Result<()> {
    tracing::info!("Applying migration v2: Search indexes");

    conn.execute_batch(
        r"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_asset_content_hash ON asset(content_hash);
        CREATE INDEX IF NOT EXISTS idx_asset_order ON asset(trash, updated_at DESC, id DESC);
        CREATE INDEX IF NOT EXISTS idx_asset_tag_tag ON asset_tag(tag_id);
        CREATE INDEX IF NOT EXISTS idx_tag_value_nocase ON tag(value COLLATE NOCASE);
        ",
    )
    .map_err(|e| StorageError::Migration(format!("v2 migration failed: {e}")))?;

    record_migration(conn, 2)?;
    tracing::info!("Migration v2 complete");

    Ok(())
}

/// Verify all expected tables exist.
///
/// # Errors
///
/// Returns an error if any expected table is missing from the schema.
pub fn verify_schema(conn: &Connection) -> Result<()> {
    let tables = ["asset", "tag", "asset_tag", "schema_migrations"];

    for table in tables {
        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?",
                [table],
                |_| Ok(true),
            )
            .unwrap_or(false);

        if !exists {
            return Err(StorageError::Migration(format!("table '{table}' not found")).into());
        }
    }

    tracing::debug!("Schema verification passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use crate::ErrorKind;

    #[test]
    fn test_migrate_empty_database() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            migrate(conn)?;
            verify_schema(conn)?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_migrate_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            migrate(conn)?;
            migrate(conn)?;
            verify_schema(conn)?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_schema_version_tracking() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            assert_eq!(
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE name = 'schema_migrations'",
                    [],
                    |row| row.get::<_, i64>(0)
                )?,
                0
            );
            migrate(conn)?;
            assert_eq!(current_version(conn)?, SCHEMA_VERSION);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_upgrade_from_v1() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "CREATE TABLE schema_migrations (version INTEGER PRIMARY KEY, applied_at INTEGER NOT NULL)",
                [],
            )?;
            migrate_v1(conn)?;
            assert_eq!(current_version(conn)?, 1);

            migrate(conn)?;
            assert_eq!(current_version(conn)?, 2);

            let has_index: bool = conn.query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'index' AND name = 'idx_asset_content_hash'",
                [],
                |row| row.get(0),
            )?;
            assert!(has_index);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_newer_schema_rejected() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .with_conn(|conn| {
                migrate(conn)?;
                record_migration(conn, SCHEMA_VERSION + 1)?;
                migrate(conn)
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompatibleSchema);
    }

    #[test]
    fn test_unique_tag_pair() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            migrate(conn)?;

            conn.execute("INSERT INTO tag (namespace, value) VALUES ('animal', 'cat')", [])?;
            conn.execute("INSERT INTO tag (namespace, value) VALUES ('color', 'cat')", [])?;

            let dup = conn.execute("INSERT INTO tag (namespace, value) VALUES ('animal', 'cat')", []);
            assert!(dup.is_err());

            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_link_cascades_on_asset_delete() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            migrate(conn)?;

            conn.execute(
                "INSERT INTO asset (content, content_hash, created_at, updated_at)
                 VALUES ('a.png', 'a', 1, 1)",
                [],
            )?;
            conn.execute("INSERT INTO tag (namespace, value) VALUES ('animal', 'cat')", [])?;
            conn.execute("INSERT INTO asset_tag (asset_id, tag_id) VALUES (1, 1)", [])?;
            conn.execute("DELETE FROM asset WHERE id = 1", [])?;

            let links: i64 = conn.query_row("SELECT COUNT(*) FROM asset_tag", [], |row| row.get(0))?;
            assert_eq!(links, 0);
            Ok(())
        })
        .unwrap();
    }
}
