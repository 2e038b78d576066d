//! Asset row operations.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{now_millis, Asset, AssetUpdate};
use crate::error::StorageError;
use crate::Result;

/// Columns selected for every asset read, in `row_to_asset` order.
pub(crate) const ASSET_COLUMNS: &str =
    "a.id, a.content, a.extra_data, a.summary, a.description, a.fav, a.trash, a.created_at, a.updated_at";

/// Map a row selected with [`ASSET_COLUMNS`].
pub(crate) fn row_to_asset(row: &Row<'_>) -> rusqlite::Result<Asset> {
    Ok(Asset {
        id: row.get(0)?,
        content: row.get(1)?,
        extra_data: row.get(2)?,
        summary: row.get(3)?,
        desc: row.get(4)?,
        fav: row.get(5)?,
        trash: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn not_found(id: i64) -> crate::Error {
    StorageError::not_found("asset", id.to_string()).into()
}

/// Insert a new asset row with both flags cleared.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_asset(
    conn: &Connection,
    content: &str,
    content_hash: &str,
    summary: &str,
    desc: &str,
    extra_data: Option<&str>,
) -> Result<i64> {
    let now = now_millis();
    conn.execute(
        "INSERT INTO asset (content, content_hash, extra_data, summary, description, fav, trash, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, 0, 0, ?, ?)",
        params![content, content_hash, extra_data, summary, desc, now, now],
    )
    .map_err(|e| StorageError::Database(format!("failed to insert asset: {e}")))?;

    let id = conn.last_insert_rowid();
    tracing::trace!(id, content, "Inserted asset");
    Ok(id)
}

/// Find the asset already holding content with this hash.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn find_by_hash(conn: &Connection, content_hash: &str) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM asset WHERE content_hash = ?",
        [content_hash],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| StorageError::Database(format!("failed to look up content hash: {e}")).into())
}

/// Get an asset by ID.
///
/// # Errors
///
/// Returns `NotFound` if the asset does not exist.
pub fn get_asset(conn: &Connection, id: i64) -> Result<Asset> {
    conn.query_row(
        &format!("SELECT {ASSET_COLUMNS} FROM asset a WHERE a.id = ?"),
        [id],
        row_to_asset,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => not_found(id),
        e => StorageError::Database(format!("failed to get asset: {e}")).into(),
    })
}

/// Fail with `NotFound` unless the asset exists.
///
/// # Errors
///
/// Returns `NotFound` if the asset does not exist.
pub fn ensure_asset(conn: &Connection, id: i64) -> Result<()> {
    let exists: bool = conn
        .query_row("SELECT EXISTS(SELECT 1 FROM asset WHERE id = ?)", [id], |row| {
            row.get(0)
        })
        .map_err(|e| StorageError::Database(e.to_string()))?;

    if exists {
        Ok(())
    } else {
        Err(not_found(id))
    }
}

/// Apply the scalar fields of an update and bump `updated_at`.
///
/// Tags are handled by the caller in the same transaction.
///
/// # Errors
///
/// Returns `NotFound` if the asset does not exist.
pub fn update_asset_fields(conn: &Connection, id: i64, update: &AssetUpdate) -> Result<()> {
    let extra_supplied = update.extra_data.is_some();
    let extra_value = update.extra_data.clone().flatten();

    let rows = conn
        .execute(
            "UPDATE asset SET
                summary = COALESCE(?2, summary),
                description = COALESCE(?3, description),
                extra_data = CASE WHEN ?4 THEN ?5 ELSE extra_data END,
                updated_at = ?6
             WHERE id = ?1",
            params![
                id,
                update.summary,
                update.desc,
                extra_supplied,
                extra_value,
                now_millis()
            ],
        )
        .map_err(|e| StorageError::Database(format!("failed to update asset: {e}")))?;

    if rows == 0 {
        return Err(not_found(id));
    }

    Ok(())
}

/// Set the favorite flag. Does not move the asset in search order.
///
/// # Errors
///
/// Returns `NotFound` if the asset does not exist.
pub fn set_favorite(conn: &Connection, id: i64, value: bool) -> Result<()> {
    let rows = conn
        .execute("UPDATE asset SET fav = ?2 WHERE id = ?1", params![id, value])
        .map_err(|e| StorageError::Database(format!("failed to set favorite: {e}")))?;

    if rows == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

/// Set the trash flag and bump `updated_at` when it changes.
///
/// # Errors
///
/// Returns `NotFound` if the asset does not exist.
pub fn set_trash(conn: &Connection, id: i64, value: bool) -> Result<()> {
    ensure_asset(conn, id)?;
    conn.execute(
        "UPDATE asset SET trash = ?2, updated_at = ?3 WHERE id = ?1 AND trash != ?2",
        params![id, value, now_millis()],
    )
    .map_err(|e| StorageError::Database(format!("failed to set trash: {e}")))?;
    Ok(())
}

/// Delete an asset row; links cascade.
///
/// # Errors
///
/// Returns `NotFound` if the asset does not exist.
pub fn delete_asset(conn: &Connection, id: i64) -> Result<()> {
    let rows = conn
        .execute("DELETE FROM asset WHERE id = ?", [id])
        .map_err(|e| StorageError::Database(format!("failed to delete asset: {e}")))?;

    if rows == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

/// Count all assets regardless of flags.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_assets(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM asset", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()).into())
}

/// Count favorites and trashed assets.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_flags(conn: &Connection) -> Result<(i64, i64)> {
    conn.query_row(
        "SELECT COALESCE(SUM(fav), 0), COALESCE(SUM(trash), 0) FROM asset",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .map_err(|e| StorageError::Database(e.to_string()).into())
}
