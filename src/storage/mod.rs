//! `SQLite` storage for the asset library.
//!
//! This module provides persistent storage for:
//! - Asset rows with favorite and trash flags
//! - The tag dictionary and asset-tag links
//! - Content files addressed by hash
//! - Schema versioning and migrations

mod assets;
mod connection;
mod content;
mod models;
mod schema;
mod tags;

pub(crate) use assets::{row_to_asset, ASSET_COLUMNS};
pub use assets::{
    count_assets, count_flags, delete_asset, ensure_asset, find_by_hash, get_asset, insert_asset,
    set_favorite, set_trash, update_asset_fields,
};
pub use connection::Database;
pub use content::{ContentStore, StoredContent};
pub use models::{
    normalize_tags, validate_text, Asset, AssetUpdate, LibraryStats, NewAsset, SearchMode, Tag,
    TagDelta, MAX_DESC_LEN, MAX_SUMMARY_LEN, MAX_TAG_LEN,
};
pub use schema::{current_version, migrate, verify_schema, SCHEMA_VERSION};
pub use tags::{
    all_tags, count_tags, link_tags, replace_asset_tags, tag_id, tags_for_asset, unlink_all,
};

/// Initialize storage with migrations.
///
/// Migrations run in a single transaction, so a failed upgrade leaves the
/// previous schema untouched.
///
/// # Errors
///
/// Returns an error if the schema is newer than this build or a migration fails.
pub fn init_storage(db: &Database) -> crate::Result<()> {
    db.with_transaction(|conn| {
        migrate(conn)?;
        verify_schema(conn)?;
        Ok(())
    })?;

    tracing::info!("Storage initialized, schema version {SCHEMA_VERSION}");
    Ok(())
}
