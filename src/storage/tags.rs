//! Tag dictionary and asset links.
//!
//! A dictionary entry lives exactly as long as some asset links it: linking
//! creates missing entries, and unlinking the last reference prunes the entry.
//! Every mutating function reports the dictionary changes it made as a
//! [`TagDelta`] so the in-memory index can follow.

use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension};

use super::models::{Tag, TagDelta};
use crate::error::StorageError;
use crate::Result;

/// Look up a tag's row id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn tag_id(conn: &Connection, tag: &Tag) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM tag WHERE namespace = ? AND value = ?",
        params![tag.namespace, tag.value],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| StorageError::Database(format!("failed to look up tag: {e}")).into())
}

/// Return the tag's id, inserting it first if needed. The flag is true when
/// the entry was created.
fn get_or_create_tag(conn: &Connection, tag: &Tag) -> Result<(i64, bool)> {
    if let Some(id) = tag_id(conn, tag)? {
        return Ok((id, false));
    }

    conn.execute(
        "INSERT INTO tag (namespace, value) VALUES (?, ?)",
        params![tag.namespace, tag.value],
    )
    .map_err(|e| StorageError::Database(format!("failed to insert tag: {e}")))?;

    Ok((conn.last_insert_rowid(), true))
}

/// Link tags to an asset, creating dictionary entries as needed.
///
/// # Errors
///
/// Returns an error if any insert fails.
pub fn link_tags(conn: &Connection, asset_id: i64, tags: &[Tag]) -> Result<TagDelta> {
    let mut delta = TagDelta::default();

    for tag in tags {
        let (tag_id, created) = get_or_create_tag(conn, tag)?;
        conn.execute(
            "INSERT OR IGNORE INTO asset_tag (asset_id, tag_id) VALUES (?, ?)",
            [asset_id, tag_id],
        )
        .map_err(|e| StorageError::Database(format!("failed to link tag: {e}")))?;

        if created {
            delta.created.push(tag.clone());
        }
    }

    Ok(delta)
}

/// Remove one link and prune the tag if nothing references it any more.
/// Returns true if the dictionary entry was pruned.
fn unlink_tag(conn: &Connection, asset_id: i64, tag_id: i64) -> Result<bool> {
    conn.execute(
        "DELETE FROM asset_tag WHERE asset_id = ? AND tag_id = ?",
        [asset_id, tag_id],
    )
    .map_err(|e| StorageError::Database(format!("failed to unlink tag: {e}")))?;

    prune_if_orphaned(conn, tag_id)
}

fn prune_if_orphaned(conn: &Connection, tag_id: i64) -> Result<bool> {
    let rows = conn
        .execute(
            "DELETE FROM tag WHERE id = ?1
             AND NOT EXISTS (SELECT 1 FROM asset_tag WHERE tag_id = ?1)",
            [tag_id],
        )
        .map_err(|e| StorageError::Database(format!("failed to prune tag: {e}")))?;
    Ok(rows > 0)
}

/// Linked tags with their row ids, ordered by namespace then value.
fn linked_tags(conn: &Connection, asset_id: i64) -> Result<Vec<(i64, Tag)>> {
    let mut stmt = conn
        .prepare(
            "SELECT t.id, t.namespace, t.value FROM asset_tag l
             JOIN tag t ON t.id = l.tag_id
             WHERE l.asset_id = ?
             ORDER BY t.namespace, t.value",
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let rows = stmt
        .query_map([asset_id], |row| {
            Ok((
                row.get(0)?,
                Tag {
                    namespace: row.get(1)?,
                    value: row.get(2)?,
                },
            ))
        })
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(rows)
}

/// All tags linked to an asset, ordered by namespace then value.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn tags_for_asset(conn: &Connection, asset_id: i64) -> Result<Vec<Tag>> {
    Ok(linked_tags(conn, asset_id)?
        .into_iter()
        .map(|(_, tag)| tag)
        .collect())
}

/// Make `tags` the asset's complete tag set.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn replace_asset_tags(conn: &Connection, asset_id: i64, tags: &[Tag]) -> Result<TagDelta> {
    let wanted: HashSet<&Tag> = tags.iter().collect();
    let current = linked_tags(conn, asset_id)?;
    let current_set: HashSet<&Tag> = current.iter().map(|(_, tag)| tag).collect();

    let mut delta = TagDelta::default();

    for (tag_id, tag) in &current {
        if !wanted.contains(tag) && unlink_tag(conn, asset_id, *tag_id)? {
            delta.pruned.push(tag.clone());
        }
    }

    let added: Vec<Tag> = tags
        .iter()
        .filter(|tag| !current_set.contains(tag))
        .cloned()
        .collect();
    delta.merge(link_tags(conn, asset_id, &added)?);

    Ok(delta)
}

/// Remove every link of an asset, pruning orphaned tags.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn unlink_all(conn: &Connection, asset_id: i64) -> Result<TagDelta> {
    let mut delta = TagDelta::default();
    for (tag_id, tag) in linked_tags(conn, asset_id)? {
        if unlink_tag(conn, asset_id, tag_id)? {
            delta.pruned.push(tag);
        }
    }
    Ok(delta)
}

/// Every dictionary entry, for rebuilding the in-memory index.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn all_tags(conn: &Connection) -> Result<Vec<Tag>> {
    let mut stmt = conn
        .prepare("SELECT namespace, value FROM tag ORDER BY namespace, value")
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let tags = stmt
        .query_map([], |row| {
            Ok(Tag {
                namespace: row.get(0)?,
                value: row.get(1)?,
            })
        })
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(tags)
}

/// Count distinct `(namespace, value)` pairs.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_tags(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM tag", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{insert_asset, migrate, Database};

    fn setup() -> (Database, i64, i64) {
        let db = Database::open_in_memory().unwrap();
        let (a, b) = db
            .with_conn(|conn| {
                migrate(conn)?;
                let a = insert_asset(conn, "a.png", "a", "", "", None)?;
                let b = insert_asset(conn, "b.png", "b", "", "", None)?;
                Ok((a, b))
            })
            .unwrap();
        (db, a, b)
    }

    fn tag(ns: &str, value: &str) -> Tag {
        Tag::new(ns, value).unwrap()
    }

    #[test]
    fn test_link_creates_dictionary_entries_once() {
        let (db, a, b) = setup();

        let delta = db
            .with_conn(|conn| link_tags(conn, a, &[tag("animal", "cat"), tag("color", "red")]))
            .unwrap();
        assert_eq!(delta.created.len(), 2);

        let delta = db
            .with_conn(|conn| link_tags(conn, b, &[tag("animal", "cat")]))
            .unwrap();
        assert!(delta.is_empty());

        assert_eq!(db.with_conn(count_tags).unwrap(), 2);
    }

    #[test]
    fn test_same_value_different_namespace() {
        let (db, a, _) = setup();
        db.with_conn(|conn| link_tags(conn, a, &[tag("animal", "cat"), tag("meme", "cat")]))
            .unwrap();
        assert_eq!(db.with_conn(count_tags).unwrap(), 2);
    }

    #[test]
    fn test_tags_for_asset_sorted() {
        let (db, a, _) = setup();
        db.with_conn(|conn| {
            link_tags(conn, a, &[tag("zeta", "z"), tag("alpha", "b"), tag("alpha", "a")])
        })
        .unwrap();

        let tags = db.with_conn(|conn| tags_for_asset(conn, a)).unwrap();
        assert_eq!(tags, vec![tag("alpha", "a"), tag("alpha", "b"), tag("zeta", "z")]);
    }

    #[test]
    fn test_tags_for_untagged_asset() {
        let (db, a, _) = setup();
        assert!(db.with_conn(|conn| tags_for_asset(conn, a)).unwrap().is_empty());
    }

    #[test]
    fn test_replace_has_no_residue() {
        let (db, a, b) = setup();
        db.with_conn(|conn| {
            link_tags(conn, a, &[tag("animal", "cat"), tag("color", "red")])?;
            link_tags(conn, b, &[tag("color", "red")])
        })
        .unwrap();

        let delta = db
            .with_conn(|conn| replace_asset_tags(conn, a, &[tag("animal", "dog"), tag("color", "red")]))
            .unwrap();

        assert_eq!(delta.created, vec![tag("animal", "dog")]);
        assert_eq!(delta.pruned, vec![tag("animal", "cat")]);

        let tags = db.with_conn(|conn| tags_for_asset(conn, a)).unwrap();
        assert_eq!(tags, vec![tag("animal", "dog"), tag("color", "red")]);
    }

    #[test]
    fn test_replace_keeps_shared_tags() {
        let (db, a, b) = setup();
        db.with_conn(|conn| {
            link_tags(conn, a, &[tag("color", "red")])?;
            link_tags(conn, b, &[tag("color", "red")])
        })
        .unwrap();

        let delta = db.with_conn(|conn| replace_asset_tags(conn, a, &[])).unwrap();
        assert!(delta.pruned.is_empty());
        assert_eq!(db.with_conn(count_tags).unwrap(), 1);
    }

    #[test]
    fn test_unlink_all_prunes() {
        let (db, a, _) = setup();
        db.with_conn(|conn| link_tags(conn, a, &[tag("animal", "cat")]))
            .unwrap();

        let delta = db.with_conn(|conn| unlink_all(conn, a)).unwrap();
        assert_eq!(delta.pruned, vec![tag("animal", "cat")]);
        assert_eq!(db.with_conn(count_tags).unwrap(), 0);
        assert!(db.with_conn(all_tags).unwrap().is_empty());
    }
}
