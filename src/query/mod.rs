//! Paginated search over assets and their tags.
//!
//! A statement is parsed into a conjunction of clauses (see [`parser`]),
//! combined with the [`SearchMode`] filter, and executed as one
//! parameterized statement. Pages are 0-based with a fixed size.

pub mod parser;
mod sql;

use rusqlite::{params_from_iter, Connection};

use crate::error::StorageError;
use crate::storage::{row_to_asset, Asset, SearchMode};
use crate::Result;

pub use parser::{parse, Clause, Query, Term};
pub use sql::{build_count_sql, build_search_sql, SqlQuery};

/// Fetch one page of assets matching `statement` in `mode`.
///
/// A page past the end yields an empty vector.
///
/// # Errors
///
/// Returns a validation error for a malformed statement, or a storage error
/// if the query fails.
pub fn search_assets(
    conn: &Connection,
    statement: &str,
    page: u32,
    mode: SearchMode,
    page_size: u32,
) -> Result<Vec<Asset>> {
    let query = parse(statement)?;
    let offset = i64::from(page) * i64::from(page_size);
    let sql = build_search_sql(&query, mode, page_size, offset);

    let mut stmt = conn
        .prepare(&sql.sql)
        .map_err(|e| StorageError::Database(format!("failed to prepare search: {e}")))?;

    let assets = stmt
        .query_map(params_from_iter(sql.params.iter()), row_to_asset)
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    tracing::debug!(statement, page, %mode, hits = assets.len(), "Search executed");
    Ok(assets)
}

/// Count every asset matching `statement` in `mode`.
///
/// # Errors
///
/// Returns a validation error for a malformed statement, or a storage error
/// if the query fails.
pub fn count_matches(conn: &Connection, statement: &str, mode: SearchMode) -> Result<i64> {
    let query = parse(statement)?;
    let sql = build_count_sql(&query, mode);

    conn.query_row(&sql.sql, params_from_iter(sql.params.iter()), |row| {
        row.get(0)
    })
    .map_err(|e| StorageError::Database(format!("failed to count matches: {e}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{
        insert_asset, link_tags, migrate, set_favorite, set_trash, Database, Tag,
    };
    use rusqlite::params;

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(migrate).unwrap();
        db
    }

    /// Insert an asset with a fixed `updated_at` so ordering is predictable.
    fn add(db: &Database, hash: &str, summary: &str, tags: &[(&str, &str)], at: i64) -> i64 {
        db.with_conn(|conn| {
            let id = insert_asset(conn, &format!("{hash}.png"), hash, summary, "", None)?;
            let tags: Vec<Tag> = tags.iter().map(|(ns, v)| Tag::new(ns, v).unwrap()).collect();
            link_tags(conn, id, &tags)?;
            conn.execute("UPDATE asset SET updated_at = ? WHERE id = ?", params![at, id])?;
            Ok(id)
        })
        .unwrap()
    }

    fn ids(db: &Database, statement: &str, page: u32, mode: SearchMode, size: u32) -> Vec<i64> {
        db.with_conn(|conn| search_assets(conn, statement, page, mode, size))
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect()
    }

    #[test]
    fn test_empty_statement_matches_mode() {
        let db = setup();
        let a = add(&db, "a", "one", &[], 1);
        let b = add(&db, "b", "two", &[], 2);
        db.with_conn(|conn| set_trash(conn, a, true)).unwrap();

        assert_eq!(ids(&db, "", 0, SearchMode::Normal, 30), vec![b]);
        assert_eq!(ids(&db, "", 0, SearchMode::OnlyTrash, 30), vec![a]);
        assert!(ids(&db, "", 0, SearchMode::OnlyFav, 30).is_empty());
    }

    #[test]
    fn test_fav_mode_excludes_trash() {
        let db = setup();
        let a = add(&db, "a", "one", &[], 1);
        let b = add(&db, "b", "two", &[], 2);
        db.with_conn(|conn| {
            set_favorite(conn, a, true)?;
            set_favorite(conn, b, true)?;
            set_trash(conn, b, true)
        })
        .unwrap();

        assert_eq!(ids(&db, "", 0, SearchMode::OnlyFav, 30), vec![a]);
    }

    #[test]
    fn test_text_matches_summary_and_tag_value() {
        let db = setup();
        let a = add(&db, "a", "cat meme", &[], 1);
        let b = add(&db, "b", "untitled", &[("animal", "Cat")], 2);
        let _c = add(&db, "c", "dog", &[], 3);

        assert_eq!(ids(&db, "cat", 0, SearchMode::Normal, 30), vec![b, a]);
    }

    #[test]
    fn test_terms_are_conjunctive() {
        let db = setup();
        let a = add(&db, "a", "funny cat", &[("animal", "cat")], 1);
        let _b = add(&db, "b", "funny dog", &[("animal", "dog")], 2);

        assert_eq!(ids(&db, "funny animal:cat", 0, SearchMode::Normal, 30), vec![a]);
        assert_eq!(ids(&db, "funny -animal:dog", 0, SearchMode::Normal, 30), vec![a]);
    }

    #[test]
    fn test_tag_namespace_matters() {
        let db = setup();
        let a = add(&db, "a", "", &[("animal", "cat")], 1);
        let b = add(&db, "b", "", &[("meme", "cat")], 2);

        assert_eq!(ids(&db, "animal:cat", 0, SearchMode::Normal, 30), vec![a]);
        assert_eq!(ids(&db, "meme:CAT", 0, SearchMode::Normal, 30), vec![b]);
        assert_eq!(ids(&db, "meme:ca*", 0, SearchMode::Normal, 30), vec![b]);
    }

    #[test]
    fn test_like_wildcards_are_literal() {
        let db = setup();
        let a = add(&db, "a", "100% real", &[], 1);
        let _b = add(&db, "b", "100 real", &[], 2);

        assert_eq!(ids(&db, "100%", 0, SearchMode::Normal, 30), vec![a]);
    }

    #[test]
    fn test_pages_partition_results() {
        let db = setup();
        let mut all = Vec::new();
        for i in 0..7 {
            // Two assets share each timestamp to exercise the id tiebreak.
            all.push(add(&db, &format!("h{i}"), "item", &[], i / 2));
        }

        let mut paged = Vec::new();
        for page in 0..4 {
            paged.extend(ids(&db, "item", page, SearchMode::Normal, 3));
        }

        let mut expected = all.clone();
        expected.sort_by(|a, b| b.cmp(a));
        assert_eq!(paged, expected);
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let db = setup();
        add(&db, "a", "x", &[], 1);
        assert!(ids(&db, "", 5, SearchMode::Normal, 30).is_empty());
        assert!(ids(&db, "", u32::MAX, SearchMode::Normal, 500).is_empty());
    }

    #[test]
    fn test_malformed_statement() {
        let db = setup();
        let err = db
            .with_conn(|conn| search_assets(conn, "\"open", 0, SearchMode::Normal, 30))
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }

    #[test]
    fn test_count_matches() {
        let db = setup();
        add(&db, "a", "cat one", &[], 1);
        add(&db, "b", "cat two", &[], 2);
        add(&db, "c", "dog", &[], 3);

        let n = db
            .with_conn(|conn| count_matches(conn, "cat", SearchMode::Normal))
            .unwrap();
        assert_eq!(n, 2);
    }
}
