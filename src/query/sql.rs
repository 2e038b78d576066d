//! Translation of parsed statements into parameterized SQL.

use rusqlite::types::Value;

use super::parser::{Clause, Query, Term};
use crate::storage::{SearchMode, ASSET_COLUMNS};

/// SQL text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Escape `LIKE` wildcards so user text matches literally.
fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

const LINKED_TAG: &str =
    "EXISTS (SELECT 1 FROM asset_tag l JOIN tag t ON t.id = l.tag_id WHERE l.asset_id = a.id AND";

fn push_clause(clause: &Clause, conditions: &mut Vec<String>, params: &mut Vec<Value>) {
    let condition = match &clause.term {
        Term::Text(text) => {
            let pattern = format!("%{}%", escape_like(text));
            params.extend(std::iter::repeat(Value::Text(pattern)).take(3));
            format!(
                r"(a.summary LIKE ? ESCAPE '\' OR a.description LIKE ? ESCAPE '\' OR {LINKED_TAG} t.value LIKE ? ESCAPE '\'))"
            )
        }
        Term::Tag(tag) => {
            params.push(Value::Text(tag.namespace.clone()));
            params.push(Value::Text(tag.value.clone()));
            format!("{LINKED_TAG} t.namespace = ? AND t.value = ? COLLATE NOCASE)")
        }
        Term::TagPrefix { namespace, prefix } => {
            params.push(Value::Text(namespace.clone()));
            params.push(Value::Text(format!("{}%", escape_like(prefix))));
            format!(r"{LINKED_TAG} t.namespace = ? AND t.value LIKE ? ESCAPE '\')")
        }
    };

    if clause.negated {
        conditions.push(format!("NOT {condition}"));
    } else {
        conditions.push(condition);
    }
}

fn where_clause(query: &Query, mode: SearchMode, params: &mut Vec<Value>) -> String {
    let mut conditions = vec![mode.predicate().to_string()];
    for clause in &query.clauses {
        push_clause(clause, &mut conditions, params);
    }
    conditions.join(" AND ")
}

/// Build the page query. Rows come back newest modification first, ties
/// broken by id descending, so pages never overlap.
#[must_use]
pub fn build_search_sql(query: &Query, mode: SearchMode, limit: u32, offset: i64) -> SqlQuery {
    let mut params = Vec::new();
    let predicate = where_clause(query, mode, &mut params);

    params.push(Value::Integer(i64::from(limit)));
    params.push(Value::Integer(offset));

    SqlQuery {
        sql: format!(
            "SELECT {ASSET_COLUMNS} FROM asset a WHERE {predicate} \
             ORDER BY a.updated_at DESC, a.id DESC LIMIT ? OFFSET ?"
        ),
        params,
    }
}

/// Build a query counting every match of the statement in this mode.
#[must_use]
pub fn build_count_sql(query: &Query, mode: SearchMode) -> SqlQuery {
    let mut params = Vec::new();
    let predicate = where_clause(query, mode, &mut params);

    SqlQuery {
        sql: format!("SELECT COUNT(*) FROM asset a WHERE {predicate}"),
        params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%_a\\b"), "100\\%\\_a\\\\b");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_empty_query_only_filters_mode() {
        let sql = build_search_sql(&Query::default(), SearchMode::OnlyTrash, 30, 60);
        assert!(sql.sql.contains("WHERE a.trash = 1 ORDER BY"));
        assert_eq!(sql.params, vec![Value::Integer(30), Value::Integer(60)]);
    }

    #[test]
    fn test_text_term_binds_three_patterns() {
        let q = parse("cat").unwrap();
        let sql = build_search_sql(&q, SearchMode::Normal, 30, 0);
        assert_eq!(sql.params.len(), 5);
        assert_eq!(sql.params[0], Value::Text("%cat%".to_string()));
        assert_eq!(sql.sql.matches('?').count(), sql.params.len());
    }

    #[test]
    fn test_negated_tag_term() {
        let q = parse("-animal:dog").unwrap();
        let sql = build_count_sql(&q, SearchMode::Normal);
        assert!(sql.sql.contains("AND NOT EXISTS"));
        assert_eq!(
            sql.params,
            vec![Value::Text("animal".to_string()), Value::Text("dog".to_string())]
        );
    }

    #[test]
    fn test_prefix_term_pattern() {
        let q = parse("animal:ca_*").unwrap();
        let sql = build_count_sql(&q, SearchMode::OnlyFav);
        assert!(sql.sql.starts_with("SELECT COUNT(*) FROM asset a WHERE a.fav = 1 AND a.trash = 0"));
        assert_eq!(sql.params[1], Value::Text("ca\\_%".to_string()));
    }

    #[test]
    fn test_user_text_never_inlined() {
        let q = parse("\"'; DROP TABLE asset; --\"").unwrap();
        let sql = build_search_sql(&q, SearchMode::Normal, 30, 0);
        assert!(!sql.sql.contains("DROP"));
    }
}
