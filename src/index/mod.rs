//! In-memory tag dictionary index for autocomplete.
//!
//! The index mirrors the `tag` table but is kept apart from `SQLite` so that
//! prefix and fuzzy lookups never touch the row store. It is built once from
//! the dictionary when the library opens and then follows every mutation
//! through the [`TagDelta`] each write returns.
//!
//! Prefix matching folds case with Unicode lowercasing. Namespace equality in
//! [`TagIndex::values_with_prefix`] stays exact, since a tag's identity is the
//! exact `(namespace, value)` pair.

mod fuzzy;

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use crate::storage::{Tag, TagDelta};

pub use fuzzy::{osa_distance, score, MatchTier, Score};

fn fold(s: &str) -> String {
    s.to_lowercase()
}

/// Sorted prefix structure over the tag dictionary.
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    /// namespace -> folded value -> original values
    values: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
    /// folded namespace -> original namespaces
    namespaces: BTreeMap<String, BTreeSet<String>>,
    len: usize,
}

impl TagIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index holding `tags`.
    #[must_use]
    pub fn from_tags<'a>(tags: impl IntoIterator<Item = &'a Tag>) -> Self {
        let mut index = Self::new();
        for tag in tags {
            index.insert(tag);
        }
        index
    }

    /// Number of distinct tags.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True if the index holds no tags.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True if the exact tag is present.
    #[must_use]
    pub fn contains(&self, tag: &Tag) -> bool {
        self.values
            .get(&tag.namespace)
            .and_then(|by_value| by_value.get(&fold(&tag.value)))
            .is_some_and(|originals| originals.contains(&tag.value))
    }

    /// Add a tag. Returns false if it was already present.
    pub fn insert(&mut self, tag: &Tag) -> bool {
        let inserted = self
            .values
            .entry(tag.namespace.clone())
            .or_default()
            .entry(fold(&tag.value))
            .or_default()
            .insert(tag.value.clone());

        if inserted {
            self.namespaces
                .entry(fold(&tag.namespace))
                .or_default()
                .insert(tag.namespace.clone());
            self.len += 1;
        }
        inserted
    }

    /// Remove a tag. Returns false if it was not present.
    pub fn remove(&mut self, tag: &Tag) -> bool {
        let Some(by_value) = self.values.get_mut(&tag.namespace) else {
            return false;
        };
        let folded = fold(&tag.value);
        let Some(originals) = by_value.get_mut(&folded) else {
            return false;
        };
        if !originals.remove(&tag.value) {
            return false;
        }

        if originals.is_empty() {
            by_value.remove(&folded);
        }
        if by_value.is_empty() {
            self.values.remove(&tag.namespace);
            let folded_ns = fold(&tag.namespace);
            if let Some(names) = self.namespaces.get_mut(&folded_ns) {
                names.remove(&tag.namespace);
                if names.is_empty() {
                    self.namespaces.remove(&folded_ns);
                }
            }
        }
        self.len -= 1;
        true
    }

    /// Apply the dictionary changes of one committed mutation.
    pub fn apply(&mut self, delta: &TagDelta) {
        for tag in &delta.pruned {
            self.remove(tag);
        }
        for tag in &delta.created {
            self.insert(tag);
        }
    }

    /// All tags in index order: namespace, then folded value, then value.
    pub fn iter(&self) -> impl Iterator<Item = Tag> + '_ {
        self.values.iter().flat_map(|(namespace, by_value)| {
            by_value.values().flatten().map(move |value| Tag {
                namespace: namespace.clone(),
                value: value.clone(),
            })
        })
    }

    /// Distinct values under `namespace` starting with `prefix`
    /// (case-insensitive), at most `limit` of them.
    #[must_use]
    pub fn values_with_prefix(&self, namespace: &str, prefix: &str, limit: usize) -> Vec<String> {
        let Some(by_value) = self.values.get(namespace) else {
            return Vec::new();
        };
        let folded = fold(prefix);

        by_value
            .range::<str, _>((Bound::Included(folded.as_str()), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(folded.as_str()))
            .flat_map(|(_, originals)| originals.iter().cloned())
            .take(limit)
            .collect()
    }

    /// Distinct namespaces starting with `prefix` (case-insensitive), at
    /// most `limit` of them.
    #[must_use]
    pub fn namespaces_with_prefix(&self, prefix: &str, limit: usize) -> Vec<String> {
        let folded = fold(prefix);

        self.namespaces
            .range::<str, _>((Bound::Included(folded.as_str()), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(folded.as_str()))
            .flat_map(|(_, originals)| originals.iter().cloned())
            .take(limit)
            .collect()
    }

    /// Tags whose value approximately matches `query`, across all
    /// namespaces, best first.
    ///
    /// An empty query returns the first `limit` tags in index order.
    #[must_use]
    pub fn fuzzy(&self, query: &str, limit: usize) -> Vec<Tag> {
        let query = fold(query.trim());
        if query.is_empty() {
            return self.iter().take(limit).collect();
        }

        let mut hits: Vec<(Score, &str, &str)> = Vec::new();
        for (namespace, by_value) in &self.values {
            for (folded, originals) in by_value {
                if let Some(score) = fuzzy::score(&query, folded) {
                    hits.extend(
                        originals
                            .iter()
                            .map(|value| (score, namespace.as_str(), value.as_str())),
                    );
                }
            }
        }

        hits.sort_by(|a, b| fuzzy::rank(*a, *b));
        hits.into_iter()
            .take(limit)
            .map(|(_, namespace, value)| Tag {
                namespace: namespace.to_string(),
                value: value.to_string(),
            })
            .collect()
    }
}
