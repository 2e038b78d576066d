//! Data models for storage operations.
//!
//! This module defines the core data structures used for:
//! - Assets and their mutable flags
//! - Namespaced tags
//! - Add and update requests
//! - Search modes and aggregate statistics

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::{Error, Result};

/// Longest accepted summary, in characters.
pub const MAX_SUMMARY_LEN: usize = 512;

/// Longest accepted description, in characters.
pub const MAX_DESC_LEN: usize = 16_384;

/// Longest accepted tag namespace or value, in characters.
pub const MAX_TAG_LEN: usize = 128;

/// Current Unix timestamp in milliseconds.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A stored asset (image, text snippet, ...) with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Database primary key, never reused.
    pub id: i64,

    /// Basename of the stored content file.
    pub content: String,

    /// Opaque caller metadata.
    pub extra_data: Option<String>,

    /// Short indexed text.
    pub summary: String,

    /// Long-form indexed text.
    pub desc: String,

    /// Favorite flag.
    pub fav: bool,

    /// Soft-delete flag.
    pub trash: bool,

    /// Unix milliseconds at creation.
    pub created_at: i64,

    /// Unix milliseconds at last modification.
    pub updated_at: i64,
}

/// A `(namespace, value)` pair classifying assets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub namespace: String,
    pub value: String,
}

impl Tag {
    /// Create a validated tag; both parts are trimmed.
    ///
    /// # Errors
    ///
    /// Returns a validation error if either part is empty or too long, or the
    /// namespace contains `:` or whitespace.
    pub fn new(namespace: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let namespace = namespace.as_ref().trim();
        let value = value.as_ref().trim();

        if namespace.is_empty() {
            return Err(Error::validation("tag namespace cannot be empty"));
        }
        if value.is_empty() {
            return Err(Error::validation(format!(
                "tag value under '{namespace}' cannot be empty"
            )));
        }
        if namespace.contains(':') || namespace.chars().any(char::is_whitespace) {
            return Err(Error::validation(format!(
                "tag namespace '{namespace}' cannot contain ':' or whitespace"
            )));
        }
        if namespace.chars().count() > MAX_TAG_LEN || value.chars().count() > MAX_TAG_LEN {
            return Err(Error::validation(format!(
                "tag parts cannot exceed {MAX_TAG_LEN} characters"
            )));
        }
        if namespace.contains('\0') || value.contains('\0') {
            return Err(Error::validation("tag cannot contain NUL characters"));
        }

        Ok(Self {
            namespace: namespace.to_string(),
            value: value.to_string(),
        })
    }

    /// Re-run validation on a tag that may have been deserialized directly.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Tag::new`].
    pub fn validated(&self) -> Result<Self> {
        Self::new(&self.namespace, &self.value)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.value)
    }
}

impl FromStr for Tag {
    type Err = Error;

    /// Parse `namespace:value`.
    fn from_str(s: &str) -> Result<Self> {
        let (namespace, value) = s
            .split_once(':')
            .ok_or_else(|| Error::validation(format!("tag '{s}' must be namespace:value")))?;
        Self::new(namespace, value)
    }
}

/// Request to ingest one content file.
#[derive(Debug, Clone)]
pub struct NewAsset {
    /// File to copy into the library.
    pub source: PathBuf,
    pub summary: String,
    pub desc: String,
    pub tags: Vec<Tag>,
    /// Delete `source` once the stored copy is durable.
    pub remove_source: bool,
    pub extra_data: Option<String>,
}

impl NewAsset {
    /// Create a request for `source` with empty text and no tags.
    #[must_use]
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            summary: String::new(),
            desc: String::new(),
            tags: Vec::new(),
            remove_source: false,
            extra_data: None,
        }
    }

    /// Set the summary.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    /// Set the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }

    /// Remove the source file after a successful add.
    #[must_use]
    pub const fn removing_source(mut self) -> Self {
        self.remove_source = true;
        self
    }

    /// Attach opaque metadata.
    #[must_use]
    pub fn with_extra_data(mut self, extra_data: impl Into<String>) -> Self {
        self.extra_data = Some(extra_data.into());
        self
    }
}

/// Partial update of an asset.
///
/// `None` leaves a field untouched. `Some(String::new())` clears summary or
/// description; `extra_data: Some(None)` clears the metadata. Supplied tags
/// replace the asset's full tag set.
#[derive(Debug, Clone, Default)]
pub struct AssetUpdate {
    pub summary: Option<String>,
    pub desc: Option<String>,
    pub extra_data: Option<Option<String>>,
    pub tags: Option<Vec<Tag>>,
}

impl AssetUpdate {
    /// An update that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the summary.
    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Replace the description.
    #[must_use]
    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    /// Replace or clear the extra metadata.
    #[must_use]
    pub fn extra_data(mut self, extra_data: Option<String>) -> Self {
        self.extra_data = Some(extra_data);
        self
    }

    /// Replace the tag set.
    #[must_use]
    pub fn tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// True if no field was supplied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.desc.is_none()
            && self.extra_data.is_none()
            && self.tags.is_none()
    }
}

/// Which slice of the library a search looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMode {
    /// Everything not in the trash.
    #[default]
    Normal,
    /// Favorites not in the trash.
    OnlyFav,
    /// Trashed assets only.
    OnlyTrash,
}

impl SearchMode {
    /// SQL predicate over the `asset` table aliased as `a`.
    pub(crate) const fn predicate(self) -> &'static str {
        match self {
            Self::Normal => "a.trash = 0",
            Self::OnlyFav => "a.fav = 1 AND a.trash = 0",
            Self::OnlyTrash => "a.trash = 1",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "Normal",
            Self::OnlyFav => "OnlyFav",
            Self::OnlyTrash => "OnlyTrash",
        };
        f.write_str(name)
    }
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Normal" | "normal" => Ok(Self::Normal),
            "OnlyFav" | "fav" => Ok(Self::OnlyFav),
            "OnlyTrash" | "trash" => Ok(Self::OnlyTrash),
            _ => Err(Error::validation(
                "search mode must be one of Normal, OnlyFav or OnlyTrash",
            )),
        }
    }
}

/// Dictionary entries a mutation created or pruned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDelta {
    pub created: Vec<Tag>,
    pub pruned: Vec<Tag>,
}

impl TagDelta {
    /// Fold another delta into this one.
    pub fn merge(&mut self, other: Self) {
        self.created.extend(other.created);
        self.pruned.extend(other.pruned);
    }

    /// True if the dictionary did not change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.pruned.is_empty()
    }
}

/// Aggregate library counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LibraryStats {
    pub assets: i64,
    pub tags: i64,
    pub favorites: i64,
    pub trashed: i64,
    pub schema_version: i32,
}

/// Check summary and description against length and encoding limits.
///
/// # Errors
///
/// Returns a validation error naming the offending field.
pub fn validate_text(field: &str, text: &str, max_chars: usize) -> Result<()> {
    if text.contains('\0') {
        return Err(Error::validation(format!(
            "{field} cannot contain NUL characters"
        )));
    }
    if text.chars().count() > max_chars {
        return Err(Error::validation(format!(
            "{field} cannot exceed {max_chars} characters"
        )));
    }
    Ok(())
}

/// Validate and deduplicate a tag list, preserving first-seen order.
///
/// # Errors
///
/// Returns a validation error for the first invalid tag.
pub fn normalize_tags(tags: &[Tag]) -> Result<Vec<Tag>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.validated()?;
        if seen.insert(tag.clone()) {
            out.push(tag);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_new_trims() {
        let tag = Tag::new("  animal ", " cat ").unwrap();
        assert_eq!(tag.namespace, "animal");
        assert_eq!(tag.value, "cat");
    }

    #[test]
    fn test_tag_rejects_empty_parts() {
        assert!(Tag::new("", "cat").is_err());
        assert!(Tag::new("animal", "   ").is_err());
    }

    #[test]
    fn test_tag_rejects_bad_namespace() {
        assert!(Tag::new("a:b", "cat").is_err());
        assert!(Tag::new("two words", "cat").is_err());
    }

    #[test]
    fn test_tag_value_may_contain_spaces() {
        let tag = Tag::new("meme", "distracted boyfriend").unwrap();
        assert_eq!(tag.to_string(), "meme:distracted boyfriend");
    }

    #[test]
    fn test_tag_too_long() {
        let long = "x".repeat(MAX_TAG_LEN + 1);
        assert!(Tag::new("ns", &long).is_err());
    }

    #[test]
    fn test_tag_from_str() {
        let tag: Tag = "artist:someone".parse().unwrap();
        assert_eq!(tag, Tag::new("artist", "someone").unwrap());

        // Only the first colon separates namespace from value.
        let tag: Tag = "time:12:30".parse().unwrap();
        assert_eq!(tag.value, "12:30");

        assert!("nocolon".parse::<Tag>().is_err());
    }

    #[test]
    fn test_new_asset_builder() {
        let req = NewAsset::new("/tmp/a.png")
            .with_summary("cat meme")
            .with_desc("a cat")
            .with_tags(vec![Tag::new("animal", "cat").unwrap()])
            .with_extra_data("{}")
            .removing_source();
        assert_eq!(req.summary, "cat meme");
        assert_eq!(req.tags.len(), 1);
        assert!(req.remove_source);
        assert_eq!(req.extra_data.as_deref(), Some("{}"));
    }

    #[test]
    fn test_asset_update_builder() {
        assert!(AssetUpdate::new().is_empty());

        let update = AssetUpdate::new().desc("new").extra_data(None);
        assert!(update.summary.is_none());
        assert_eq!(update.desc.as_deref(), Some("new"));
        assert_eq!(update.extra_data, Some(None));
        assert!(!update.is_empty());
    }

    #[test]
    fn test_search_mode_round_trip_names() {
        for mode in [SearchMode::Normal, SearchMode::OnlyFav, SearchMode::OnlyTrash] {
            assert_eq!(mode.to_string().parse::<SearchMode>().unwrap(), mode);
        }
        assert!("Everything".parse::<SearchMode>().is_err());
    }

    #[test]
    fn test_search_mode_serde() {
        let json = serde_json::to_string(&SearchMode::OnlyFav).unwrap();
        assert_eq!(json, "\"OnlyFav\"");
        let mode: SearchMode = serde_json::from_str("\"OnlyTrash\"").unwrap();
        assert_eq!(mode, SearchMode::OnlyTrash);
    }

    #[test]
    fn test_validate_text() {
        assert!(validate_text("summary", "fine", MAX_SUMMARY_LEN).is_ok());
        assert!(validate_text("summary", &"x".repeat(MAX_SUMMARY_LEN + 1), MAX_SUMMARY_LEN).is_err());
        assert!(validate_text("desc", "a\0b", MAX_DESC_LEN).is_err());
        // Limits count characters, not bytes.
        assert!(validate_text("summary", &"é".repeat(MAX_SUMMARY_LEN), MAX_SUMMARY_LEN).is_ok());
    }

    #[test]
    fn test_normalize_tags_dedups() {
        let tags = vec![
            Tag::new("animal", "cat").unwrap(),
            Tag {
                namespace: " animal".to_string(),
                value: "cat ".to_string(),
            },
            Tag::new("color", "cat").unwrap(),
        ];
        let out = normalize_tags(&tags).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].namespace, "color");
    }

    #[test]
    fn test_asset_serializes_camel_case() {
        let asset = Asset {
            id: 1,
            content: "abc.png".to_string(),
            extra_data: None,
            summary: "s".to_string(),
            desc: "d".to_string(),
            fav: false,
            trash: false,
            created_at: 1,
            updated_at: 2,
        };
        let json = serde_json::to_value(&asset).unwrap();
        assert!(json.get("extraData").is_some());
        assert_eq!(json["updatedAt"], 2);
    }
}
