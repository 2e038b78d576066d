//! The asset library engine.
//!
//! [`Library`] is the single entry point callers use. It owns the `SQLite`
//! store, the content directory and the in-memory tag index, and keeps the
//! three consistent:
//!
//! - every mutation runs in one immediate transaction and is rolled back whole
//!   on failure
//! - mutations are serialized by a writer lock, which is held until the tag
//!   index has absorbed the mutation's dictionary delta
//! - reads go through the connection mutex and always see committed rows
//!
//! Clone is cheap and clones share everything.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::StorageError;
use crate::index::TagIndex;
use crate::observability::{record_operation, spans, ASSETS_TOTAL, TAGS_TOTAL};
use crate::query::{count_matches, search_assets};
use crate::storage::{
    self, all_tags, count_assets, count_flags, count_tags, current_version, delete_asset,
    ensure_asset, find_by_hash, get_asset, init_storage, insert_asset, link_tags,
    normalize_tags, replace_asset_tags, unlink_all, update_asset_fields, validate_text, Asset,
    AssetUpdate, ContentStore, Database, LibraryStats, NewAsset, SearchMode, Tag, TagDelta,
    MAX_DESC_LEN, MAX_SUMMARY_LEN,
};
use crate::{Error, Result};

struct Inner {
    db: Database,
    content: ContentStore,
    index: RwLock<TagIndex>,
    writer: Mutex<()>,
    data_dir: PathBuf,
    config: Config,
}

/// Handle to an open asset library.
#[derive(Clone)]
pub struct Library {
    inner: Arc<Inner>,
}

impl Library {
    /// Open (creating if needed) the library described by `config`.
    ///
    /// Runs pending migrations and builds the tag index from the dictionary.
    ///
    /// # Errors
    ///
    /// Returns a validation error for invalid settings, `StorageUnavailable`
    /// if the data directory or database cannot be opened, and
    /// `IncompatibleSchema` if it was written by a newer build.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let data_dir = fs::create_dir_all(&config.data_dir)
            .and_then(|()| fs::canonicalize(&config.data_dir))
            .map_err(|e| {
                StorageError::Unavailable(format!(
                    "cannot open data directory {}: {e}",
                    config.data_dir.display()
                ))
            })?;

        let db = Database::open_with_timeout(
            config.database_path(),
            Duration::from_millis(config.busy_timeout_ms),
        )?;
        init_storage(&db)?;

        let content = ContentStore::open(config.content_dir()).map_err(|e| {
            StorageError::Unavailable(format!("cannot open content directory: {e}"))
        })?;
        let tags = db.with_conn(all_tags)?;
        let index = TagIndex::from_tags(&tags);

        tracing::info!(
            data_dir = %data_dir.display(),
            tags = index.len(),
            "Library opened"
        );

        let library = Self {
            inner: Arc::new(Inner {
                db,
                content,
                index: RwLock::new(index),
                writer: Mutex::new(()),
                data_dir,
                config,
            }),
        };
        library.refresh_gauges();
        Ok(library)
    }

    /// Settings this library was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Run `f` inside an operation span and record its outcome.
    fn observe<T>(&self, operation: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let span = spans::operation_span(operation);
        let _guard = span.enter();
        let started = Instant::now();

        let result = f();

        record_operation(operation, started, result.is_ok());
        if let Err(e) = &result {
            tracing::debug!(error = %e, "Operation failed");
        }
        result
    }

    fn refresh_gauges(&self) {
        match self.inner.db.with_conn(count_assets) {
            Ok(n) => ASSETS_TOTAL.set(n),
            Err(e) => tracing::warn!(error = %e, "Failed to refresh asset gauge"),
        }
        TAGS_TOTAL.set(i64::try_from(self.inner.index.read().len()).unwrap_or(i64::MAX));
    }

    /// Commit `f` as one transaction and feed its dictionary delta to the
    /// index while still holding the writer lock.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&rusqlite::Connection) -> Result<(T, TagDelta)>,
    ) -> Result<T> {
        let writer = self.inner.writer.lock();
        let (value, delta) = self.inner.db.with_transaction(f)?;
        if !delta.is_empty() {
            self.inner.index.write().apply(&delta);
        }
        drop(writer);
        self.refresh_gauges();
        Ok(value)
    }


    /// Persisted schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn schema_version(&self) -> Result<i32> {
        self.observe("schema_version", || self.inner.db.with_conn(current_version))
    }

    /// Root directory of all persistent state.
    #[must_use]
    pub fn data_directory(&self) -> &Path {
        &self.inner.data_dir
    }

    /// Version of the embedded `SQLite` engine, for diagnostics.
    #[must_use]
    pub fn engine_version(&self) -> &'static str {
        rusqlite::version()
    }

    /// Check that the store answers queries.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if it does not.
    pub fn health_check(&self) -> Result<()> {
        self.inner.db.health_check()
    }


    /// Ingest one content file and create its asset.
    ///
    /// The file is copied into the content directory and flushed before the
    /// row is committed. The source is removed only after the commit; a
    /// failure to remove it is logged, since the asset is already stored.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad text or tags, an I/O error if the
    /// source cannot be read or copied, and `DuplicateContent` if identical
    /// bytes are already stored.
    pub fn add(&self, request: NewAsset) -> Result<i64> {
        self.observe("add", || {
            validate_text("summary", &request.summary, MAX_SUMMARY_LEN)?;
            validate_text("desc", &request.desc, MAX_DESC_LEN)?;
            let tags = normalize_tags(&request.tags)?;

            let (hash, basename) = ContentStore::fingerprint(&request.source)?;

            let writer = self.inner.writer.lock();

            if let Some(existing_id) = self.inner.db.with_conn(|conn| find_by_hash(conn, &hash))? {
                return Err(StorageError::DuplicateContent {
                    content: basename,
                    existing_id,
                }
                .into());
            }

            let stored = self.inner.content.ingest(&request.source, &hash, &basename)?;

            let committed = self.inner.db.with_transaction(|conn| {
                if let Some(existing_id) = find_by_hash(conn, &hash)? {
                    return Err(StorageError::DuplicateContent {
                        content: basename.clone(),
                        existing_id,
                    }
                    .into());
                }
                let id = insert_asset(
                    conn,
                    &stored.basename,
                    &stored.hash,
                    &request.summary,
                    &request.desc,
                    request.extra_data.as_deref(),
                )?;
                let delta = link_tags(conn, id, &tags)?;
                Ok((id, delta))
            });

            let (id, delta) = match committed {
                Ok(done) => done,
                Err(e) => {
                    if stored.created {
                        if let Err(cleanup) = self.inner.content.remove(&stored.basename) {
                            tracing::warn!(error = %cleanup, content = %stored.basename, "Failed to remove orphaned content");
                        }
                    }
                    return Err(e);
                }
            };

            self.inner.index.write().apply(&delta);
            drop(writer);
            self.refresh_gauges();

            tracing::info!(id, content = %stored.basename, tags = tags.len(), "Added asset");

            if request.remove_source && !is_same_file(&request.source, &stored.path) {
                if let Err(e) = fs::remove_file(&request.source) {
                    tracing::warn!(
                        error = %e,
                        source = %request.source.display(),
                        "Asset stored but source could not be removed"
                    );
                }
            }

            Ok(id)
        })
    }

    /// Apply a partial update. Supplied tags replace the whole tag set.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input and `NotFound` if the asset
    /// does not exist.
    pub fn update(&self, id: i64, update: AssetUpdate) -> Result<()> {
        self.observe("update", || {
            if let Some(summary) = &update.summary {
                validate_text("summary", summary, MAX_SUMMARY_LEN)?;
            }
            if let Some(desc) = &update.desc {
                validate_text("desc", desc, MAX_DESC_LEN)?;
            }
            let tags = update.tags.as_deref().map(normalize_tags).transpose()?;

            if update.is_empty() {
                return self.inner.db.with_conn(|conn| ensure_asset(conn, id));
            }

            self.mutate(|conn| {
                update_asset_fields(conn, id, &update)?;
                let delta = match &tags {
                    Some(tags) => replace_asset_tags(conn, id, tags)?,
                    None => TagDelta::default(),
                };
                Ok(((), delta))
            })?;

            tracing::info!(id, "Updated asset");
            Ok(())
        })
    }

    /// Set or clear the favorite flag. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the asset does not exist.
    pub fn set_favorite(&self, id: i64, value: bool) -> Result<()> {
        self.observe("set_favorite", || {
            self.mutate(|conn| {
                storage::set_favorite(conn, id, value)?;
                Ok(((), TagDelta::default()))
            })?;
            tracing::debug!(id, value, "Set favorite");
            Ok(())
        })
    }

    /// Move an asset into or out of the trash. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the asset does not exist.
    pub fn set_trash(&self, id: i64, value: bool) -> Result<()> {
        self.observe("set_trash", || {
            self.mutate(|conn| {
                storage::set_trash(conn, id, value)?;
                Ok(((), TagDelta::default()))
            })?;
            tracing::info!(id, value, "Set trash");
            Ok(())
        })
    }

    /// Permanently delete a trashed asset and its stored content.
    ///
    /// The writer lock covers the file removal as well as the commit.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the asset does not exist and a validation error
    /// if it is not in the trash.
    pub fn purge(&self, id: i64) -> Result<()> {
        self.observe("purge", || {
            let writer = self.inner.writer.lock();
            let (content, delta) = self.inner.db.with_transaction(|conn| {
                let asset = get_asset(conn, id)?;
                if !asset.trash {
                    return Err(Error::validation(format!(
                        "asset {id} must be in the trash before it can be purged"
                    )));
                }
                let delta = unlink_all(conn, id)?;
                delete_asset(conn, id)?;
                Ok((asset.content, delta))
            })?;
            self.inner.index.write().apply(&delta);

            if let Err(e) = self.inner.content.remove(&content) {
                tracing::warn!(error = %e, content = %content, "Purged asset but content file remains");
            }
            drop(writer);
            self.refresh_gauges();

            tracing::info!(id, content = %content, "Purged asset");
            Ok(())
        })
    }

    /// Get an asset by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the asset does not exist.
    pub fn get(&self, id: i64) -> Result<Asset> {
        self.observe("get", || self.inner.db.with_conn(|conn| get_asset(conn, id)))
    }

    /// Count all assets, trashed and favorite ones included.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn count_assets(&self) -> Result<i64> {
        self.observe("count_assets", || self.inner.db.with_conn(count_assets))
    }


    /// Tags linked to an asset, ordered by namespace then value.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the asset does not exist.
    pub fn tags_for_asset(&self, id: i64) -> Result<Vec<Tag>> {
        self.observe("tags_for_asset", || {
            self.inner.db.with_conn(|conn| {
                ensure_asset(conn, id)?;
                storage::tags_for_asset(conn, id)
            })
        })
    }

    /// Autocomplete values under `namespace`.
    #[must_use]
    pub fn values_with_prefix(&self, namespace: &str, prefix: &str) -> Vec<String> {
        let limit = self.inner.config.autocomplete_limit;
        self.inner
            .index
            .read()
            .values_with_prefix(namespace, prefix, limit)
    }

    /// Autocomplete namespaces.
    #[must_use]
    pub fn namespaces_with_prefix(&self, prefix: &str) -> Vec<String> {
        let limit = self.inner.config.autocomplete_limit;
        self.inner.index.read().namespaces_with_prefix(prefix, limit)
    }

    /// Tags whose value approximately matches `value`, best first.
    #[must_use]
    pub fn tags_by_value_fuzzy(&self, value: &str) -> Vec<Tag> {
        let limit = self.inner.config.fuzzy_limit;
        self.inner.index.read().fuzzy(value, limit)
    }

    /// Count distinct tags in the dictionary.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn count_tags(&self) -> Result<i64> {
        self.observe("count_tags", || self.inner.db.with_conn(count_tags))
    }

    /// Rebuild the tag index from the dictionary.
    ///
    /// Writers wait for the rebuild; readers keep using the old index until
    /// the finished one is swapped in.
    ///
    /// # Errors
    ///
    /// Returns an error if the dictionary cannot be read.
    pub fn rebuild_index(&self) -> Result<usize> {
        self.observe("rebuild_index", || {
            let _writer = self.inner.writer.lock();
            let tags = self.inner.db.with_conn(all_tags)?;
            let fresh = TagIndex::from_tags(&tags);
            let len = fresh.len();
            *self.inner.index.write() = fresh;
            tracing::info!(tags = len, "Tag index rebuilt");
            Ok(len)
        })
    }


    /// One page of assets matching `statement` in `mode`.
    ///
    /// Pages are 0-based and hold [`Config::page_size`] assets.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed statement.
    pub fn search(&self, statement: &str, page: u32, mode: SearchMode) -> Result<Vec<Asset>> {
        let page_size = self.inner.config.page_size;
        self.observe("search", || {
            self.inner
                .db
                .with_conn(|conn| search_assets(conn, statement, page, mode, page_size))
        })
    }

    /// Total number of matches of `statement` in `mode`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed statement.
    pub fn count_matches(&self, statement: &str, mode: SearchMode) -> Result<i64> {
        self.observe("count_matches", || {
            self.inner
                .db
                .with_conn(|conn| count_matches(conn, statement, mode))
        })
    }


    /// Absolute path of a stored content file.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file is missing on disk.
    pub fn real_path(&self, basename: &str) -> Result<PathBuf> {
        self.observe("real_path", || self.inner.content.real_path(basename))
    }

    /// Aggregate counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn stats(&self) -> Result<LibraryStats> {
        self.observe("stats", || {
            self.inner.db.with_conn(|conn| {
                let (favorites, trashed) = count_flags(conn)?;
                Ok(LibraryStats {
                    assets: count_assets(conn)?,
                    tags: count_tags(conn)?,
                    favorites,
                    trashed,
                    schema_version: current_version(conn)?,
                })
            })
        })
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("data_dir", &self.inner.data_dir)
            .field("db", &self.inner.db)
            .finish_non_exhaustive()
    }
}
