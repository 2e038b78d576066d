//! Configuration settings and validation.

use crate::{Error, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Number of assets per search page.
pub const PAGE_SIZE: u32 = 30;

/// Default cap on autocomplete results.
pub const AUTOCOMPLETE_LIMIT: usize = 50;

/// Default cap on fuzzy tag matches.
pub const FUZZY_LIMIT: usize = 20;

/// Main configuration for a library instance.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for the `SQLite` database and stored content.
    pub data_dir: PathBuf,

    /// Assets returned per search page.
    pub page_size: u32,

    /// Maximum results for prefix lookups.
    pub autocomplete_limit: usize,

    /// Maximum results for fuzzy tag lookups.
    pub fuzzy_limit: usize,

    /// How long `SQLite` waits on a locked database before giving up.
    pub busy_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            page_size: PAGE_SIZE,
            autocomplete_limit: AUTOCOMPLETE_LIMIT,
            fuzzy_limit: FUZZY_LIMIT,
            busy_timeout_ms: 5_000,
            log_level: "info".to_string(),
        }
    }
}

/// Platform data directory for the library, or `./data` when none is known.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    ProjectDirs::from("", "", "memevault")
        .map_or_else(|| PathBuf::from("./data"), |dirs| dirs.data_dir().to_path_buf())
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration rooted at `data_dir`, everything else default.
    #[must_use]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::config("data_dir cannot be empty"));
        }

        if self.page_size == 0 || self.page_size > 500 {
            return Err(Error::config("page_size must be between 1 and 500"));
        }

        if self.autocomplete_limit == 0 || self.autocomplete_limit > 1000 {
            return Err(Error::config(
                "autocomplete_limit must be between 1 and 1000",
            ));
        }

        if self.fuzzy_limit == 0 || self.fuzzy_limit > 1000 {
            return Err(Error::config("fuzzy_limit must be between 1 and 1000"));
        }

        if self.busy_timeout_ms == 0 {
            return Err(Error::config("busy_timeout_ms cannot be 0"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    /// Get the path to the `SQLite` database file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("library.db")
    }

    /// Get the directory holding stored content files.
    #[must_use]
    pub fn content_dir(&self) -> PathBuf {
        self.data_dir.join("files")
    }
}
