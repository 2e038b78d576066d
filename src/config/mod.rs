//! Configuration management for memevault.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables
//! - Built-in defaults (platform data directory)

mod settings;

pub use settings::{default_data_dir, Config, AUTOCOMPLETE_LIMIT, FUZZY_LIMIT, PAGE_SIZE};
