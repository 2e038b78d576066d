//! memevault library
//!
//! Local asset library engine: stores content files with searchable
//! metadata, organizes them with namespaced tags, and answers paginated
//! searches and tag autocomplete.
//!
//! ```no_run
//! use memevault::{Config, Library, NewAsset, SearchMode, Tag};
//!
//! # fn main() -> memevault::Result<()> {
//! let library = Library::open(Config::with_data_dir("./data"))?;
//! let id = library.add(
//!     NewAsset::new("cat.png")
//!         .with_summary("surprised cat")
//!         .with_tags(vec![Tag::new("animal", "cat")?]),
//! )?;
//! let hits = library.search("animal:cat", 0, SearchMode::Normal)?;
//! assert_eq!(hits[0].id, id);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod index;
pub mod library;
pub mod observability;
pub mod query;
pub mod storage;

pub use config::Config;
pub use error::{Error, ErrorKind, Result, StorageError};
pub use library::Library;
pub use storage::{Asset, AssetUpdate, LibraryStats, NewAsset, SearchMode, Tag};
