//! memevault - local asset library
//!
//! Command-line front end over the library engine. Results are printed to
//! stdout as JSON; logs go to stderr.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use memevault::observability::{init_metrics, init_tracing, render_metrics};
use memevault::{AssetUpdate, Config, Library, NewAsset, Result, SearchMode, Tag};
use serde::Serialize;

/// memevault - local asset library with tag search
#[derive(Parser, Debug)]
#[command(name = "memevault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Library data directory
    #[arg(short, long, env = "MEMEVAULT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MEMEVAULT_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "MEMEVAULT_LOG_JSON")]
    log_json: bool,

    /// Assets per search page
    #[arg(long, env = "MEMEVAULT_PAGE_SIZE", default_value_t = memevault::config::PAGE_SIZE)]
    page_size: u32,

    /// Milliseconds to wait on a locked database
    #[arg(long, env = "MEMEVAULT_BUSY_TIMEOUT_MS", default_value_t = 5_000)]
    busy_timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show schema version, data directory and engine version
    Info,

    /// Ingest a file as a new asset
    Add {
        /// File to ingest
        source: PathBuf,
        #[arg(short, long, default_value = "")]
        summary: String,
        #[arg(long, default_value = "")]
        desc: String,
        /// Tags as namespace:value, repeatable
        #[arg(short, long = "tag")]
        tags: Vec<Tag>,
        /// Opaque metadata stored with the asset
        #[arg(long)]
        extra_data: Option<String>,
        /// Delete the source once stored
        #[arg(long)]
        remove_source: bool,
    },

    /// Change an asset's text or tags
    Update {
        id: i64,
        #[arg(short, long)]
        summary: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        /// Replacement tag set, repeatable
        #[arg(short, long = "tag")]
        tags: Vec<Tag>,
        /// Remove every tag
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,
        #[arg(long)]
        extra_data: Option<String>,
        #[arg(long, conflicts_with = "extra_data")]
        clear_extra_data: bool,
    },

    /// Mark or unmark a favorite
    Fav {
        id: i64,
        #[arg(long)]
        off: bool,
    },

    /// Move an asset into or out of the trash
    Trash {
        id: i64,
        #[arg(long)]
        restore: bool,
    },

    /// Permanently delete a trashed asset
    Purge { id: i64 },

    /// Search assets
    Search {
        /// Query statement, e.g. `cat -meme:old artist:al*`
        #[arg(default_value = "")]
        statement: String,
        #[arg(short, long, default_value_t = 0)]
        page: u32,
        /// Normal, OnlyFav or OnlyTrash
        #[arg(short, long, default_value_t = SearchMode::Normal)]
        mode: SearchMode,
        /// Print the match count instead of a page
        #[arg(long)]
        count: bool,
    },

    /// Show one asset
    Get { id: i64 },

    /// List an asset's tags
    Tags { id: i64 },

    /// Autocomplete tag values in a namespace
    Complete { namespace: String, prefix: String },

    /// Autocomplete namespaces
    Namespaces {
        #[arg(default_value = "")]
        prefix: String,
    },

    /// Tags whose value approximately matches
    Fuzzy { value: String },

    /// Print the real path of a stored content file
    Resolve { content: String },

    /// Show library counts
    Stats,

    /// Rebuild the in-memory tag index
    Reindex,

    /// Print Prometheus metrics after running a health check
    Metrics,
}

#[derive(Serialize)]
struct Info<'a> {
    schema_version: i32,
    data_directory: &'a std::path::Path,
    engine_version: &'a str,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| memevault::Error::internal(format!("failed to encode output: {e}")))?;
    println!("{out}");
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config {
        page_size: cli.page_size,
        busy_timeout_ms: cli.busy_timeout_ms,
        log_level: cli.log_level,
        ..Config::default()
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    tracing::debug!(?config, "Configuration loaded");
    let library = Library::open(config)?;

    match cli.command {
        Command::Info => print_json(&Info {
            schema_version: library.schema_version()?,
            data_directory: library.data_directory(),
            engine_version: library.engine_version(),
        }),
        Command::Add {
            source,
            summary,
            desc,
            tags,
            extra_data,
            remove_source,
        } => {
            let mut request = NewAsset::new(source)
                .with_summary(summary)
                .with_desc(desc)
                .with_tags(tags);
            if let Some(extra) = extra_data {
                request = request.with_extra_data(extra);
            }
            if remove_source {
                request = request.removing_source();
            }
            let id = library.add(request)?;
            print_json(&library.get(id)?)
        }
        Command::Update {
            id,
            summary,
            desc,
            tags,
            clear_tags,
            extra_data,
            clear_extra_data,
        } => {
            let mut update = AssetUpdate {
                summary,
                desc,
                ..AssetUpdate::default()
            };
            if clear_tags || !tags.is_empty() {
                update = update.tags(tags);
            }
            if clear_extra_data {
                update = update.extra_data(None);
            } else if extra_data.is_some() {
                update = update.extra_data(extra_data);
            }
            library.update(id, update)?;
            print_json(&library.get(id)?)
        }
        Command::Fav { id, off } => {
            library.set_favorite(id, !off)?;
            print_json(&library.get(id)?)
        }
        Command::Trash { id, restore } => {
            library.set_trash(id, !restore)?;
            print_json(&library.get(id)?)
        }
        Command::Purge { id } => {
            library.purge(id)?;
            print_json(&serde_json::json!({ "purged": id }))
        }
        Command::Search {
            statement,
            page,
            mode,
            count,
        } => {
            if count {
                print_json(&library.count_matches(&statement, mode)?)
            } else {
                print_json(&library.search(&statement, page, mode)?)
            }
        }
        Command::Get { id } => print_json(&library.get(id)?),
        Command::Tags { id } => print_json(&library.tags_for_asset(id)?),
        Command::Complete { namespace, prefix } => {
            print_json(&library.values_with_prefix(&namespace, &prefix))
        }
        Command::Namespaces { prefix } => print_json(&library.namespaces_with_prefix(&prefix)),
        Command::Fuzzy { value } => print_json(&library.tags_by_value_fuzzy(&value)),
        Command::Resolve { content } => print_json(&library.real_path(&content)?),
        Command::Stats => print_json(&library.stats()?),
        Command::Reindex => print_json(&serde_json::json!({ "tags": library.rebuild_index()? })),
        Command::Metrics => {
            library.health_check()?;
            print!("{}", render_metrics());
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json);
    init_metrics();

    tracing::debug!("memevault v{} starting", env!("CARGO_PKG_VERSION"));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, kind = ?e.kind(), "Command failed");
            let _ = print_json(&e);
            ExitCode::FAILURE
        }
    }
}
