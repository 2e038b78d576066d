//! Structured logging, tracing spans and metrics.
//!
//! Provides setup for observability using the `tracing` crate with:
//! - Structured logging with JSON output option
//! - Configurable log levels (`RUST_LOG` takes precedence)
//! - Per-operation spans for the library engine

mod metrics;

pub use metrics::{
    init_metrics, record_operation, render_metrics, ASSETS_TOTAL, OPERATION_COUNT,
    OPERATION_LATENCY, TAGS_TOTAL,
};

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

/// Initialize tracing with the given level and output format.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
///
/// # Panics
///
/// Panics if a tracing subscriber has already been initialized in this process.
pub fn init_tracing(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        let json_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true);

        Registry::default().with(env_filter).with(fmt_layer).init();
    }

    tracing::debug!("Tracing initialized: level={}, json={}", level, json);
}

/// Span helpers for library operations.
pub mod spans {
    use tracing::{info_span, Span};

    /// Create a span for one engine operation.
    #[must_use]
    pub fn operation_span(operation: &'static str) -> Span {
        info_span!("library_operation", operation = %operation)
    }
}
