//! Prometheus metrics definitions.

use std::time::Instant;

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

/// Total assets stored.
pub static ASSETS_TOTAL: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("memevault_assets_total", "Total number of stored assets").unwrap()
});

/// Total distinct tags in the dictionary.
pub static TAGS_TOTAL: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("memevault_tags_total", "Total number of distinct tags").unwrap()
});

/// Operation latency histogram.
pub static OPERATION_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "memevault_operation_duration_seconds",
        "Library operation latency in seconds",
        &["operation"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0]
    )
    .unwrap()
});

/// Operation counter.
pub static OPERATION_COUNT: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "memevault_operations_total",
        "Total number of library operations",
        &["operation", "status"]
    )
    .unwrap()
});

/// Initialize all metrics (call once at startup).
pub fn init_metrics() {
    let _ = &*ASSETS_TOTAL;
    let _ = &*TAGS_TOTAL;
    let _ = &*OPERATION_LATENCY;
    let _ = &*OPERATION_COUNT;

    tracing::debug!("Prometheus metrics initialized");
}

/// Record one finished operation.
pub fn record_operation(operation: &str, started: Instant, ok: bool) {
    OPERATION_LATENCY
        .with_label_values(&[operation])
        .observe(started.elapsed().as_secs_f64());
    OPERATION_COUNT
        .with_label_values(&[operation, if ok { "ok" } else { "error" }])
        .inc();
}

/// Render the default registry in the text exposition format.
#[must_use]
pub fn render_metrics() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
