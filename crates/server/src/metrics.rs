//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the playlister server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Profile and collection totals (collected dynamically)
//! - Job, lock and step metrics from `playlister_core::metrics`

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use tracing::warn;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "playlister_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("playlister_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "playlister_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Recorder Metrics
// =============================================================================

/// Stored profiles by done flag.
pub static PROFILES: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("playlister_profiles", "Stored profiles by completion"),
        &["state"],
    )
    .unwrap()
});

pub static COLLECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("playlister_collections", "Stored collections").unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry.register(Box::new(PROFILES.clone())).unwrap();
    registry.register(Box::new(COLLECTIONS.clone())).unwrap();

    // Core metrics (dispatcher, pipeline, loader)
    for metric in playlister_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the recorder gauges reflect the database.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    match state.recorder().stats() {
        Ok(stats) => {
            PROFILES
                .with_label_values(&["done"])
                .set(stats.done_profiles as i64);
            PROFILES
                .with_label_values(&["pending"])
                .set(stats.pending_profiles as i64);
            COLLECTIONS.set(stats.total_collections as i64);
        }
        Err(e) => warn!("Failed to read recorder stats for metrics: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/api/v1/health", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("# HELP playlister_http_requests_total"));
        assert!(output.contains("# TYPE playlister_http_requests_total counter"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        playlister_core::metrics::JOBS_SUBMITTED.inc();

        let output = encode_metrics();
        assert!(output.contains("playlister_jobs_submitted_total"));
    }
}
