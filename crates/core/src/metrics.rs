//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Dispatcher (submissions, running and finished jobs)
//! - Automation pipeline (lock waits, content loading, step failures)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Dispatcher Metrics
// =============================================================================

/// Jobs accepted for execution.
pub static JOBS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("playlister_jobs_submitted_total", "Total jobs accepted").unwrap()
});

/// Jobs that reached a terminal state, by result.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("playlister_jobs_finished_total", "Total jobs finished"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Jobs currently holding a worker slot.
pub static JOBS_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("playlister_jobs_running", "Jobs currently running").unwrap()
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Time spent waiting for a resource lock.
pub static LOCK_WAIT_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "playlister_lock_wait_seconds",
            "Time spent waiting for the resource lock",
        )
        .buckets(vec![0.01, 0.1, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
    )
    .unwrap()
});

/// Reveal iterations per content load.
pub static SCROLL_ITERATIONS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "playlister_scroll_iterations",
            "Reveal iterations performed per content load",
        )
        .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 15.0, 20.0]),
    )
    .unwrap()
});

/// Step failures by step name.
pub static STEP_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("playlister_step_failures_total", "Pipeline step failures"),
        &["step"],
    )
    .unwrap()
});

/// Result recorder write failures.
pub static PERSISTENCE_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "playlister_persistence_failures_total",
        "Failed writes to the result recorder",
    )
    .unwrap()
});

/// Resource keys known to the lock registry.
pub static LOCK_KEYS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("playlister_lock_keys", "Resource keys with a lock").unwrap()
});

/// All core metrics, for registration with a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(JOBS_RUNNING.clone()),
        Box::new(LOCK_WAIT_SECONDS.clone()),
        Box::new(LOCK_KEYS.clone()),
        Box::new(SCROLL_ITERATIONS.clone()),
        Box::new(STEP_FAILURES.clone()),
        Box::new(PERSISTENCE_FAILURES.clone()),
    ]
}
