//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Fetching (outcomes, retries, latency)
//! - Result sink flushes
//! - Partition scanning progress

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Fetch Metrics
// =============================================================================

/// Final fetch outcomes by client and result.
pub static FETCH_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harvester_fetch_outcomes_total", "Final outcome per dispatched key"),
        &["client", "outcome"], // "found", "not_found", "failed"
    )
    .unwrap()
});

/// Transient failures that were retried, by failure kind.
pub static FETCH_RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harvester_fetch_retries_total", "Fetch attempts that were retried"),
        &["kind"], // "timeout", "connection", "status", "decode"
    )
    .unwrap()
});

/// Duration of a single fetch attempt in seconds.
pub static FETCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "harvester_fetch_duration_seconds",
            "Duration of a single fetch attempt",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0]),
        &["client"],
    )
    .unwrap()
});

// =============================================================================
// Sink Metrics
// =============================================================================

/// Records appended to durable storage.
pub static RECORDS_FLUSHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("harvester_records_flushed_total", "Records written to storage").unwrap()
});

/// Failed flush attempts.
pub static FLUSH_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "harvester_flush_failures_total",
        "Flush attempts that failed and kept the buffer",
    )
    .unwrap()
});

/// Records buffered and not yet flushed.
pub static RECORDS_PENDING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("harvester_records_pending", "Records waiting in the sink buffer").unwrap()
});

// =============================================================================
// Scheduler Metrics
// =============================================================================

/// Partitions marked exhausted.
pub static PARTITIONS_EXHAUSTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "harvester_partitions_exhausted_total",
        "Partitions whose key space was declared exhausted",
    )
    .unwrap()
});

/// Batches dispatched.
pub static BATCHES_DISPATCHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("harvester_batches_total", "Batches dispatched").unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Fetch
        Box::new(FETCH_OUTCOMES.clone()),
        Box::new(FETCH_RETRIES.clone()),
        Box::new(FETCH_DURATION.clone()),
        // Sink
        Box::new(RECORDS_FLUSHED.clone()),
        Box::new(FLUSH_FAILURES.clone()),
        Box::new(RECORDS_PENDING.clone()),
        // Scheduler
        Box::new(PARTITIONS_EXHAUSTED.clone()),
        Box::new(BATCHES_DISPATCHED.clone()),
    ]
}
