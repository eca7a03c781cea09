//! Prometheus metrics for the control server.
//!
//! HTTP request metrics live here; harvest metrics are defined in the core
//! crate and registered into the same registry.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tracing::warn;

use crate::state::AppState;

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
            "harvester_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harvester_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "harvester_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Harvest Metrics (collected dynamically)
// =============================================================================

/// Harvest running state (1 = running, 0 = idle).
pub static HARVEST_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "harvester_running",
        "Whether a harvest is running (1) or idle (0)",
    )
    .unwrap()
});

/// Keys dispatched by the current run.
pub static KEYS_DISPATCHED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "harvester_run_keys_dispatched",
        "Keys dispatched by the current or last run",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    let local: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        Box::new(HARVEST_RUNNING.clone()),
        Box::new(KEYS_DISPATCHED.clone()),
    ];

    // Core metrics (fetch, sink, scheduler)
    for metric in local.into_iter().chain(harvester_core::metrics::all_metrics()) {
        if let Err(e) = registry.register(metric) {
            warn!("Failed to register metric: {}", e);
        }
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Update gauges from the orchestrator's status snapshot before encoding.
pub async fn collect_dynamic_metrics(state: &AppState) {
    let status = state.orchestrator().status().await;
    HARVEST_RUNNING.set(if status.running { 1 } else { 0 });
    KEYS_DISPATCHED.set(status.keys_dispatched as i64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("harvester_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        // Prometheus only outputs vectors that have at least one child
        harvester_core::metrics::FETCH_OUTCOMES
            .with_label_values(&["mock", "found"])
            .inc();
        HARVEST_RUNNING.set(0);

        let output = encode_metrics();
        assert!(output.contains("harvester_fetch_outcomes_total"));
        assert!(output.contains("harvester_records_flushed_total"));
        assert!(output.contains("harvester_running"));
    }
}
