//! Prometheus metrics exposition
//!
//! - `whoop_http_requests_total` (counter): labels `status`, `method`
//! - `whoop_http_request_duration_seconds` (histogram): label `status`
//! - `whoop_oauth_events_total` (counter): labels `event`, `outcome`

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

use anyhow::Context;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const REQUEST_DURATION: &str = "whoop_http_request_duration_seconds";

/// 5ms to 30s. Token endpoint calls are bounded by `timeout_secs`.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// In-process counters reported by `/health`.
#[derive(Debug, Clone)]
pub struct ServiceMetrics {
    pub requests_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
    /// Requests currently being handled, reported if the shutdown drain times out.
    pub in_flight: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            errors_total: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

fn builder() -> anyhow::Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), DURATION_BUCKETS)
        .context("failed to set histogram buckets")
}

/// Install the global Prometheus recorder and return a handle for `/metrics`.
///
/// The duration metric gets explicit buckets so it renders as a histogram
/// (`_bucket` lines) rather than a summary.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    builder()?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Record a completed HTTP request with status code and method labels.
pub fn record_request(status: u16, method: &str, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!("whoop_http_requests_total", "status" => status_str.clone(), "method" => method.to_string())
        .increment(1);
    metrics::histogram!(REQUEST_DURATION, "status" => status_str).record(duration_secs);
}

/// Record an OAuth lifecycle event (`authorize`, `callback`, `refresh`, `clear`).
pub fn record_oauth_event(event: &'static str, outcome: &str) {
    metrics::counter!("whoop_oauth_events_total", "event" => event, "outcome" => outcome.to_string())
        .increment(1);
}
