//! # Metrics
//!
//! Prometheus export for the insight hub.
//!
//! ## Metrics Tracked
//!
//! **Counters:**
//! - `insight_requests_total{method, status}` - Inbound requests seen by the monitor
//! - `insight_errors_total` - Application errors recorded by the monitor
//! - `insight_upstream_retries_total` - Retries issued by the CRM client
//! - `insight_broadcast_dropped_total` - Live messages dropped for slow subscribers
//!
//! **Histograms:**
//! - `insight_request_duration_seconds` - Inbound request duration
//!
//! **Gauges:**
//! - `insight_ratelimit_daily_remaining` / `insight_ratelimit_burst_remaining`
//! - `insight_live_subscribers` - Connected WebSocket observers

pub mod handler;

pub use metrics_exporter_prometheus::PrometheusBuilder;

use metrics_exporter_prometheus::PrometheusHandle;
use std::time::Instant;

/// Renders the Prometheus registry and tracks process uptime.
pub struct MetricsCollector {
    start_time: Instant,
    prometheus_handle: PrometheusHandle,
}

impl MetricsCollector {
    pub fn new(start_time: Instant, prometheus_handle: PrometheusHandle) -> Self {
        Self {
            start_time,
            prometheus_handle,
        }
    }

    /// Seconds since the server started.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Render Prometheus metrics in text format.
    pub fn render_metrics(&self) -> String {
        self.prometheus_handle.render()
    }
}

/// Install the global Prometheus recorder.
///
/// Duration buckets are in seconds and cover fast dashboard reads up to
/// retried upstream calls (4 attempts plus backoff).
pub fn setup_metrics() -> Result<PrometheusHandle, Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::Matcher;

    let duration_buckets = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
    ];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("insight_request_duration_seconds".to_string()),
            duration_buckets,
        )?
        .install_recorder()?;

    Ok(handle)
}

/// A handle that works whether or not a global recorder is already installed.
pub fn handle_or_local() -> PrometheusHandle {
    setup_metrics().unwrap_or_else(|e| {
        tracing::debug!("Metrics already initialized, creating new handle: {}", e);
        PrometheusBuilder::new().build_recorder().handle()
    })
}
