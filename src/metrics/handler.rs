//! Axum handler for the Prometheus endpoint.

use crate::api::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

/// GET /metrics - Prometheus exposition format.
///
/// Always 200, even before anything has been recorded.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    metrics::gauge!("insight_live_subscribers").set(state.monitor.subscriber_count() as f64);

    let info = state.tracker.info();
    metrics::gauge!("insight_ratelimit_daily_remaining").set(info.daily_remaining as f64);
    metrics::gauge!("insight_ratelimit_burst_remaining").set(info.burst_remaining as f64);

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics_collector.render_metrics(),
    )
}
