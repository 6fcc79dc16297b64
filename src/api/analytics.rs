//! Monitor and quota read endpoints.

use crate::api::AppState;
use crate::monitor::AnalyticsSnapshot;
use crate::ratelimit::RateLimitInfo;
use axum::{extract::State, Json};
use std::sync::Arc;

/// GET /api/analytics
pub async fn snapshot(State(state): State<Arc<AppState>>) -> Json<AnalyticsSnapshot> {
    Json(state.monitor.analytics())
}

/// GET /api/rate-limits
pub async fn rate_limits(State(state): State<Arc<AppState>>) -> Json<RateLimitInfo> {
    Json(state.tracker.info())
}
