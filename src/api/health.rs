//! Health check endpoint handler.

use crate::api::AppState;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    /// Whether scoring is enabled in configuration.
    pub ai: bool,
}

/// GET /health - Return process liveness.
pub async fn handle(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        uptime_seconds: state.metrics_collector.uptime_seconds(),
        ai: state.scoring.is_enabled(),
    })
}
