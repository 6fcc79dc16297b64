//! Type definitions for monitor events and analytics snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A completed inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEvent {
    /// HTTP method, upper case
    pub method: String,
    /// Request path without query string
    pub path: String,
    /// Response status code
    pub status_code: u16,
    /// Time from arrival to response completion
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl RequestEvent {
    pub fn new(method: impl Into<String>, path: impl Into<String>, status_code: u16, duration_ms: u64) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            status_code,
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    /// Grouping key used for per-endpoint statistics, e.g. `GET /api/contacts`.
    pub fn endpoint_key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    pub fn is_error(&self) -> bool {
        self.status_code >= 400
    }
}

/// An application error raised while handling a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub path: String,
    #[serde(rename = "error")]
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorEvent {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Request totals across the retention window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTotals {
    pub total: usize,
    pub success: usize,
    pub errors: usize,
    /// Mean duration rounded to the nearest millisecond; 0 when empty
    #[serde(rename = "avgDuration")]
    pub avg_duration_ms: u64,
}

/// Statistics for one `METHOD path` pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointStat {
    pub count: usize,
    #[serde(rename = "totalDuration")]
    pub total_duration_ms: u64,
    pub errors: usize,
    #[serde(rename = "avgDuration")]
    pub avg_duration_ms: f64,
}

/// Point-in-time view over the event log.
///
/// Rebuilt on every request; two snapshots are never the same object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub requests: RequestTotals,
    /// Newest first
    pub recent_requests: Vec<RequestEvent>,
    /// Newest first
    pub recent_errors: Vec<ErrorEvent>,
    pub endpoints: BTreeMap<String, EndpointStat>,
}

/// Message pushed to live subscribers, serialized as `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LiveMessage {
    /// Full snapshot, sent once when a subscriber joins
    Analytics(AnalyticsSnapshot),
    /// A request completed
    Request(RequestEvent),
    /// An application error was recorded
    Error(ErrorEvent),
}

impl LiveMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Analytics(_) => "analytics",
            Self::Request(_) => "request",
            Self::Error(_) => "error",
        }
    }
}
