//! Monitor configuration

use crate::monitor::aggregator::{RECENT_ERRORS, RECENT_REQUESTS};
use crate::monitor::broadcast::DEFAULT_QUEUE_CAPACITY;
use crate::monitor::log::DEFAULT_RETENTION;
use serde::{Deserialize, Serialize};

/// Retention and live-stream settings for the request monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Events kept per log (requests and errors separately)
    pub retention: usize,
    /// Requests included in each snapshot's recent list
    pub recent_requests: usize,
    /// Errors included in each snapshot's recent list
    pub recent_errors: usize,
    /// Messages buffered per live subscriber before the oldest is dropped
    pub subscriber_queue_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION,
            recent_requests: RECENT_REQUESTS,
            recent_errors: RECENT_ERRORS,
            subscriber_queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}
