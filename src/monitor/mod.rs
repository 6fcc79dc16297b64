//! # API usage monitor
//!
//! In-memory record of inbound request outcomes and application errors, with
//! on-demand analytics and live push to dashboard observers.
//!
//! One [`Monitor`] is built at startup and shared through `AppState`:
//!
//! - [`Monitor::track_request`] / [`Monitor::track_error`] append to bounded
//!   logs and broadcast the event. Both are infallible.
//! - [`Monitor::analytics`] recomputes an [`AnalyticsSnapshot`] from the
//!   retained events on every call.
//! - [`Monitor::subscribe`] returns a [`Subscription`] whose first message is
//!   the current snapshot, followed by live events in publish order.
//!
//! Events are logged in completion order, not arrival order.

pub mod aggregator;
pub mod broadcast;
pub mod log;
pub mod types;

pub use aggregator::{compute_snapshot, RecentLimits};
pub use broadcast::{LiveBroadcaster, SubscriberId, Subscription};
pub use log::EventLog;
pub use types::*;

use crate::config::MonitorConfig;

/// Process-wide request and error monitor.
pub struct Monitor {
    requests: EventLog<RequestEvent>,
    errors: EventLog<ErrorEvent>,
    broadcaster: LiveBroadcaster,
    limits: RecentLimits,
}

impl Monitor {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            requests: EventLog::with_capacity(config.retention),
            errors: EventLog::with_capacity(config.retention),
            broadcaster: LiveBroadcaster::new(config.subscriber_queue_capacity),
            limits: RecentLimits {
                requests: config.recent_requests,
                errors: config.recent_errors,
            },
        }
    }

    /// Record a completed request and push it to live subscribers.
    pub fn track_request(&self, event: RequestEvent) {
        metrics::counter!(
            "insight_requests_total",
            "method" => event.method.clone(),
            "status" => event.status_code.to_string()
        )
        .increment(1);
        metrics::histogram!("insight_request_duration_seconds")
            .record(event.duration_ms as f64 / 1000.0);

        let message = LiveMessage::Request(event.clone());
        self.broadcaster
            .publish_with(|| self.requests.append(event), message);
    }

    /// Record an application error and push it to live subscribers.
    pub fn track_error(&self, event: ErrorEvent) {
        metrics::counter!("insight_errors_total").increment(1);

        let message = LiveMessage::Error(event.clone());
        self.broadcaster
            .publish_with(|| self.errors.append(event), message);
    }

    /// Current analytics over the retention window.
    pub fn analytics(&self) -> AnalyticsSnapshot {
        compute_snapshot(&self.requests.all(), &self.errors.all(), self.limits)
    }

    /// Join the live stream. The first message is always an analytics snapshot.
    pub fn subscribe(&self) -> Subscription {
        self.broadcaster
            .subscribe_with(|| LiveMessage::Analytics(self.analytics()))
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.broadcaster.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }

    pub fn request_log(&self) -> &EventLog<RequestEvent> {
        &self.requests
    }

    pub fn error_log(&self) -> &EventLog<ErrorEvent> {
        &self.errors
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(&MonitorConfig::default())
    }
}
