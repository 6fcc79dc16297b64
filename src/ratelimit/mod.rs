//! Upstream quota tracking.
//!
//! The CRM reports two quota dimensions on every successful response:
//!
//! - a daily budget (`x-ratelimit-daily-limit` / `x-ratelimit-daily-remaining`)
//! - a short burst window (`x-ratelimit-limit` / `x-ratelimit-remaining`)
//!
//! [`RateLimitTracker`] keeps the last observed values and applies the
//! throttling policy before each outbound call. Values are only as fresh as
//! the last response; concurrent in-flight requests may report them out of
//! order, so a late response can raise `remaining` again.

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

pub const HEADER_DAILY_LIMIT: &str = "x-ratelimit-daily-limit";
pub const HEADER_DAILY_REMAINING: &str = "x-ratelimit-daily-remaining";
pub const HEADER_BURST_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_BURST_REMAINING: &str = "x-ratelimit-remaining";

/// Daily quota assumed before the first response is seen.
pub const DEFAULT_DAILY_LIMIT: u64 = 200_000;
/// Burst quota assumed before the first response is seen.
pub const DEFAULT_BURST_LIMIT: u64 = 100;

/// Last known quota state for one upstream target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    pub daily_limit: u64,
    pub daily_remaining: u64,
    pub burst_limit: u64,
    pub burst_remaining: u64,
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self {
            daily_limit: DEFAULT_DAILY_LIMIT,
            daily_remaining: DEFAULT_DAILY_LIMIT,
            burst_limit: DEFAULT_BURST_LIMIT,
            burst_remaining: DEFAULT_BURST_LIMIT,
        }
    }
}

/// Quota summary returned by `GET /api/rate-limits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    pub daily: u64,
    pub burst: u64,
    pub daily_remaining: u64,
    pub burst_remaining: u64,
}

impl From<RateLimitState> for RateLimitInfo {
    fn from(state: RateLimitState) -> Self {
        Self {
            daily: state.daily_limit,
            burst: state.burst_limit,
            daily_remaining: state.daily_remaining,
            burst_remaining: state.burst_remaining,
        }
    }
}

/// Header-derived values from a single response. `None` means "not reported".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitObservation {
    pub daily_limit: Option<u64>,
    pub daily_remaining: Option<u64>,
    pub burst_limit: Option<u64>,
    pub burst_remaining: Option<u64>,
}

impl RateLimitObservation {
    /// Extract the four rate-limit headers. Missing or unparsable values are `None`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            daily_limit: header_u64(headers, HEADER_DAILY_LIMIT),
            daily_remaining: header_u64(headers, HEADER_DAILY_REMAINING),
            burst_limit: header_u64(headers, HEADER_BURST_LIMIT),
            burst_remaining: header_u64(headers, HEADER_BURST_REMAINING),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Thresholds applied by [`RateLimitTracker::throttle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    /// Warn when the daily budget drops below this.
    pub daily_warning_threshold: u64,
    /// Pause callers when the burst budget drops below this.
    pub burst_threshold: u64,
    /// How long a paused caller waits before proceeding.
    pub burst_cooldown: Duration,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            daily_warning_threshold: 100,
            burst_threshold: 10,
            burst_cooldown: Duration::from_secs(10),
        }
    }
}

/// What [`RateLimitTracker::throttle`] did for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleOutcome {
    Proceed,
    Warned,
    Cooled(Duration),
}

/// Shared quota state for one upstream target.
///
/// One tracker must be shared by every call to the same target, otherwise the
/// observed quota fragments across instances.
pub struct RateLimitTracker {
    state: Mutex<RateLimitState>,
    policy: ThrottlePolicy,
}

impl RateLimitTracker {
    pub fn new(policy: ThrottlePolicy) -> Self {
        Self::with_state(RateLimitState::default(), policy)
    }

    pub fn with_state(state: RateLimitState, policy: ThrottlePolicy) -> Self {
        Self {
            state: Mutex::new(state),
            policy,
        }
    }

    pub fn policy(&self) -> ThrottlePolicy {
        self.policy
    }

    /// Current quota state.
    pub fn snapshot(&self) -> RateLimitState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn info(&self) -> RateLimitInfo {
        self.snapshot().into()
    }

    /// Merge values from a response. Absent fields keep their previous value.
    pub fn observe(&self, observation: RateLimitObservation) {
        let updated = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(v) = observation.daily_limit {
                state.daily_limit = v;
            }
            if let Some(v) = observation.burst_limit {
                state.burst_limit = v;
            }
            // Only reported remaining values are clamped to their limit.
            if let Some(v) = observation.daily_remaining {
                state.daily_remaining = v.min(state.daily_limit);
            }
            if let Some(v) = observation.burst_remaining {
                state.burst_remaining = v.min(state.burst_limit);
            }
            *state
        };

        metrics::gauge!("insight_ratelimit_daily_remaining").set(updated.daily_remaining as f64);
        metrics::gauge!("insight_ratelimit_burst_remaining").set(updated.burst_remaining as f64);
    }

    /// Apply the throttling policy ahead of an outbound call.
    ///
    /// A low daily budget only logs. A low burst budget suspends the caller
    /// for the configured cooldown; every waiting caller sleeps on its own.
    pub async fn throttle(&self) -> ThrottleOutcome {
        let state = self.snapshot();
        let mut outcome = ThrottleOutcome::Proceed;

        if state.daily_remaining < self.policy.daily_warning_threshold {
            tracing::warn!(
                daily_remaining = state.daily_remaining,
                daily_limit = state.daily_limit,
                "Low daily rate limit"
            );
            outcome = ThrottleOutcome::Warned;
        }

        if state.burst_remaining < self.policy.burst_threshold {
            let cooldown = self.policy.burst_cooldown;
            tracing::warn!(
                burst_remaining = state.burst_remaining,
                cooldown_ms = cooldown.as_millis() as u64,
                "Burst rate limit low, waiting before next call"
            );
            tokio::time::sleep(cooldown).await;
            outcome = ThrottleOutcome::Cooled(cooldown);
        }

        outcome
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new(ThrottlePolicy::default())
    }
}
