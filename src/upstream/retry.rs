//! Retry policy for upstream calls.

use reqwest::Method;
use std::time::Duration;

/// Retry configuration with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `retry` (1-based): 1s, 2s, 4s, ...
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1u32 << exponent)
    }

    /// Whether a response with `status` should be retried.
    ///
    /// 429 is retried for every verb; 5xx only for idempotent verbs.
    pub fn should_retry_status(&self, method: &Method, status: u16) -> bool {
        status == 429 || (status >= 500 && is_idempotent(method))
    }
}

/// GET, HEAD, OPTIONS, PUT and DELETE may be repeated safely.
pub fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE
    )
}
