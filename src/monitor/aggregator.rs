//! Analytics aggregation over the event log.

use super::log::newest_first;
use super::types::{AnalyticsSnapshot, EndpointStat, ErrorEvent, RequestEvent, RequestTotals};
use std::collections::BTreeMap;

/// Number of requests included in `recent_requests`.
pub const RECENT_REQUESTS: usize = 20;
/// Number of errors included in `recent_errors`.
pub const RECENT_ERRORS: usize = 10;

/// How many recent entries a snapshot carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecentLimits {
    pub requests: usize,
    pub errors: usize,
}

impl Default for RecentLimits {
    fn default() -> Self {
        Self {
            requests: RECENT_REQUESTS,
            errors: RECENT_ERRORS,
        }
    }
}

/// Build a snapshot from retained events (both slices in chronological order).
///
/// Per-endpoint averages are computed in a second pass over the accumulated
/// sums, so the result does not depend on insertion order.
pub fn compute_snapshot(
    requests: &[RequestEvent],
    errors: &[ErrorEvent],
    limits: RecentLimits,
) -> AnalyticsSnapshot {
    let total = requests.len();
    let success = requests.iter().filter(|r| !r.is_error()).count();
    let total_duration: u64 = requests.iter().map(|r| r.duration_ms).sum();

    let avg_duration_ms = if total > 0 {
        (total_duration as f64 / total as f64).round() as u64
    } else {
        0
    };

    let mut endpoints: BTreeMap<String, EndpointStat> = BTreeMap::new();
    for request in requests {
        let stat = endpoints.entry(request.endpoint_key()).or_default();
        stat.count += 1;
        stat.total_duration_ms += request.duration_ms;
        if request.is_error() {
            stat.errors += 1;
        }
    }
    for stat in endpoints.values_mut() {
        stat.avg_duration_ms = stat.total_duration_ms as f64 / stat.count as f64;
    }

    AnalyticsSnapshot {
        requests: RequestTotals {
            total,
            success,
            errors: total - success,
            avg_duration_ms,
        },
        recent_requests: newest_first(requests, limits.requests),
        recent_errors: newest_first(errors, limits.errors),
        endpoints,
    }
}
