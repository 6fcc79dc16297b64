//! Request tracking middleware

use crate::api::{AppState, RecordedError};
use crate::monitor::{ErrorEvent, RequestEvent};
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Correlation header echoed on every response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Generate a new request ID using UUID v4
///
/// # Examples
///
/// ```
/// use insight::logging::generate_request_id;
///
/// let request_id = generate_request_id();
/// assert!(!request_id.is_empty());
/// ```
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Time each request and record it in the monitor on completion.
///
/// Failures that handlers flag with [`RecordedError`] are recorded as error
/// events ahead of the request event.
pub async fn track_requests(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generate_request_id);

    let mut response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if state.config.logging.log_requests {
        tracing::info!(
            request_id = %request_id,
            "{} {} - {} ({}ms)",
            method,
            path,
            status,
            duration_ms
        );
    }

    if let Some(RecordedError(message)) = response.extensions_mut().remove::<RecordedError>() {
        tracing::error!(request_id = %request_id, path = %path, error = %message, "Request failed");
        state.monitor.track_error(ErrorEvent::new(path.clone(), message));
    }

    state
        .monitor
        .track_request(RequestEvent::new(method, path, status, duration_ms));

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}
