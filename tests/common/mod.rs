//! Shared test utilities for insight integration tests.
//!
//! Builds application state against a mock CRM and drives the router
//! in-process through `tower::Service::call`.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use insight::api::{create_router, AppState};
use insight::config::InsightConfig;
use serde_json::Value;
use std::sync::Arc;
use tower::Service;

/// Location id used by every test configuration.
pub const TEST_LOCATION: &str = "loc-test";

/// Access token used by every test configuration.
pub const TEST_TOKEN: &str = "test-token";

/// Configuration pointing at `base_url` with fast retries and quiet logs.
pub fn test_config(base_url: &str) -> InsightConfig {
    let mut config = InsightConfig::default();
    config.upstream.base_url = base_url.to_string();
    config.upstream.location_id = TEST_LOCATION.to_string();
    config.upstream.initial_backoff_ms = 10;
    config.logging.log_requests = false;
    config
}

/// State with a CRM client (when `token` is set) and no environment lookups.
pub fn make_state(config: InsightConfig, token: Option<&str>) -> Arc<AppState> {
    Arc::new(AppState::with_access_token(
        Arc::new(config),
        token.map(str::to_string),
    ))
}

/// Router and state for a mock CRM at `base_url`.
pub fn make_app(base_url: &str) -> (Router, Arc<AppState>) {
    let state = make_state(test_config(base_url), Some(TEST_TOKEN));
    (create_router(Arc::clone(&state)), state)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Send a request and decode the response body as JSON (`Null` when empty,
/// a JSON string when not JSON).
pub async fn send(app: &mut Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.call(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, headers, body)
}
