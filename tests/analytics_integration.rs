//! Integration tests for request tracking and the analytics endpoints

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{get, make_app, make_state, send, test_config};
use insight::api::create_router;
use insight::logging::REQUEST_ID_HEADER;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_analytics_empty_on_startup() {
    let (mut app, _state) = make_app("http://127.0.0.1:1");

    let (status, _, body) = send(&mut app, get("/api/analytics")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requests"]["total"], 0);
    assert_eq!(body["requests"]["success"], 0);
    assert_eq!(body["requests"]["errors"], 0);
    assert_eq!(body["requests"]["avgDuration"], 0);
    assert_eq!(body["recentRequests"].as_array().unwrap().len(), 0);
    assert_eq!(body["recentErrors"].as_array().unwrap().len(), 0);
    assert!(body["endpoints"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn test_requests_are_tracked_per_endpoint() {
    let (mut app, _state) = make_app("http://127.0.0.1:1");

    send(&mut app, get("/health")).await;
    send(&mut app, get("/health")).await;
    let (status, _, _) = send(&mut app, get("/webhooks/wh_missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, _, body) = send(&mut app, get("/api/analytics")).await;

    assert_eq!(body["requests"]["total"], 3);
    assert_eq!(body["requests"]["success"], 2);
    assert_eq!(body["requests"]["errors"], 1);
    assert_eq!(body["endpoints"]["GET /health"]["count"], 2);
    assert_eq!(body["endpoints"]["GET /health"]["errors"], 0);
    assert_eq!(body["endpoints"]["GET /webhooks/wh_missing"]["errors"], 1);

    let recent = body["recentRequests"].as_array().unwrap();
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0]["path"], "/webhooks/wh_missing");
    assert_eq!(recent[0]["statusCode"], 404);
    assert_eq!(recent[2]["path"], "/health");
}

#[tokio::test]
async fn test_analytics_request_itself_is_tracked_afterwards() {
    let (mut app, state) = make_app("http://127.0.0.1:1");

    send(&mut app, get("/api/analytics")).await;

    let snapshot = state.monitor.analytics();
    assert_eq!(snapshot.requests.total, 1);
    assert!(snapshot.endpoints.contains_key("GET /api/analytics"));
}

#[tokio::test]
async fn test_retention_caps_tracked_requests() {
    let mut config = test_config("http://127.0.0.1:1");
    config.monitor.retention = 5;
    let state = make_state(config, None);
    let mut app = create_router(Arc::clone(&state));

    for _ in 0..8 {
        send(&mut app, get("/health")).await;
    }

    let snapshot = state.monitor.analytics();
    assert_eq!(snapshot.requests.total, 5);
    assert_eq!(state.monitor.request_log().len(), 5);
}

#[tokio::test]
async fn test_recent_requests_limited_to_twenty() {
    let (mut app, state) = make_app("http://127.0.0.1:1");

    for _ in 0..25 {
        send(&mut app, get("/health")).await;
    }

    let snapshot = state.monitor.analytics();
    assert_eq!(snapshot.requests.total, 25);
    assert_eq!(snapshot.recent_requests.len(), 20);
}

#[tokio::test]
async fn test_request_id_generated_and_echoed() {
    let (mut app, _state) = make_app("http://127.0.0.1:1");

    let (_, headers, _) = send(&mut app, get("/health")).await;
    let generated = headers.get("x-request-id").unwrap().to_str().unwrap();
    assert_eq!(generated.len(), 36);

    let request = axum::http::Request::builder()
        .uri("/health")
        .header("x-request-id", "client-supplied-id")
        .body(axum::body::Body::empty())
        .unwrap();
    let (_, headers, _) = send(&mut app, request).await;
    assert_eq!(headers.get("x-request-id").unwrap(), "client-supplied-id");
}

#[tokio::test]
async fn test_rate_limits_default_values() {
    let (mut app, _state) = make_app("http://127.0.0.1:1");

    let (status, _, body) = send(&mut app, get("/api/rate-limits")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["daily"], 200_000);
    assert_eq!(body["burst"], 100);
    assert_eq!(body["dailyRemaining"], 200_000);
    assert_eq!(body["burstRemaining"], 100);
}

#[tokio::test]
async fn test_rate_limits_available_without_crm_client() {
    let state = make_state(test_config("http://127.0.0.1:1"), None);
    assert!(state.crm.is_none());
    let mut app = create_router(state);

    let (status, _, body) = send(&mut app, get("/api/rate-limits")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["burst"], 100);
}

#[tokio::test]
async fn test_upstream_failure_recorded_as_error_event() {
    let crm = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/contacts/abc"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "message": "Contact id is invalid",
            "statusCode": 400
        })))
        .mount(&crm)
        .await;

    let (mut app, state) = make_app(&crm.uri());

    let (status, _, body) = send(&mut app, get("/api/contacts/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Contact id is invalid");

    let snapshot = state.monitor.analytics();
    assert_eq!(snapshot.recent_errors.len(), 1);
    assert_eq!(snapshot.recent_errors[0].path, "/api/contacts/abc");
    assert_eq!(snapshot.recent_errors[0].message, "Contact id is invalid");
    assert_eq!(snapshot.requests.errors, 1);
}

#[tokio::test]
async fn test_client_errors_not_recorded_as_error_events() {
    let (mut app, state) = make_app("http://127.0.0.1:1");

    let (status, _, _) = send(
        &mut app,
        common::post_json("/api/ai/ask", &serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(state.monitor.analytics().recent_errors.is_empty());
}

#[tokio::test]
async fn test_health_endpoint() {
    let (mut app, _state) = make_app("http://127.0.0.1:1");

    let (status, _, body) = send(&mut app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["ai"], false);
    assert!(body["uptime_seconds"].is_u64());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_metrics_endpoint_prometheus_format() {
    let (mut app, _state) = make_app("http://127.0.0.1:1");

    send(&mut app, get("/health")).await;
    let (status, headers, _) = send(&mut app, get("/metrics")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}

#[tokio::test]
async fn test_timed_out_request_is_tracked() {
    let crm = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/calendars/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&crm)
        .await;

    let mut config = test_config(&crm.uri());
    config.server.request_timeout_seconds = 1;
    let state = make_state(config, Some("token"));
    let mut app = create_router(Arc::clone(&state));

    let (status, headers, _) = send(&mut app, get("/api/calendars")).await;

    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert!(headers.contains_key(REQUEST_ID_HEADER));

    let snapshot = state.monitor.analytics();
    assert_eq!(snapshot.requests.total, 1);
    assert_eq!(snapshot.requests.errors, 1);
    assert_eq!(snapshot.recent_requests[0].path, "/api/calendars");
    assert_eq!(snapshot.recent_requests[0].status_code, 408);
    assert!(snapshot.recent_requests[0].duration_ms >= 1000);
}

#[tokio::test]
async fn test_oversized_body_is_tracked() {
    let (mut app, state) = make_app("http://127.0.0.1:1");
    let size = 11 * 1024 * 1024;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/webhooks")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, size)
        .body(Body::from(vec![b' '; size]))
        .unwrap();
    let (status, _, _) = send(&mut app, request).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(state.webhooks.is_empty());

    let snapshot = state.monitor.analytics();
    assert_eq!(snapshot.requests.total, 1);
    assert_eq!(snapshot.recent_requests[0].status_code, 413);
}
