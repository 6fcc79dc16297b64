//! Webhook capture and inspection.

use crate::api::{ApiError, AppState};
use crate::webhooks::{Webhook, WebhookStore};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

const DEFAULT_TYPE: &str = "default";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub limit: usize,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            kind: None,
        }
    }
}

/// POST /webhooks
pub async fn capture_default(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> Json<Value> {
    store(&state.webhooks, DEFAULT_TYPE, &headers, query, &body)
}

/// POST /webhooks/:type
pub async fn capture(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    Query(query): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> Json<Value> {
    store(&state.webhooks, &kind, &headers, query, &body)
}

fn store(
    webhooks: &WebhookStore,
    kind: &str,
    headers: &HeaderMap,
    query: BTreeMap<String, String>,
    body: &[u8],
) -> Json<Value> {
    let webhook = Webhook::new(kind, header_map(headers), parse_body(body), query);
    let id = webhook.id.clone();
    tracing::info!(webhook_type = %kind, id = %id, "Webhook received");
    tracing::debug!(payload = %webhook.body, "Webhook payload");
    webhooks.add(webhook);

    Json(json!({
        "success": true,
        "message": "Webhook received",
        "id": id,
    }))
}

/// GET /webhooks?limit=50&type=
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Json<Value> {
    let webhooks = state.webhooks.list(query.limit, query.kind.as_deref());
    Json(json!({
        "webhooks": webhooks,
        "total": state.webhooks.len(),
    }))
}

/// GET /webhooks/:id
pub async fn get_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Webhook>, ApiError> {
    state
        .webhooks
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Webhook not found"))
}

/// DELETE /webhooks
pub async fn clear(State(state): State<Arc<AppState>>) -> Json<Value> {
    let cleared = state.webhooks.clear();
    Json(json!({
        "success": true,
        "cleared": cleared,
    }))
}

fn header_map(headers: &HeaderMap) -> Map<String, Value> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
            )
        })
        .collect()
}

/// JSON when possible, otherwise the raw text. Empty bodies become `{}`.
fn parse_body(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return json!({});
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}
