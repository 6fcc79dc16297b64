//! CRM proxy handlers.
//!
//! Each handler forwards to the shared [`CrmClient`](crate::upstream::CrmClient)
//! and returns the upstream JSON unchanged. Failures keep the upstream status
//! (502 when the CRM could not be reached) and carry the normalized payload in
//! `details`.

use crate::api::{ApiError, AppState, ContactsQuery, SearchQuery, TestRequest, TestResponse};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

type ApiResult = Result<Json<Value>, ApiError>;

fn as_pairs<'a>(params: &'a [(&'a str, String)]) -> Vec<(&'a str, &'a str)> {
    params.iter().map(|(k, v)| (*k, v.as_str())).collect()
}

/// GET /api/contacts
pub async fn list_contacts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContactsQuery>,
) -> ApiResult {
    let crm = state.crm()?;
    let mut params = vec![
        ("locationId", crm.location_id().to_string()),
        ("limit", query.limit.to_string()),
        ("skip", query.skip.to_string()),
    ];
    if let Some(q) = query.query.filter(|q| !q.is_empty()) {
        params.push(("query", q));
    }

    let data = crm.get_with_query("/contacts/", &as_pairs(&params)).await?;
    Ok(Json(data))
}

/// GET /api/contacts/:id
pub async fn get_contact(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    let data = state.crm()?.get(&format!("/contacts/{}", id)).await?;
    Ok(Json(data))
}

/// POST /api/contacts - the configured location id is always applied.
pub async fn create_contact(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult {
    let crm = state.crm()?;
    let Value::Object(mut contact) = body else {
        return Err(ApiError::bad_request("contact body must be a JSON object"));
    };
    contact.insert("locationId".to_string(), json!(crm.location_id()));

    let data = crm.post("/contacts/", &contact).await?;
    Ok(Json(data))
}

/// GET /api/conversations
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> ApiResult {
    let crm = state.crm()?;
    let params = [
        ("locationId", crm.location_id().to_string()),
        ("limit", query.limit.to_string()),
    ];

    let data = crm
        .get_with_query("/conversations/search", &as_pairs(&params))
        .await?;
    Ok(Json(data))
}

/// GET /api/conversations/:id
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult {
    let data = state.crm()?.get(&format!("/conversations/{}", id)).await?;
    Ok(Json(data))
}

/// POST /api/conversations/:id/messages
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult {
    let data = state
        .crm()?
        .post(&format!("/conversations/{}/messages", id), &body)
        .await?;
    Ok(Json(data))
}

/// GET /api/opportunities - this endpoint expects `location_id`, not `locationId`.
pub async fn list_opportunities(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> ApiResult {
    let crm = state.crm()?;
    let mut params = vec![
        ("location_id", crm.location_id().to_string()),
        ("limit", query.limit.to_string()),
    ];
    if let Some(pipeline) = query.pipeline_id.filter(|p| !p.is_empty()) {
        params.push(("pipelineId", pipeline));
    }

    let data = crm
        .get_with_query("/opportunities/search", &as_pairs(&params))
        .await?;
    Ok(Json(data))
}

/// GET /api/opportunities/pipelines
pub async fn list_pipelines(State(state): State<Arc<AppState>>) -> ApiResult {
    let crm = state.crm()?;
    let data = crm
        .get_with_query(
            "/opportunities/pipelines",
            &[("locationId", crm.location_id())],
        )
        .await?;
    Ok(Json(data))
}

/// GET /api/calendars
pub async fn list_calendars(State(state): State<Arc<AppState>>) -> ApiResult {
    let crm = state.crm()?;
    let data = crm
        .get_with_query("/calendars/", &[("locationId", crm.location_id())])
        .await?;
    Ok(Json(data))
}

/// POST /api/test - arbitrary CRM call for debugging.
pub async fn test_request(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TestRequest>,
) -> Result<Json<TestResponse>, ApiError> {
    let crm = state.crm().map_err(ApiError::unsuccessful)?;
    let body = request.body.unwrap_or_else(|| json!({}));

    let result: Result<Value, _> = match request.method.to_uppercase().as_str() {
        "GET" => crm.get(&request.endpoint).await,
        "POST" => crm.post(&request.endpoint, &body).await,
        "PUT" => crm.put(&request.endpoint, &body).await,
        "DELETE" => crm.delete(&request.endpoint).await,
        other => {
            return Err(
                ApiError::bad_request(format!("Unsupported method: {}", other)).unsuccessful(),
            )
        }
    };

    let data = result.map_err(|e| ApiError::from(e).unsuccessful())?;
    Ok(Json(TestResponse {
        success: true,
        data,
        rate_limit: crm.rate_limits(),
    }))
}
