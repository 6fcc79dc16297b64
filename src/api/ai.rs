//! Scoring endpoints backed by the external LLM.

use crate::api::{
    ApiError, AppState, AskRequest, AskResponse, DetectAnomaliesRequest, InsightsRequest,
    PredictWinRequest, ScoreContactRequest, ScoreContactsRequest, WinPrediction,
    MAX_BATCH_SCORES,
};
use crate::scoring::LeadScore;
use crate::upstream::{CrmClient, CrmError};
use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

/// Confidence reported alongside every win prediction.
const WIN_PREDICTION_CONFIDENCE: u8 = 75;

/// GET /api/ai/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let healthy = state.scoring.health_check().await;
    Json(json!({
        "healthy": healthy,
        "endpoint": state.scoring.endpoint(),
        "enabled": state.scoring.is_enabled(),
    }))
}

/// Fetch a single CRM record, unwrapping `{"<wrapper>": {...}}` envelopes.
async fn fetch_record(crm: &CrmClient, path: &str, wrapper: &str) -> Result<Value, CrmError> {
    let response: Value = crm.get(path).await?;
    Ok(match response.get(wrapper) {
        Some(inner) if inner.is_object() => inner.clone(),
        _ => response,
    })
}

async fn score_one(state: &AppState, contact_id: &str) -> Result<LeadScore, ApiError> {
    let contact = fetch_record(
        state.crm()?,
        &format!("/contacts/{}", contact_id),
        "contact",
    )
    .await?;

    let mut score = state.scoring.score_contact(&contact).await?;
    if score.contact_id.is_empty() {
        score.contact_id = contact_id.to_string();
    }
    Ok(score)
}

/// POST /api/ai/score-contact
pub async fn score_contact(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScoreContactRequest>,
) -> Result<Json<LeadScore>, ApiError> {
    let contact_id = request
        .contact_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("contactId required"))?;

    Ok(Json(score_one(&state, &contact_id).await?))
}

/// POST /api/ai/score-contacts - contacts that fail to score are skipped.
pub async fn score_contacts(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScoreContactsRequest>,
) -> Result<Json<Value>, ApiError> {
    let ids: Vec<String> = match request.contact_ids {
        Some(Value::Array(ids)) => ids
            .iter()
            .filter_map(|id| match id {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .take(MAX_BATCH_SCORES)
            .collect(),
        _ => return Err(ApiError::bad_request("contactIds array required")),
    };
    // Without a client every id would fail the same way.
    state.crm()?;

    let mut scores = Vec::with_capacity(ids.len());
    for contact_id in &ids {
        match score_one(&state, contact_id).await {
            Ok(score) => scores.push(score),
            Err(e) => {
                tracing::warn!(contact_id = %contact_id, error = %e.error, "Failed to score contact");
            }
        }
    }

    Ok(Json(json!({ "scores": scores })))
}

/// POST /api/ai/detect-anomalies
pub async fn detect_anomalies(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DetectAnomaliesRequest>,
) -> Result<Json<Value>, ApiError> {
    let analytics = match request.analytics {
        Some(analytics) if analytics.is_object() => analytics,
        Some(_) => return Err(ApiError::bad_request("analytics must be an object")),
        None => serde_json::to_value(state.monitor.analytics())
            .map_err(|e| ApiError::internal(e.to_string()))?,
    };

    let insights = state.scoring.detect_anomalies(&analytics).await?;
    Ok(Json(json!({ "insights": insights })))
}

/// POST /api/ai/predict-win
pub async fn predict_win(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictWinRequest>,
) -> Result<Json<WinPrediction>, ApiError> {
    let opportunity_id = request
        .opportunity_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("opportunityId required"))?;

    let opportunity = fetch_record(
        state.crm()?,
        &format!("/opportunities/{}", opportunity_id),
        "opportunity",
    )
    .await?;
    let win_probability = state.scoring.predict_win(&opportunity).await?;

    Ok(Json(WinPrediction {
        opportunity_id,
        win_probability,
        confidence: WIN_PREDICTION_CONFIDENCE,
    }))
}

/// POST /api/ai/ask
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let question = request
        .question
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("question required"))?;
    let context = request.context.unwrap_or_else(|| json!({}));

    let answer = state.scoring.ask(&question, &context).await?;
    Ok(Json(AskResponse { question, answer }))
}

/// POST /api/ai/insights
pub async fn insights(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InsightsRequest>,
) -> Result<Json<Value>, ApiError> {
    let (Some(data), Some(data_type)) = (
        request.data.filter(|d| !d.is_null()),
        request.data_type.filter(|t| !t.is_empty()),
    ) else {
        return Err(ApiError::bad_request("data and dataType required"));
    };

    let insights = state.scoring.generate_insights(&data, &data_type).await?;
    Ok(Json(json!({ "insights": insights })))
}
