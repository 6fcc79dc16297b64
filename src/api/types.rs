//! Request and response types shared by the HTTP handlers.

use crate::ratelimit::RateLimitInfo;
use crate::scoring::ScoringError;
use crate::upstream::CrmError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error response body: `{"error": message, "details": payload?}`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip)]
    record: bool,
}

/// Response extension carrying the message of a failure that should be
/// recorded by the monitor once the request completes.
#[derive(Debug, Clone)]
pub struct RecordedError(pub String);

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            success: None,
            error: message.into(),
            details: None,
            record: status.is_server_error(),
        }
    }

    /// Create a bad request error (400).
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Create a not found error (404).
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Create a bad gateway error (502).
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    /// Create a service unavailable error (503).
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// Create an internal server error (500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark the body with `"success": false`.
    pub fn unsuccessful(mut self) -> Self {
        self.success = Some(false);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Whether the monitor should record this failure as an application error.
    pub fn is_recorded(&self) -> bool {
        self.record
    }
}

impl From<CrmError> for ApiError {
    fn from(err: CrmError) -> Self {
        let status = match &err {
            CrmError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            CrmError::Transport { .. } | CrmError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
            CrmError::Validation(_) => StatusCode::BAD_REQUEST,
            CrmError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let mut api = Self::new(status, err.message()).with_details(err.payload());
        api.record = true;
        api
    }
}

impl From<ScoringError> for ApiError {
    fn from(err: ScoringError) -> Self {
        Self::bad_gateway(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        let recorded = self.record.then(|| RecordedError(self.error.clone()));
        let mut response = (status, Json(self)).into_response();
        if let Some(recorded) = recorded {
            response.extensions_mut().insert(recorded);
        }
        response
    }
}

/// Body of `POST /api/test`.
#[derive(Debug, Clone, Deserialize)]
pub struct TestRequest {
    pub method: String,
    pub endpoint: String,
    #[serde(default)]
    pub body: Option<Value>,
}

/// Reply of `POST /api/test`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResponse {
    pub success: bool,
    pub data: Value,
    pub rate_limit: RateLimitInfo,
}

/// Query of `GET /api/contacts`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContactsQuery {
    pub limit: u32,
    pub skip: u32,
    pub query: Option<String>,
}

impl Default for ContactsQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            skip: 0,
            query: None,
        }
    }
}

/// Query of `GET /api/conversations` and `GET /api/opportunities`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchQuery {
    pub limit: u32,
    pub pipeline_id: Option<String>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            pipeline_id: None,
        }
    }
}

/// Body of `POST /api/ai/score-contact`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoreContactRequest {
    pub contact_id: Option<String>,
}

/// Body of `POST /api/ai/ask`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AskRequest {
    pub question: Option<String>,
    pub context: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub question: String,
    pub answer: String,
}

/// Body of `POST /api/ai/score-contacts`. Ids beyond the first
/// [`MAX_BATCH_SCORES`] are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoreContactsRequest {
    pub contact_ids: Option<Value>,
}

pub const MAX_BATCH_SCORES: usize = 10;

/// Body of `POST /api/ai/detect-anomalies`; the live snapshot is used when
/// `analytics` is absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DetectAnomaliesRequest {
    pub analytics: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PredictWinRequest {
    pub opportunity_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinPrediction {
    pub opportunity_id: String,
    pub win_probability: u8,
    pub confidence: u8,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InsightsRequest {
    pub data: Option<Value>,
    pub data_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::TransportError;
    use serde_json::json;

    #[test]
    fn test_api_error_serialize_400() {
        let error = ApiError::bad_request("contactId required");
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json, json!({"error": "contactId required"}));
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert!(!error.is_recorded());
    }

    #[test]
    fn test_upstream_error_keeps_status_and_payload() {
        let err = CrmError::from_response(
            422,
            None,
            br#"{"message": ["email must be an email"], "statusCode": 422}"#,
        );
        let api = ApiError::from(err);
        assert_eq!(api.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(api.error, "email must be an email");
        assert_eq!(api.details.as_ref().unwrap()["statusCode"], 422);
        assert!(api.is_recorded());
    }

    #[test]
    fn test_transport_error_maps_to_bad_gateway() {
        let err = CrmError::Transport {
            base_url: "https://crm.invalid".to_string(),
            source: TransportError::Network("connection refused".to_string()),
        };
        let api = ApiError::from(err);
        assert_eq!(api.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(api.error, "Could not reach https://crm.invalid");
    }

    #[test]
    fn test_unsuccessful_flag_serialized() {
        let json = serde_json::to_value(ApiError::bad_request("Unsupported method: PATCH").unsuccessful())
            .unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Unsupported method: PATCH");
    }

    #[test]
    fn test_recorded_extension_only_for_server_errors() {
        let response = ApiError::internal("boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.extensions().get::<RecordedError>().unwrap().0, "boom");

        let response = ApiError::not_found("Webhook not found").into_response();
        assert!(response.extensions().get::<RecordedError>().is_none());
    }

    #[test]
    fn test_contacts_query_defaults() {
        let query: ContactsQuery = serde_json::from_value(json!({})).unwrap();
        assert_eq!(query.limit, 20);
        assert_eq!(query.skip, 0);
        assert!(query.query.is_none());
    }

    #[test]
    fn test_search_query_pipeline_id() {
        let query: SearchQuery =
            serde_json::from_value(json!({"limit": 5, "pipelineId": "p1"})).unwrap();
        assert_eq!(query.limit, 5);
        assert_eq!(query.pipeline_id.as_deref(), Some("p1"));
    }
}
