//! Error types for upstream CRM calls.

use serde_json::{json, Value};
use thiserror::Error;

/// Failure below the HTTP layer: no usable response reached the client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Request exceeded deadline.
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Network connectivity error (DNS, connection refused, reset, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// The request could not be built or sent at all (bad URL, bad body).
    #[error("{0}")]
    Request(String),
}

impl TransportError {
    /// Whether the request may have reached the network. Only these failures
    /// are worth retrying.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Network(_))
    }
}

/// Normalized failure of a [`CrmClient`](super::CrmClient) call.
///
/// Retries happen inside the client; this is the final outcome.
#[derive(Error, Debug, Clone)]
pub enum CrmError {
    /// The CRM answered with an error status.
    #[error("Upstream error {status}: {}", payload_message(.payload))]
    Upstream { status: u16, payload: Value },

    /// No response was received.
    #[error("Could not reach {base_url}: {source}")]
    Transport {
        base_url: String,
        #[source]
        source: TransportError,
    },

    /// Caller-supplied input was incomplete. No network call was attempted.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// A 2xx response whose body does not match the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Client could not be constructed.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CrmError {
    /// Build an upstream error from a non-success response.
    ///
    /// Normalization order: a JSON body is surfaced as-is; otherwise the
    /// status text becomes `{message}`; otherwise any raw text body; finally a
    /// generic `HTTP <status>` message.
    pub fn from_response(status: u16, status_text: Option<&str>, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        let trimmed = text.trim();

        let payload = match serde_json::from_str::<Value>(trimmed) {
            Ok(value) if !trimmed.is_empty() && !value.is_null() => value,
            _ => match status_text.filter(|s| !s.is_empty()) {
                Some(reason) => json!({ "message": reason }),
                None if !trimmed.is_empty() => json!({ "message": trimmed }),
                None => json!({ "message": format!("HTTP {}", status) }),
            },
        };

        Self::Upstream { status, payload }
    }

    /// The normalized error payload callers receive.
    pub fn payload(&self) -> Value {
        match self {
            Self::Upstream { payload, .. } => payload.clone(),
            Self::Transport { base_url, source } => match source {
                TransportError::Request(message) => json!({ "message": message }),
                _ => json!({ "message": format!("Could not reach {}", base_url) }),
            },
            Self::Validation(message)
            | Self::InvalidResponse(message)
            | Self::Configuration(message) => json!({ "message": message }),
        }
    }

    /// Human-readable message extracted from the payload.
    pub fn message(&self) -> String {
        payload_message(&self.payload())
    }

    /// Upstream status, when the CRM actually responded.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn payload_message(payload: &Value) -> String {
    match payload.get("message") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        _ => match payload.get("error").and_then(|v| v.as_str()) {
            Some(s) => s.to_string(),
            None => payload.to_string(),
        },
    }
}
