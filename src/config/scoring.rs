//! Scoring (LLM) and webhook capture configuration

use serde::{Deserialize, Serialize};

/// Optional natural-language scoring endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub enabled: bool,
    /// Chat endpoint, e.g. `http://localhost:8000/api/chat`
    pub endpoint: String,
    pub timeout_seconds: u64,
    pub health_timeout_seconds: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:8000/api/chat".to_string(),
            timeout_seconds: 30,
            health_timeout_seconds: 5,
            temperature: 0.7,
            max_tokens: 500,
        }
    }
}

/// Webhook capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Captured payloads kept in memory
    pub capacity: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self { capacity: 500 }
    }
}
