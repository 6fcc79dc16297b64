//! Natural-language scoring through an external chat endpoint.
//!
//! The LLM is treated as an opaque collaborator: it receives a prompt plus a
//! JSON context and returns free text. Everything that interprets that text
//! is lenient and falls back to neutral values.

use crate::config::ScoringConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

/// Reply used when scoring is turned off.
pub const DISABLED_REPLY: &str = "AI features disabled. Set ENABLE_AI=true in the environment";

/// Errors that can occur while querying the scoring endpoint.
#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("AI service unavailable: {0}")]
    Unavailable(String),

    #[error("AI service returned status {0}")]
    Status(u16),

    #[error("Invalid AI response: {0}")]
    InvalidResponse(String),
}

/// Lead quality assessment for one contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadScore {
    pub contact_id: String,
    pub score: u8,
    pub confidence: u8,
    pub factors: Vec<String>,
    pub recommendation: String,
}

/// Category of a generated insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Prediction,
    Recommendation,
    Anomaly,
    Insight,
}

/// One finding extracted from an LLM reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
    pub confidence: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl Insight {
    fn new(kind: InsightKind, title: &str, description: &str, confidence: u8) -> Self {
        Self {
            kind,
            title: title.to_string(),
            description: description.to_string(),
            confidence,
            data: None,
            timestamp: Utc::now(),
        }
    }
}

/// Win probability used when the reply carries no number.
pub const DEFAULT_WIN_PROBABILITY: u8 = 50;

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the scoring LLM.
pub struct ScoringClient {
    config: ScoringConfig,
    client: reqwest::Client,
}

impl ScoringClient {
    pub fn new(config: ScoringConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Send `prompt` with optional JSON `context` and return the reply text.
    pub async fn query(&self, prompt: &str, context: Option<&Value>) -> Result<String, ScoringError> {
        if !self.config.enabled {
            return Ok(DISABLED_REPLY.to_string());
        }

        let context = context
            .map(serde_json::to_string_pretty)
            .transpose()
            .map_err(|e| ScoringError::InvalidResponse(e.to_string()))?;

        let response = self
            .client
            .post(&self.config.endpoint)
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .json(&json!({
                "message": prompt,
                "context": context,
                "temperature": self.config.temperature,
                "max_tokens": self.config.max_tokens,
            }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "LLM query failed");
                ScoringError::Unavailable(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(ScoringError::Status(response.status().as_u16()));
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| ScoringError::InvalidResponse(e.to_string()))?;

        Ok(reply.response.or(reply.message).unwrap_or_default())
    }

    /// Probe `<endpoint root>/health`. Disabled or unreachable means unhealthy.
    pub async fn health_check(&self) -> bool {
        if !self.config.enabled {
            return false;
        }

        let base = self.config.endpoint.replace("/api/chat", "");
        let url = format!("{}/health", base.trim_end_matches('/'));

        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(self.config.health_timeout_seconds))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Scoring health check failed");
                false
            }
        }
    }

    /// Score a CRM contact record from 0 to 100.
    pub async fn score_contact(&self, contact: &Value) -> Result<LeadScore, ScoringError> {
        let prompt = contact_prompt(contact);
        let reply = self.query(&prompt, Some(contact)).await?;
        Ok(parse_lead_score(contact, &reply))
    }

    /// Free-form question about CRM data.
    pub async fn ask(&self, question: &str, context: &Value) -> Result<String, ScoringError> {
        let prompt = format!(
            "You are an assistant specialized in CRM data analysis.\n\n\
             User Question: {}\n\n\
             Answer from the provided data context. If the data is insufficient, say so.",
            question
        );
        self.query(&prompt, Some(context)).await
    }

    /// Flag unusual patterns in an analytics snapshot.
    pub async fn detect_anomalies(&self, analytics: &Value) -> Result<Vec<Insight>, ScoringError> {
        let prompt = anomaly_prompt(analytics);
        let reply = self.query(&prompt, Some(analytics)).await?;
        Ok(parse_insights(&reply))
    }

    /// Estimated chance (0-100) that an opportunity is won.
    pub async fn predict_win(&self, opportunity: &Value) -> Result<u8, ScoringError> {
        let prompt = opportunity_prompt(opportunity, Utc::now());
        let reply = self.query(&prompt, Some(opportunity)).await?;
        Ok(parse_win_probability(&reply))
    }

    /// Free-text trends and recommendations for a block of CRM data.
    pub async fn generate_insights(&self, data: &Value, data_type: &str) -> Result<String, ScoringError> {
        let summary = serde_json::to_string_pretty(data)
            .map_err(|e| ScoringError::InvalidResponse(e.to_string()))?;
        let prompt = format!(
            "Analyze this CRM {} data and provide actionable insights.\n\n\
             Data Summary:\n{}\n\n\
             Provide key trends, notable patterns, actionable recommendations, \
             and potential risks or opportunities. Be specific.",
            data_type, summary
        );
        self.query(&prompt, Some(data)).await
    }
}

fn percent_of(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total * 100.0
    } else {
        0.0
    }
}

fn anomaly_prompt(analytics: &Value) -> String {
    let requests = &analytics["requests"];
    let number = |v: &Value| v.as_f64().unwrap_or(0.0);
    let total = number(&requests["total"]);

    let mut endpoints: Vec<(&String, &Value)> = analytics["endpoints"]
        .as_object()
        .map(|m| m.iter().collect())
        .unwrap_or_default();
    endpoints.sort_by(|a, b| number(&b.1["count"]).total_cmp(&number(&a.1["count"])));
    let top = endpoints
        .iter()
        .take(5)
        .map(|(key, stat)| {
            format!(
                "- {}: {} calls, {} errors, {}ms avg",
                key,
                number(&stat["count"]),
                number(&stat["errors"]),
                number(&stat["avgDuration"]).round()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Analyze these CRM API usage patterns and identify any anomalies or concerns.\n\n\
         Analytics Data:\n\
         - Total Requests: {}\n\
         - Success Rate: {:.1}%\n\
         - Error Rate: {:.1}%\n\
         - Average Response Time: {}ms\n\n\
         Top Endpoints:\n{}\n\n\
         Identify unusual patterns, potential issues and performance concerns, \
         and recommend specific actions.",
        total,
        percent_of(number(&requests["success"]), total),
        percent_of(number(&requests["errors"]), total),
        number(&requests["avgDuration"]),
        top,
    )
}

/// One insight per reply line that mentions an anomaly or a recommendation.
pub fn parse_insights(reply: &str) -> Vec<Insight> {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let lower = line.to_lowercase();
            if ["anomaly", "unusual", "concern"].iter().any(|k| lower.contains(k)) {
                Some(Insight::new(InsightKind::Anomaly, "Anomaly Detected", line, 75))
            } else if ["recommend", "suggest"].iter().any(|k| lower.contains(k)) {
                Some(Insight::new(InsightKind::Recommendation, "AI Recommendation", line, 80))
            } else {
                None
            }
        })
        .collect()
}

fn opportunity_prompt(opportunity: &Value, now: DateTime<Utc>) -> String {
    let text = |name: &str, default: &str| match opportunity.get(name) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => default.to_string(),
    };
    let age_days = opportunity
        .get("createdAt")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|created| (now - created.with_timezone(&Utc)).num_days().max(0))
        .unwrap_or(0);
    let contact = opportunity
        .pointer("/contact/name")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown");

    format!(
        "Analyze this CRM opportunity and predict the win probability (0-100%).\n\n\
         Opportunity Data:\n\
         - Name: {}\n\
         - Value: ${}\n\
         - Pipeline: {}\n\
         - Stage: {}\n\
         - Contact: {}\n\
         - Age: {} days\n\
         - Last Activity: {}\n\n\
         Provide win probability as a number between 0-100.",
        text("name", "Unknown"),
        text("monetaryValue", "0"),
        text("pipelineName", "Unknown"),
        text("pipelineStage", "Unknown"),
        contact,
        age_days,
        text("lastActivityAt", "Unknown"),
    )
}

/// First integer in `reply`, clamped to 0-100.
pub fn parse_win_probability(reply: &str) -> u8 {
    let digits: String = reply
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return DEFAULT_WIN_PROBABILITY;
    }
    // Overlong digit runs saturate rather than fail.
    digits.parse::<u64>().map_or(100, |n| n.min(100) as u8)
}

fn contact_prompt(contact: &Value) -> String {
    let field = |name: &str| match contact.get(name) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "N/A".to_string(),
    };
    let tags = contact
        .get("tags")
        .and_then(|t| t.as_array())
        .map(|t| {
            t.iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "None".to_string());

    format!(
        "Analyze this CRM contact and provide a lead quality score from 0-100.\n\n\
         Contact Data:\n\
         - Name: {} {}\n\
         - Email: {}\n\
         - Phone: {}\n\
         - Tags: {}\n\
         - Source: {}\n\
         - Date Added: {}\n\n\
         Format as JSON: {{\"score\": number, \"confidence\": number, \
         \"factors\": [\"factor1\"], \"recommendation\": \"string\"}}",
        field("firstName"),
        field("lastName"),
        field("email"),
        field("phone"),
        tags,
        field("source"),
        field("dateAdded"),
    )
}

/// Pull the first JSON object out of `reply`, falling back to a neutral score.
pub fn parse_lead_score(contact: &Value, reply: &str) -> LeadScore {
    let contact_id = contact
        .get("id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let Some(parsed) = extract_json_object(reply) else {
        return LeadScore {
            contact_id,
            score: 50,
            confidence: 30,
            factors: vec!["Unable to analyze".to_string()],
            recommendation: "Manual review needed".to_string(),
        };
    };

    let percent = |name: &str| {
        parsed
            .get(name)
            .and_then(|v| v.as_f64())
            .filter(|v| *v > 0.0)
            .map(|v| v.min(100.0).round() as u8)
            .unwrap_or(50)
    };

    LeadScore {
        contact_id,
        score: percent("score"),
        confidence: percent("confidence"),
        factors: parsed
            .get("factors")
            .and_then(|v| v.as_array())
            .map(|f| f.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
        recommendation: parsed
            .get("recommendation")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("Review contact manually")
            .to_string(),
    }
}

fn extract_json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &text[start..start + offset + 1];
                    return serde_json::from_str::<Value>(candidate)
                        .ok()
                        .filter(Value::is_object);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lead_score_from_wrapped_json() {
        let contact = json!({"id": "c-1"});
        let reply = "Here is my analysis:\n{\"score\": 82, \"confidence\": 70, \
                     \"factors\": [\"recent activity\", \"tagged hot\"], \
                     \"recommendation\": \"Call today\"}\nThanks!";

        let score = parse_lead_score(&contact, reply);
        assert_eq!(score.contact_id, "c-1");
        assert_eq!(score.score, 82);
        assert_eq!(score.confidence, 70);
        assert_eq!(score.factors.len(), 2);
        assert_eq!(score.recommendation, "Call today");
    }

    #[test]
    fn test_parse_lead_score_fallback() {
        let score = parse_lead_score(&json!({"id": "c-2"}), "no structured output");
        assert_eq!(score.score, 50);
        assert_eq!(score.confidence, 30);
        assert_eq!(score.factors, vec!["Unable to analyze"]);
    }

    #[test]
    fn test_parse_lead_score_missing_fields_default() {
        let score = parse_lead_score(&json!({}), "{\"score\": 0}");
        assert_eq!(score.score, 50);
        assert_eq!(score.confidence, 50);
        assert!(score.factors.is_empty());
        assert_eq!(score.recommendation, "Review contact manually");
    }

    #[test]
    fn test_score_is_clamped() {
        let score = parse_lead_score(&json!({}), "{\"score\": 140, \"confidence\": 99.6}");
        assert_eq!(score.score, 100);
        assert_eq!(score.confidence, 100);
    }

    #[test]
    fn test_extract_nested_object() {
        let value = extract_json_object("x {\"a\": {\"b\": 1}} y").unwrap();
        assert_eq!(value["a"]["b"], 1);
        assert!(extract_json_object("{ not json }").is_none());
        assert!(extract_json_object("{ unterminated").is_none());
    }

    #[test]
    fn test_contact_prompt_includes_fields() {
        let prompt = contact_prompt(&json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "tags": ["vip", "webinar"]
        }));
        assert!(prompt.contains("Ada Lovelace"));
        assert!(prompt.contains("vip, webinar"));
        assert!(prompt.contains("Phone: N/A"));
    }

    #[test]
    fn test_parse_insights_classifies_lines() {
        let reply = "Summary of traffic\n\
                     - Unusual spike in 5xx on /api/contacts\n\n\
                     - We recommend caching pipelines\n\
                     - A concern: retries on POST";
        let insights = parse_insights(reply);
        assert_eq!(insights.len(), 3);
        assert_eq!(insights[0].kind, InsightKind::Anomaly);
        assert_eq!(insights[0].confidence, 75);
        assert_eq!(insights[1].kind, InsightKind::Recommendation);
        assert_eq!(insights[1].description, "- We recommend caching pipelines");
        assert_eq!(insights[2].kind, InsightKind::Anomaly);
        assert!(parse_insights(DISABLED_REPLY).is_empty());
    }

    #[test]
    fn test_insight_json_shape() {
        let insight = Insight::new(InsightKind::Recommendation, "AI Recommendation", "x", 80);
        let json = serde_json::to_value(&insight).unwrap();
        assert_eq!(json["type"], "recommendation");
        assert!(json.get("data").is_none());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_parse_win_probability() {
        assert_eq!(parse_win_probability("I estimate 72% chance"), 72);
        assert_eq!(parse_win_probability("about 250"), 100);
        assert_eq!(parse_win_probability("99999999999999999999999"), 100);
        assert_eq!(parse_win_probability("no idea"), DEFAULT_WIN_PROBABILITY);
    }

    #[test]
    fn test_anomaly_prompt_handles_empty_analytics() {
        let prompt = anomaly_prompt(&json!({"requests": {"total": 0}, "endpoints": {}}));
        assert!(prompt.contains("Success Rate: 0.0%"));
        assert!(prompt.contains("Total Requests: 0"));
    }

    #[test]
    fn test_anomaly_prompt_lists_busiest_endpoints() {
        let prompt = anomaly_prompt(&json!({
            "requests": {"total": 4, "success": 3, "errors": 1, "avgDuration": 20},
            "endpoints": {
                "GET /a": {"count": 1, "errors": 0, "avgDuration": 10.0},
                "GET /b": {"count": 3, "errors": 1, "avgDuration": 23.4}
            }
        }));
        assert!(prompt.contains("Error Rate: 25.0%"));
        let b = prompt.find("- GET /b").unwrap();
        let a = prompt.find("- GET /a").unwrap();
        assert!(b < a);
    }

    #[test]
    fn test_opportunity_prompt_age_and_defaults() {
        let now = Utc::now();
        let created = (now - chrono::Duration::days(12)).to_rfc3339();
        let prompt = opportunity_prompt(
            &json!({"name": "Deal", "monetaryValue": 1500, "createdAt": created}),
            now,
        );
        assert!(prompt.contains("Name: Deal"));
        assert!(prompt.contains("Value: $1500"));
        assert!(prompt.contains("Age: 12 days"));
        assert!(prompt.contains("Contact: Unknown"));
    }

    #[tokio::test]
    async fn test_disabled_client_short_circuits() {
        let client = ScoringClient::new(ScoringConfig::default(), reqwest::Client::new());
        assert!(!client.is_enabled());
        assert_eq!(client.query("hi", None).await.unwrap(), DISABLED_REPLY);
        assert!(!client.health_check().await);
    }
}
