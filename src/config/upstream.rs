//! Upstream CRM configuration

use crate::ratelimit::ThrottlePolicy;
use crate::upstream::{CrmClientConfig, RetryPolicy, DEFAULT_API_VERSION, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for the CRM API.
///
/// The access token is never stored in the file; it is read from the
/// environment variable named by `access_token_env`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_version: String,
    pub location_id: String,
    pub access_token_env: String,
    pub request_timeout_seconds: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub throttle: ThrottleConfig,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            location_id: String::new(),
            access_token_env: "GHL_API_KEY".to_string(),
            request_timeout_seconds: 10,
            max_retries: 3,
            initial_backoff_ms: 1000,
            throttle: ThrottleConfig::default(),
        }
    }
}

impl UpstreamConfig {
    /// Access token from the configured environment variable, if set.
    pub fn access_token(&self) -> Option<String> {
        std::env::var(&self.access_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_backoff_ms),
        )
    }

    pub fn client_config(&self, access_token: String) -> CrmClientConfig {
        CrmClientConfig {
            access_token,
            location_id: self.location_id.clone(),
            base_url: Some(self.base_url.clone()),
            api_version: Some(self.api_version.clone()),
            request_timeout: Duration::from_secs(self.request_timeout_seconds),
            retry: self.retry_policy(),
        }
    }
}

/// Throttling thresholds applied before each upstream call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub daily_warning_threshold: u64,
    pub burst_threshold: u64,
    pub burst_cooldown_seconds: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        let policy = ThrottlePolicy::default();
        Self {
            daily_warning_threshold: policy.daily_warning_threshold,
            burst_threshold: policy.burst_threshold,
            burst_cooldown_seconds: policy.burst_cooldown.as_secs(),
        }
    }
}

impl From<&ThrottleConfig> for ThrottlePolicy {
    fn from(config: &ThrottleConfig) -> Self {
        Self {
            daily_warning_threshold: config.daily_warning_threshold,
            burst_threshold: config.burst_threshold,
            burst_cooldown: Duration::from_secs(config.burst_cooldown_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_defaults() {
        let config = UpstreamConfig::default();
        assert_eq!(config.base_url, "https://services.leadconnectorhq.com");
        assert_eq!(config.api_version, "2021-07-28");
        assert_eq!(config.request_timeout_seconds, 10);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(ThrottlePolicy::from(&config.throttle), ThrottlePolicy::default());
    }

    #[test]
    fn test_access_token_from_named_env() {
        let config = UpstreamConfig {
            access_token_env: "INSIGHT_TEST_TOKEN_UPSTREAM".to_string(),
            ..Default::default()
        };
        assert!(config.access_token().is_none());

        std::env::set_var("INSIGHT_TEST_TOKEN_UPSTREAM", "secret");
        assert_eq!(config.access_token().as_deref(), Some("secret"));
        std::env::remove_var("INSIGHT_TEST_TOKEN_UPSTREAM");
    }

    #[test]
    fn test_client_config_carries_settings() {
        let config = UpstreamConfig {
            location_id: "loc-9".to_string(),
            request_timeout_seconds: 4,
            ..Default::default()
        };
        let client = config.client_config("tok".to_string());
        assert_eq!(client.location_id, "loc-9");
        assert_eq!(client.request_timeout, Duration::from_secs(4));
        assert_eq!(client.base_url.as_deref(), Some(DEFAULT_BASE_URL));
    }
}
