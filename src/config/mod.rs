//! Configuration module for the insight hub
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`INSIGHT_*`, plus `GHL_*`, `LLM_ENDPOINT`, `ENABLE_AI`, `PORT`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use insight::config::InsightConfig;
//!
//! let config = InsightConfig::default();
//! assert_eq!(config.server.port, 3000);
//!
//! let toml = r#"
//! [upstream]
//! location_id = "loc-123"
//! "#;
//! let config: InsightConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.upstream.location_id, "loc-123");
//! ```

pub mod error;
pub mod logging;
pub mod monitor;
pub mod scoring;
pub mod server;
pub mod upstream;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use monitor::MonitorConfig;
pub use scoring::{ScoringConfig, WebhookConfig};
pub use server::ServerConfig;
pub use upstream::{ThrottleConfig, UpstreamConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unified configuration for the insight hub server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InsightConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Upstream CRM connection
    pub upstream: UpstreamConfig,
    /// Request monitor retention and live stream
    pub monitor: MonitorConfig,
    /// Optional LLM scoring
    pub scoring: ScoringConfig,
    /// Webhook capture store
    pub webhooks: WebhookConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl InsightConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Invalid values are silently ignored (previous values are kept).
    pub fn with_env_overrides(mut self) -> Self {
        // Server settings; INSIGHT_PORT wins over the generic PORT
        for var in ["PORT", "INSIGHT_PORT"] {
            if let Ok(port) = std::env::var(var) {
                if let Ok(p) = port.parse() {
                    self.server.port = p;
                }
            }
        }
        if let Ok(host) = std::env::var("INSIGHT_HOST") {
            self.server.host = host;
        }
        if let Ok(origins) = std::env::var("ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }

        // Upstream
        if let Ok(url) = std::env::var("GHL_BASE_URL") {
            if !url.trim().is_empty() {
                self.upstream.base_url = url;
            }
        }
        if let Ok(location) = std::env::var("GHL_LOCATION_ID") {
            self.upstream.location_id = location;
        }

        // Scoring
        if let Ok(endpoint) = std::env::var("LLM_ENDPOINT") {
            self.scoring.endpoint = endpoint;
        }
        if let Ok(enabled) = std::env::var("ENABLE_AI") {
            self.scoring.enabled = enabled.to_lowercase() == "true";
        }

        // Logging settings
        if let Ok(level) = std::env::var("INSIGHT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("INSIGHT_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation {
                field: "server.port".to_string(),
                message: "port must be non-zero".to_string(),
            });
        }

        if self.upstream.base_url.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "upstream.base_url".to_string(),
                message: "URL cannot be empty".to_string(),
            });
        }

        if self.upstream.request_timeout_seconds == 0 {
            return Err(ConfigError::Validation {
                field: "upstream.request_timeout_seconds".to_string(),
                message: "timeout must be non-zero".to_string(),
            });
        }

        if self.monitor.retention == 0 {
            return Err(ConfigError::Validation {
                field: "monitor.retention".to_string(),
                message: "retention must be at least 1".to_string(),
            });
        }

        if self.monitor.subscriber_queue_capacity == 0 {
            return Err(ConfigError::Validation {
                field: "monitor.subscriber_queue_capacity".to_string(),
                message: "queue capacity must be at least 1".to_string(),
            });
        }

        if self.scoring.enabled && self.scoring.endpoint.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "scoring.endpoint".to_string(),
                message: "endpoint is required when scoring is enabled".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_insight_config_defaults() {
        let config = InsightConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.monitor.retention, 1000);
        assert_eq!(config.monitor.recent_requests, 20);
        assert_eq!(config.monitor.recent_errors, 10);
        assert_eq!(config.webhooks.capacity, 500);
        assert!(!config.scoring.enabled);
    }

    #[test]
    fn test_config_parse_minimal_toml() {
        let toml = r#"
        [server]
        port = 9000
        "#;

        let config: InsightConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.upstream.max_retries, 3);
    }

    #[test]
    fn test_config_parse_example_file() {
        let toml = include_str!("../../insight.example.toml");
        let config: InsightConfig = toml::from_str(toml).unwrap();
        assert!(config.server.port > 0);
        assert_eq!(config.upstream.throttle.burst_threshold, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_parse_nested_throttle() {
        let toml = r#"
        [upstream.throttle]
        burst_cooldown_seconds = 3
        "#;
        let config: InsightConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.upstream.throttle.burst_cooldown_seconds, 3);
        assert_eq!(config.upstream.throttle.daily_warning_threshold, 100);
    }

    #[test]
    fn test_config_load_from_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[monitor]\nretention = 50").unwrap();

        let config = InsightConfig::load(Some(temp.path())).unwrap();
        assert_eq!(config.monitor.retention, 50);
    }

    #[test]
    fn test_config_missing_file_error() {
        let result = InsightConfig::load(Some(Path::new("/nonexistent/insight.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_config_invalid_toml_error() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[server\nport = ").unwrap();

        let result = InsightConfig::load(Some(temp.path()));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_load_none_returns_defaults() {
        let config = InsightConfig::load(None).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_config_env_override_location() {
        std::env::set_var("GHL_LOCATION_ID", "loc-env");
        let config = InsightConfig::default().with_env_overrides();
        std::env::remove_var("GHL_LOCATION_ID");

        assert_eq!(config.upstream.location_id, "loc-env");
    }

    #[test]
    fn test_config_env_override_scoring() {
        std::env::set_var("ENABLE_AI", "TRUE");
        std::env::set_var("LLM_ENDPOINT", "http://llm.local/api/chat");
        let config = InsightConfig::default().with_env_overrides();
        std::env::remove_var("ENABLE_AI");
        std::env::remove_var("LLM_ENDPOINT");

        assert!(config.scoring.enabled);
        assert_eq!(config.scoring.endpoint, "http://llm.local/api/chat");
    }

    #[test]
    fn test_config_env_override_origins() {
        std::env::set_var("ALLOWED_ORIGINS", "https://a.example, https://b.example,");
        let config = InsightConfig::default().with_env_overrides();
        std::env::remove_var("ALLOWED_ORIGINS");

        assert_eq!(
            config.server.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_config_validation_zero_port() {
        let mut config = InsightConfig::default();
        config.server.port = 0;

        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::Validation { ref field, .. }) if field == "server.port"
        ));
    }

    #[test]
    fn test_config_validation_zero_retention() {
        let mut config = InsightConfig::default();
        config.monitor.retention = 0;

        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::Validation { ref field, .. }) if field == "monitor.retention"
        ));
    }

    #[test]
    fn test_config_validation_empty_base_url() {
        let mut config = InsightConfig::default();
        config.upstream.base_url = " ".to_string();

        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::Validation { ref field, .. }) if field.contains("base_url")
        ));
    }
}
