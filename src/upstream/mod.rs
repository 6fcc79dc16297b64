//! Rate-limit aware client for the upstream CRM API.
//!
//! Every call follows the same sequence:
//!
//! 1. [`RateLimitTracker::throttle`] (may sleep when the burst budget is low)
//! 2. send with a fixed per-request timeout
//! 3. on 2xx, feed the rate-limit headers back into the tracker
//! 4. on failure, retry within [`RetryPolicy`] or normalize into [`CrmError`]
//!
//! Only the final outcome leaves the client.

pub mod error;
pub mod retry;
pub mod transport;

pub use error::{CrmError, TransportError};
pub use retry::RetryPolicy;
pub use transport::{ReqwestTransport, Transport, UpstreamRequest, UpstreamResponse};

use crate::ratelimit::{RateLimitInfo, RateLimitObservation, RateLimitTracker};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://services.leadconnectorhq.com";
pub const DEFAULT_API_VERSION: &str = "2021-07-28";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings needed to build a [`CrmClient`].
#[derive(Debug, Clone)]
pub struct CrmClientConfig {
    pub access_token: String,
    pub location_id: String,
    pub base_url: Option<String>,
    pub api_version: Option<String>,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl CrmClientConfig {
    pub fn new(access_token: impl Into<String>, location_id: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            location_id: location_id.into(),
            base_url: None,
            api_version: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Client for one CRM location. Build once at startup and share it, so every
/// call sees the same [`RateLimitTracker`].
pub struct CrmClient {
    base_url: String,
    location_id: String,
    default_headers: HeaderMap,
    request_timeout: Duration,
    retry: RetryPolicy,
    tracker: Arc<RateLimitTracker>,
    transport: Arc<dyn Transport>,
}

impl CrmClient {
    /// Create a client using a pooled reqwest transport.
    pub fn new(config: CrmClientConfig, tracker: Arc<RateLimitTracker>) -> Result<Self, CrmError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| CrmError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Self::with_transport(config, tracker, Arc::new(ReqwestTransport::new(http)))
    }

    /// Create a client over a custom transport.
    pub fn with_transport(
        config: CrmClientConfig,
        tracker: Arc<RateLimitTracker>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, CrmError> {
        if config.access_token.trim().is_empty() {
            return Err(CrmError::Validation("access token is required".to_string()));
        }
        if config.location_id.trim().is_empty() {
            return Err(CrmError::Validation("location id is required".to_string()));
        }

        let base_url = config
            .base_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let api_version = config
            .api_version
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        default_headers.insert(
            "version",
            HeaderValue::from_str(&api_version)
                .map_err(|e| CrmError::Validation(format!("invalid api version: {}", e)))?,
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.access_token))
            .map_err(|e| CrmError::Validation(format!("invalid access token: {}", e)))?;
        auth.set_sensitive(true);
        default_headers.insert(AUTHORIZATION, auth);

        Ok(Self {
            base_url,
            location_id: config.location_id,
            default_headers,
            request_timeout: config.request_timeout,
            retry: config.retry,
            tracker,
            transport,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn location_id(&self) -> &str {
        &self.location_id
    }

    pub fn tracker(&self) -> &Arc<RateLimitTracker> {
        &self.tracker
    }

    pub fn rate_limits(&self) -> RateLimitInfo {
        self.tracker.info()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CrmError> {
        self.execute(Method::GET, path, &[], None).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CrmError> {
        self.execute(Method::GET, path, query, None).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, CrmError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = to_json(body)?;
        self.execute(Method::POST, path, &[], Some(body)).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, CrmError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = to_json(body)?;
        self.execute(Method::PUT, path, &[], Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, CrmError> {
        self.execute(Method::DELETE, path, &[], None).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<T, CrmError> {
        self.tracker.throttle().await;

        let mut headers = self.default_headers.clone();
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let request = UpstreamRequest {
            method: method.clone(),
            url: self.url_for(path),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            headers,
            body,
            timeout: self.request_timeout,
        };

        let mut retries = 0u32;
        loop {
            let result = self.transport.send(request.clone()).await;

            let retryable = match &result {
                Ok(response) if response.is_success() => false,
                Ok(response) => self.retry.should_retry_status(&method, response.status),
                Err(e) => e.is_network(),
            };

            if retryable && retries < self.retry.max_retries {
                retries += 1;
                let delay = self.retry.delay_for_retry(retries);
                tracing::warn!(
                    method = %method,
                    path = %path,
                    retry = retries,
                    delay_ms = delay.as_millis() as u64,
                    outcome = %describe(&result),
                    "Retrying upstream request"
                );
                metrics::counter!("insight_upstream_retries_total").increment(1);
                tokio::time::sleep(delay).await;
                continue;
            }

            return match result {
                Ok(response) if response.is_success() => {
                    self.tracker
                        .observe(RateLimitObservation::from_headers(&response.headers));
                    decode(&response.body)
                }
                Ok(response) => {
                    tracing::debug!(
                        method = %method,
                        path = %path,
                        status = response.status,
                        "Upstream returned error status"
                    );
                    Err(CrmError::from_response(
                        response.status,
                        response.status_text.as_deref(),
                        &response.body,
                    ))
                }
                Err(source) => {
                    tracing::warn!(
                        method = %method,
                        path = %path,
                        error = %source,
                        "Upstream request failed"
                    );
                    Err(CrmError::Transport {
                        base_url: self.base_url.clone(),
                        source,
                    })
                }
            };
        }
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> Result<Value, CrmError> {
    serde_json::to_value(body).map_err(|e| CrmError::Validation(format!("unserializable body: {}", e)))
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, CrmError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"null".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| CrmError::InvalidResponse(e.to_string()))
}

fn describe(result: &Result<UpstreamResponse, TransportError>) -> String {
    match result {
        Ok(response) => format!("status {}", response.status),
        Err(e) => e.to_string(),
    }
}
