//! # HTTP API
//!
//! Dashboard and debugging endpoints in front of the CRM.
//!
//! ## Endpoints
//!
//! - `GET /health` - Liveness, uptime and whether scoring is enabled
//! - `GET /api/analytics` - [`AnalyticsSnapshot`](crate::monitor::AnalyticsSnapshot) over the retention window
//! - `GET /api/rate-limits` - Last observed CRM quota
//! - `GET /ws` - Live stream: analytics snapshot first, then request/error events
//! - `/api/contacts`, `/api/conversations`, `/api/opportunities`, `/api/calendars` - CRM proxy
//! - `POST /api/test` - Issue an arbitrary CRM call and report the quota afterwards
//! - `/api/ai/*` - Lead scoring, anomaly detection, win prediction and free-form questions
//! - `/webhooks` - Capture and inspect webhook deliveries
//! - `GET /metrics` - Prometheus exposition
//!
//! Every request passes through [`track_requests`](crate::logging::track_requests),
//! which records it in the [`Monitor`].
//!
//! ## Example
//!
//! ```no_run
//! use insight::api::{create_router, AppState};
//! use insight::config::InsightConfig;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(InsightConfig::default());
//! let state = Arc::new(AppState::new(config));
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

mod ai;
mod analytics;
mod crm;
mod health;
mod live;
pub mod types;
mod webhooks;

pub use types::*;

use crate::config::InsightConfig;
use crate::metrics::MetricsCollector;
use crate::monitor::Monitor;
use crate::ratelimit::{RateLimitTracker, ThrottlePolicy};
use crate::scoring::ScoringClient;
use crate::upstream::CrmClient;
use crate::webhooks::WebhookStore;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (10 MB).
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: Arc<InsightConfig>,
    pub monitor: Arc<Monitor>,
    /// Shared with `crm`, so the quota is visible even without a client.
    pub tracker: Arc<RateLimitTracker>,
    /// `None` when no access token or location is configured.
    pub crm: Option<Arc<CrmClient>>,
    pub webhooks: Arc<WebhookStore>,
    pub scoring: Arc<ScoringClient>,
    /// Server startup time for uptime tracking
    pub start_time: Instant,
    pub metrics_collector: Arc<MetricsCollector>,
}

impl AppState {
    /// Build state, reading the CRM access token from the environment.
    pub fn new(config: Arc<InsightConfig>) -> Self {
        let token = config.upstream.access_token();
        Self::with_access_token(config, token)
    }

    /// Build state with an explicit access token.
    pub fn with_access_token(config: Arc<InsightConfig>, access_token: Option<String>) -> Self {
        let tracker = Arc::new(RateLimitTracker::new(ThrottlePolicy::from(
            &config.upstream.throttle,
        )));

        let crm = match access_token {
            Some(token) => {
                match CrmClient::new(config.upstream.client_config(token), Arc::clone(&tracker)) {
                    Ok(client) => Some(Arc::new(client)),
                    Err(e) => {
                        tracing::warn!(error = %e, "CRM client unavailable; proxy routes disabled");
                        None
                    }
                }
            }
            None => {
                tracing::warn!(
                    env = %config.upstream.access_token_env,
                    "No CRM access token set; proxy routes disabled"
                );
                None
            }
        };

        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        let start_time = Instant::now();

        Self {
            monitor: Arc::new(Monitor::new(&config.monitor)),
            tracker,
            crm,
            webhooks: Arc::new(WebhookStore::new(config.webhooks.capacity)),
            scoring: Arc::new(ScoringClient::new(config.scoring.clone(), http_client)),
            start_time,
            metrics_collector: Arc::new(MetricsCollector::new(
                start_time,
                crate::metrics::handle_or_local(),
            )),
            config,
        }
    }

    /// The CRM client, or a 503 when none is configured.
    pub fn crm(&self) -> Result<&Arc<CrmClient>, ApiError> {
        self.crm.as_ref().ok_or_else(|| {
            ApiError::service_unavailable(format!(
                "CRM client not configured: set {} and upstream.location_id",
                self.config.upstream.access_token_env
            ))
        })
    }
}

/// Create the main API router with all endpoints configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_seconds);
    let cors = cors_layer(&state.config.server.allowed_origins);

    Router::new()
        .route("/health", get(health::handle))
        .route("/api/analytics", get(analytics::snapshot))
        .route("/api/rate-limits", get(analytics::rate_limits))
        .route(
            "/api/contacts",
            get(crm::list_contacts).post(crm::create_contact),
        )
        .route("/api/contacts/:id", get(crm::get_contact))
        .route("/api/conversations", get(crm::list_conversations))
        .route("/api/conversations/:id", get(crm::get_conversation))
        .route("/api/conversations/:id/messages", post(crm::send_message))
        .route("/api/opportunities", get(crm::list_opportunities))
        .route("/api/opportunities/pipelines", get(crm::list_pipelines))
        .route("/api/calendars", get(crm::list_calendars))
        .route("/api/test", post(crm::test_request))
        .route("/api/ai/health", get(ai::health))
        .route("/api/ai/score-contact", post(ai::score_contact))
        .route("/api/ai/score-contacts", post(ai::score_contacts))
        .route("/api/ai/detect-anomalies", post(ai::detect_anomalies))
        .route("/api/ai/predict-win", post(ai::predict_win))
        .route("/api/ai/ask", post(ai::ask))
        .route("/api/ai/insights", post(ai::insights))
        .route(
            "/webhooks",
            post(webhooks::capture_default)
                .get(webhooks::list)
                .delete(webhooks::clear),
        )
        .route(
            "/webhooks/:key",
            post(webhooks::capture).get(webhooks::get_by_id),
        )
        .route("/ws", get(live::websocket_handler))
        .route("/metrics", get(crate::metrics::handler::metrics_handler))
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        // Outermost, so timeouts and rejected bodies are recorded too.
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            crate::logging::track_requests,
        ))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
