//! Status command implementation

use crate::cli::output::{format_status_json, format_status_pretty, StatusReport};
use crate::cli::StatusArgs;
use crate::monitor::AnalyticsSnapshot;
use crate::ratelimit::RateLimitInfo;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize)]
struct HealthReply {
    #[serde(default)]
    uptime_seconds: u64,
    #[serde(default)]
    ai: bool,
}

async fn fetch<T: DeserializeOwned>(
    client: &reqwest::Client,
    base: &str,
    path: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    let url = format!("{}{}", base, path);
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| format!("Could not reach {}: {}", url, e))?;

    if !response.status().is_success() {
        return Err(format!("{} returned {}", url, response.status()).into());
    }

    Ok(response.json().await?)
}

/// Collect health, analytics and quota from a running server.
pub async fn collect_status(args: &StatusArgs) -> Result<StatusReport, Box<dyn std::error::Error>> {
    let base = args.url.trim_end_matches('/');
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()?;

    let health: HealthReply = fetch(&client, base, "/health").await?;
    let analytics: AnalyticsSnapshot = fetch(&client, base, "/api/analytics").await?;
    let rate_limits: RateLimitInfo = fetch(&client, base, "/api/rate-limits").await?;

    Ok(StatusReport {
        url: base.to_string(),
        uptime_seconds: health.uptime_seconds,
        ai_enabled: health.ai,
        rate_limits,
        analytics,
    })
}

/// Handle `insight status` command
pub async fn handle_status(args: &StatusArgs) -> Result<String, Box<dyn std::error::Error>> {
    let report = collect_status(args).await?;
    if args.json {
        Ok(format_status_json(&report)?)
    } else {
        Ok(format_status_pretty(&report))
    }
}
