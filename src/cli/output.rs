//! Output formatting helpers for CLI commands

use crate::monitor::{AnalyticsSnapshot, EndpointStat};
use crate::ratelimit::RateLimitInfo;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

/// What `insight status` collects from a running server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub url: String,
    pub uptime_seconds: u64,
    pub ai_enabled: bool,
    pub rate_limits: RateLimitInfo,
    pub analytics: AnalyticsSnapshot,
}

/// Format duration in a human-readable way
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Percentage of quota left, colored by how close it is to exhaustion.
fn remaining_display(remaining: u64, limit: u64) -> String {
    let pct = if limit == 0 {
        0.0
    } else {
        remaining as f64 * 100.0 / limit as f64
    };
    let text = format!("{}/{} ({:.0}%)", remaining, limit, pct);
    if pct < 10.0 {
        text.red().to_string()
    } else if pct < 50.0 {
        text.yellow().to_string()
    } else {
        text.green().to_string()
    }
}

/// Format per-endpoint statistics as a table, busiest first
pub fn format_endpoints_table(endpoints: &BTreeMap<String, EndpointStat>) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Endpoint", "Count", "Errors", "Avg Duration"]);

    let mut rows: Vec<_> = endpoints.iter().collect();
    rows.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)));

    for (key, stat) in rows {
        let errors = if stat.errors > 0 {
            stat.errors.to_string().red().to_string()
        } else {
            stat.errors.to_string()
        };
        table.add_row(vec![
            Cell::new(key),
            Cell::new(stat.count),
            Cell::new(errors),
            Cell::new(format!("{:.0}ms", stat.avg_duration_ms)),
        ]);
    }

    table.to_string()
}

/// Format a status report as pretty text
pub fn format_status_pretty(report: &StatusReport) -> String {
    let mut output = String::new();
    let totals = &report.analytics.requests;
    let limits = &report.rate_limits;

    let _ = writeln!(output, "Server: {}", report.url);
    let _ = writeln!(output, "Uptime: {}", format_duration(report.uptime_seconds));
    let _ = writeln!(
        output,
        "AI: {}",
        if report.ai_enabled {
            "enabled".green()
        } else {
            "disabled".dimmed()
        }
    );
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Requests: {} total, {} ok, {} errors, {}ms avg",
        totals.total, totals.success, totals.errors, totals.avg_duration_ms
    );
    let _ = writeln!(
        output,
        "Daily quota: {}",
        remaining_display(limits.daily_remaining, limits.daily)
    );
    let _ = writeln!(
        output,
        "Burst quota: {}",
        remaining_display(limits.burst_remaining, limits.burst)
    );

    if !report.analytics.endpoints.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "{}", format_endpoints_table(&report.analytics.endpoints));
    }

    if !report.analytics.recent_errors.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "Recent errors:");
        for error in &report.analytics.recent_errors {
            let _ = writeln!(
                output,
                "  {} {} {}",
                "✗".red(),
                error.path,
                error.message.dimmed()
            );
        }
    }

    output
}

/// Format a status report as JSON
pub fn format_status_json(report: &StatusReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{compute_snapshot, ErrorEvent, RecentLimits, RequestEvent};

    fn create_test_report() -> StatusReport {
        let requests = vec![
            RequestEvent::new("GET", "/api/contacts", 200, 100),
            RequestEvent::new("GET", "/api/contacts", 500, 300),
            RequestEvent::new("POST", "/webhooks", 200, 5),
        ];
        let errors = vec![ErrorEvent::new("/api/contacts", "Upstream unavailable")];
        StatusReport {
            url: "http://localhost:3000".to_string(),
            uptime_seconds: 3725,
            ai_enabled: false,
            rate_limits: RateLimitInfo {
                daily: 200_000,
                burst: 100,
                daily_remaining: 150_000,
                burst_remaining: 5,
            },
            analytics: compute_snapshot(&requests, &errors, RecentLimits::default()),
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(5), "5s");
        assert_eq!(format_duration(65), "1m 5s");
        assert_eq!(format_duration(3725), "1h 2m 5s");
    }

    #[test]
    fn test_format_endpoints_table_empty() {
        let output = format_endpoints_table(&BTreeMap::new());
        assert!(output.contains("Endpoint"));
    }

    #[test]
    fn test_format_endpoints_table_busiest_first() {
        let report = create_test_report();
        let output = format_endpoints_table(&report.analytics.endpoints);
        let contacts = output.find("GET /api/contacts").unwrap();
        let webhooks = output.find("POST /webhooks").unwrap();
        assert!(contacts < webhooks);
        assert!(output.contains("200ms"));
    }

    #[test]
    fn test_format_status_pretty_sections() {
        let output = format_status_pretty(&create_test_report());
        assert!(output.contains("Uptime: 1h 2m 5s"));
        assert!(output.contains("3 total"));
        assert!(output.contains("5/100"));
        assert!(output.contains("Upstream unavailable"));
    }

    #[test]
    fn test_format_status_json_valid() {
        let output = format_status_json(&create_test_report()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["rate_limits"]["burstRemaining"], 5);
        assert_eq!(parsed["analytics"]["requests"]["total"], 3);
    }
}
