// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `knot status` command implementation.
//!
//! Queries the running server's health endpoint and prints its state and
//! connection pool statistics. Reports "not running" when nothing answers.

use std::io::IsTerminal;
use std::time::Duration;

use knot_config::KnotConfig;
use knot_core::KnotError;
use knot_gateway::handlers::HealthResponse;
use knot_storage::PoolStats;
use serde::Serialize;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub status: String,
    pub uptime_secs: Option<u64>,
    pub uptime_human: Option<String>,
    pub pool: Option<PoolStats>,
    pub endpoint: String,
}

/// Format seconds into a human-readable duration string.
fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

async fn fetch_health(url: &str) -> Option<HealthResponse> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .ok()?;
    // A closed pool answers 503 with a body worth showing.
    let resp = client.get(url).send().await.ok()?;
    resp.json().await.ok()
}

/// Run the `knot status` command.
pub async fn run_status(config: &KnotConfig, json: bool, plain: bool) -> Result<(), KnotError> {
    let endpoint = format!("http://{}/health", config.server.bind_addr());
    let health = fetch_health(&endpoint).await;

    let response = match health {
        Some(health) => StatusResponse {
            running: true,
            status: health.status,
            uptime_secs: Some(health.uptime_secs),
            uptime_human: Some(format_uptime(health.uptime_secs)),
            pool: Some(health.pool),
            endpoint,
        },
        None => StatusResponse {
            running: false,
            status: "not running".to_string(),
            uptime_secs: None,
            uptime_human: None,
            pool: None,
            endpoint,
        },
    };

    if json {
        let rendered = serde_json::to_string_pretty(&response)
            .map_err(|e| KnotError::Internal(format!("failed to render status: {e}")))?;
        println!("{rendered}");
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(&response, use_color);
    }
    Ok(())
}

fn print_status(response: &StatusResponse, use_color: bool) {
    println!();
    println!("  knot status");
    println!("  {}", "-".repeat(35));

    let healthy = response.running && response.status == "ok";
    let state = match (&response.uptime_human, use_color) {
        (Some(uptime), true) => {
            use colored::Colorize;
            let mark = if healthy { "✓".green() } else { "!".yellow() };
            format!("{mark} {} (uptime: {uptime})", response.status)
        }
        (Some(uptime), false) => {
            let tag = if healthy { "[OK]" } else { "[WARN]" };
            format!("{tag} {} (uptime: {uptime})", response.status)
        }
        (None, true) => {
            use colored::Colorize;
            format!("{} {}", "✗".red(), "not running".red())
        }
        (None, false) => "[FAIL] not running".to_string(),
    };
    println!("    State:    {state}");

    if let Some(pool) = &response.pool {
        println!(
            "    Pool:     {} issued, {} idle, max {}",
            pool.issued, pool.idle, pool.max_size
        );
        println!(
            "    Totals:   {} opened, {} discarded, {} timeouts",
            pool.created, pool.discarded, pool.timeouts
        );
    }
    println!("    Endpoint: {}", response.endpoint);
    if !response.running {
        println!();
        println!("  Start with: knot serve");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_uptime_minutes() {
        assert_eq!(format_uptime(120), "2m");
    }

    #[test]
    fn format_uptime_hours() {
        assert_eq!(format_uptime(3720), "1h 2m");
    }

    #[test]
    fn format_uptime_days() {
        assert_eq!(format_uptime(90060), "1d 1h 1m");
    }

    #[test]
    fn offline_status_serializes() {
        let resp = StatusResponse {
            running: false,
            status: "not running".to_string(),
            uptime_secs: None,
            uptime_human: None,
            pool: None,
            endpoint: "http://127.0.0.1:8080/health".to_string(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"running\":false"));
        assert!(json.contains("\"pool\":null"));
    }
}
