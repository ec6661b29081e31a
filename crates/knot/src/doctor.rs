// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `knot doctor` command implementation.
//!
//! Runs diagnostic checks against the configuration and the database to
//! find problems before `knot serve` does.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use knot_config::KnotConfig;
use knot_core::KnotError;
use knot_storage::{Connection, ConnectionOptions, ConnectionPool, PoolConfig};

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `knot doctor` command.
///
/// With `--deep`, also runs SQLite's integrity check. Fails when any check fails.
pub fn run_doctor(config_path: Option<&Path>, deep: bool, plain: bool) -> Result<(), KnotError> {
    let use_color = !plain && std::io::stdout().is_terminal();

    let (config_result, config) = check_config(config_path);
    let mut results = vec![config_result];
    if let Some(config) = &config {
        results.push(check_token_secret(config));
        results.push(check_database(config));
        results.push(check_pool(config));
        results.push(check_schema(config));
        if deep {
            results.push(check_integrity(config));
        }
    }

    println!();
    println!("  knot doctor");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", format_line(result, use_color));
    }
    println!();

    let fail_count = results
        .iter()
        .filter(|r| r.status == CheckStatus::Fail)
        .count();
    let warn_count = results
        .iter()
        .filter(|r| r.status == CheckStatus::Warn)
        .count();
    if fail_count + warn_count > 0 {
        let issues = fail_count + warn_count;
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
        if !deep {
            println!("  Run with --deep for the database integrity check.");
        }
    } else {
        println!("  All checks passed.");
    }
    println!();

    if fail_count > 0 {
        return Err(KnotError::Internal(format!("{fail_count} check(s) failed")));
    }
    Ok(())
}

fn format_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green().to_string(), result.message.normal()),
            CheckStatus::Warn => ("!".yellow().to_string(), result.message.yellow()),
            CheckStatus::Fail => ("✗".red().to_string(), result.message.red()),
        };
        format!(
            "    {symbol} {:<20} {message} ({duration_ms}ms)",
            result.name
        )
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!(
            "    {tag} {:<20} {} ({duration_ms}ms)",
            result.name, result.message
        )
    }
}

/// Check configuration loads without errors.
fn check_config(path: Option<&Path>) -> (CheckResult, Option<KnotConfig>) {
    let start = Instant::now();
    let loaded = match path {
        Some(path) => knot_config::load_and_validate_path(path),
        None => knot_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => (
            CheckResult::new("Configuration", CheckStatus::Pass, "valid", start),
            Some(config),
        ),
        Err(errors) => {
            knot_config::render_errors(&errors);
            (
                CheckResult::new(
                    "Configuration",
                    CheckStatus::Fail,
                    format!("{} error(s)", errors.len()),
                    start,
                ),
                None,
            )
        }
    }
}

fn check_token_secret(config: &KnotConfig) -> CheckResult {
    let start = Instant::now();
    if config.auth.token_secret.is_some() {
        CheckResult::new("Token secret", CheckStatus::Pass, "configured", start)
    } else {
        CheckResult::new(
            "Token secret",
            CheckStatus::Warn,
            "auth.token_secret not set (required for serve)",
            start,
        )
    }
}

fn connection_options(config: &KnotConfig) -> ConnectionOptions {
    PoolConfig::from(&config.database).connection
}

/// Check the database file can be opened and answers a ping.
fn check_database(config: &KnotConfig) -> CheckResult {
    let start = Instant::now();
    let path = Path::new(&config.database.path);
    if !path.exists() {
        return CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!("not found: {} (created by migrate or serve)", path.display()),
            start,
        );
    }
    match Connection::open(0, &connection_options(config)) {
        Ok(conn) if conn.ping() => CheckResult::new("Database", CheckStatus::Pass, "connected", start),
        Ok(_) => CheckResult::new("Database", CheckStatus::Fail, "ping failed", start),
        Err(e) => CheckResult::new("Database", CheckStatus::Fail, format!("open failed: {e}"), start),
    }
}

/// Check a pool of the configured size initializes and round-trips a connection.
fn check_pool(config: &KnotConfig) -> CheckResult {
    let start = Instant::now();
    if !Path::new(&config.database.path).exists() {
        return CheckResult::new("Connection pool", CheckStatus::Warn, "skipped (no database)", start);
    }
    let round_trip = || -> Result<String, KnotError> {
        let pool = ConnectionPool::initialize(PoolConfig::from(&config.database))?;
        {
            let conn = pool.acquire()?;
            if !conn.ping() {
                return Err(KnotError::ConnectionInvalid("ping failed".into()));
            }
        }
        let stats = pool.stats();
        pool.close();
        Ok(format!(
            "{} of {} connections warm, acquire/release ok",
            stats.idle, stats.max_size
        ))
    };
    match round_trip() {
        Ok(message) => CheckResult::new("Connection pool", CheckStatus::Pass, message, start),
        Err(e) => CheckResult::new("Connection pool", CheckStatus::Fail, e.to_string(), start),
    }
}

/// Check the schema version against the migrations compiled into this binary.
fn check_schema(config: &KnotConfig) -> CheckResult {
    let start = Instant::now();
    if !Path::new(&config.database.path).exists() {
        return CheckResult::new("Schema", CheckStatus::Warn, "skipped (no database)", start);
    }
    let latest = knot_storage::migrations::latest_version().unwrap_or(0);
    let applied = Connection::open(0, &connection_options(config)).and_then(|conn| {
        conn.query_optional(
            "SELECT MAX(version) FROM refinery_schema_history",
            [],
            |row| row.get::<_, Option<i32>>(0),
        )
    });
    match applied {
        Ok(Some(Some(version))) if version >= latest => {
            CheckResult::new("Schema", CheckStatus::Pass, format!("version {version}"), start)
        }
        Ok(Some(Some(version))) => CheckResult::new(
            "Schema",
            CheckStatus::Warn,
            format!("version {version}, {latest} available (run knot migrate)"),
            start,
        ),
        Ok(_) | Err(_) => CheckResult::new(
            "Schema",
            CheckStatus::Warn,
            "not migrated (run knot migrate)",
            start,
        ),
    }
}

/// Run `PRAGMA integrity_check`.
fn check_integrity(config: &KnotConfig) -> CheckResult {
    let start = Instant::now();
    if !Path::new(&config.database.path).exists() {
        return CheckResult::new("Integrity", CheckStatus::Warn, "skipped (no database)", start);
    }
    let verdict = Connection::open(0, &connection_options(config)).and_then(|conn| {
        conn.query_one("PRAGMA integrity_check", [], |row| row.get::<_, String>(0))
    });
    match verdict {
        Ok(v) if v == "ok" => CheckResult::new("Integrity", CheckStatus::Pass, "ok", start),
        Ok(v) => CheckResult::new("Integrity", CheckStatus::Fail, v, start),
        Err(e) => CheckResult::new("Integrity", CheckStatus::Fail, e.to_string(), start),
    }
}
