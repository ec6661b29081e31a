// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Knot backend.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Knot configuration.
///
/// All sections are optional and default to values suitable for a local
/// development instance.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KnotConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database file and connection pool settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Bearer token settings.
    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// `host:port` suitable for binding or for building a base URL.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database and connection pool configuration.
///
/// The store is a single SQLite file, so location and credentials reduce to
/// `path`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. Created if missing.
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Upper bound on connections open at once (idle plus issued).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Connections opened eagerly when the pool is initialized.
    #[serde(default = "default_min_connections")]
    pub min_connections: usize,

    /// How long `acquire()` waits for a free connection before giving up.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// How long SQLite retries a locked database before returning `SQLITE_BUSY`.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Enable WAL journal mode (readers do not block the writer).
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            busy_timeout_ms: default_busy_timeout_ms(),
            wal_mode: true,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("knot").join("knot.db").display().to_string())
        .unwrap_or_else(|| "knot.db".to_string())
}

fn default_max_connections() -> usize {
    10
}

fn default_min_connections() -> usize {
    2
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

/// Bearer token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// HMAC key for signing tokens. Required by `knot serve`.
    #[serde(default)]
    pub token_secret: Option<String>,

    /// Token lifetime in seconds.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

fn default_token_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let config = KnotConfig::default();
        assert_eq!(config.server.bind_addr(), "127.0.0.1:8080");
        assert!(config.database.min_connections <= config.database.max_connections);
        assert_eq!(config.database.acquire_timeout(), Duration::from_secs(30));
        assert_eq!(config.database.busy_timeout(), Duration::from_millis(5000));
        assert!(config.database.wal_mode);
        assert!(config.auth.token_secret.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn default_database_path_ends_with_file_name() {
        assert!(default_database_path().ends_with("knot.db"));
    }
}
