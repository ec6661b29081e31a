// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as bind addresses, pool bounds, and secret length.

use crate::diagnostic::ConfigError;
use crate::model::KnotConfig;

/// Shortest accepted HMAC key, in bytes.
pub const MIN_TOKEN_SECRET_LEN: usize = 32;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &KnotConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    if config.server.port == 0 {
        fail("server.port must not be 0".to_string());
    }

    let db = &config.database;
    if db.path.trim().is_empty() {
        fail("database.path must not be empty".to_string());
    }

    if db.max_connections == 0 {
        fail("database.max_connections must be at least 1".to_string());
    }

    if db.min_connections > db.max_connections {
        fail(format!(
            "database.min_connections ({}) must not exceed database.max_connections ({})",
            db.min_connections, db.max_connections
        ));
    }

    if db.acquire_timeout_secs == 0 {
        fail("database.acquire_timeout_secs must be at least 1".to_string());
    }

    if let Some(secret) = &config.auth.token_secret
        && secret.len() < MIN_TOKEN_SECRET_LEN
    {
        fail(format!(
            "auth.token_secret must be at least {MIN_TOKEN_SECRET_LEN} bytes, got {}",
            secret.len()
        ));
    }

    if config.auth.token_ttl_secs == 0 {
        fail("auth.token_ttl_secs must be at least 1".to_string());
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        fail(format!(
            "logging.level `{}` is not one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &KnotConfig) -> Vec<String> {
        validate_config(config)
            .err()
            .unwrap_or_default()
            .iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&KnotConfig::default()).is_ok());
    }

    #[test]
    fn zero_pool_size_rejected() {
        let mut config = KnotConfig::default();
        config.database.max_connections = 0;
        config.database.min_connections = 0;
        let msgs = messages(&config);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].contains("max_connections"));
    }

    #[test]
    fn min_above_max_rejected() {
        let mut config = KnotConfig::default();
        config.database.max_connections = 2;
        config.database.min_connections = 5;
        assert!(messages(&config)[0].contains("min_connections"));
    }

    #[test]
    fn short_secret_rejected() {
        let mut config = KnotConfig::default();
        config.auth.token_secret = Some("short".into());
        assert!(messages(&config)[0].contains("token_secret"));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = KnotConfig::default();
        config.server.host = "bad host!".into();
        config.database.path = " ".into();
        config.database.acquire_timeout_secs = 0;
        config.logging.level = "loud".into();
        assert_eq!(messages(&config).len(), 4);
    }

    #[test]
    fn parsed_toml_validates() {
        let toml_str = r#"
            [database]
            path = "/var/lib/knot/knot.db"
            max_connections = 8
            min_connections = 2

            [auth]
            token_secret = "0123456789abcdef0123456789abcdef"
        "#;
        let config: KnotConfig = toml::from_str(toml_str).unwrap();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn unknown_toml_key_rejected() {
        let result = toml::from_str::<KnotConfig>("[database]
max_conections = 8
");
        assert!(result.is_err());
    }
}
