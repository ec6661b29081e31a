// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./knot.toml` > `~/.config/knot/knot.toml` > `/etc/knot/knot.toml`
//! with environment variable overrides via the `KNOT_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::KnotConfig;
use crate::{LOCAL_CONFIG_FILE, SYSTEM_CONFIG_FILE};

/// Top-level sections that environment variables can address.
const SECTIONS: &[&str] = &["server", "database", "auth", "logging"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/knot/knot.toml` (system-wide)
/// 3. `~/.config/knot/knot.toml` (user XDG config)
/// 4. `./knot.toml` (local directory)
/// 5. `KNOT_*` environment variables
pub fn load_config() -> Result<KnotConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<KnotConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KnotConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<KnotConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KnotConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(KnotConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_FILE));
    if let Some(user) = user_config_path() {
        figment = figment.merge(Toml::file(user));
    }
    figment.merge(Toml::file(LOCAL_CONFIG_FILE)).merge(env_provider())
}

/// `~/.config/knot/knot.toml`, when the platform has a config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("knot").join("knot.toml"))
}

/// Environment provider with explicit section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `KNOT_DATABASE_MAX_CONNECTIONS` must become
/// `database.max_connections`, not `database.max.connections`.
fn env_provider() -> Env {
    Env::prefixed("KNOT_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a prefix-stripped env var name to a dotted config path.
///
/// Figment passes the key in its original case, so it is lowercased first.
pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(field) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{field}");
        }
    }
    key
}
