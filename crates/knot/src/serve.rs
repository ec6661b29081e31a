// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `knot serve` and `knot migrate` command implementations.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use knot_auth::{Argon2Hasher, HmacTokenAuthority};
use knot_config::KnotConfig;
use knot_core::{KnotError, RandomIdGenerator};
use knot_gateway::{start_server, GatewayState, ServerConfig};
use knot_service::Services;
use knot_storage::{ConnectionPool, PoolConfig};
use tracing::{info, warn};

/// Runs the HTTP API until ctrl-c or SIGTERM, then closes the pool.
pub async fn run_serve(config: KnotConfig) -> Result<(), KnotError> {
    init_tracing(&config.logging.level);

    let secret = config.auth.token_secret.clone().ok_or_else(|| {
        KnotError::Config("auth.token_secret must be set to run the server".into())
    })?;

    let pool = Arc::new(open_pool(&config)?);
    pool.migrate()?;

    let services = Services::new(
        pool.clone(),
        Arc::new(Argon2Hasher::default()),
        Arc::new(RandomIdGenerator),
    );
    let tokens = Arc::new(HmacTokenAuthority::new(
        secret.into_bytes(),
        Duration::from_secs(config.auth.token_ttl_secs),
    ));
    let state = GatewayState::new(services, tokens, pool.clone());

    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    info!(
        database = %config.database.path,
        max_connections = config.database.max_connections,
        "knot starting"
    );

    let served = start_server(&server_config, state, shutdown_signal()).await;

    pool.close();
    let stats = pool.stats();
    info!(
        created = stats.created,
        discarded = stats.discarded,
        timeouts = stats.timeouts,
        "knot stopped"
    );
    served
}

/// Applies pending migrations and reports the schema version.
pub fn run_migrate(config: &KnotConfig) -> Result<(), KnotError> {
    init_tracing(&config.logging.level);
    let pool = open_pool(config)?;
    pool.migrate()?;
    pool.close();
    match knot_storage::migrations::latest_version() {
        Some(version) => println!("knot: database at schema version {version}"),
        None => println!("knot: no migrations embedded"),
    }
    Ok(())
}

/// Opens the pool described by `[database]`, creating the database's
/// parent directory if needed.
pub fn open_pool(config: &KnotConfig) -> Result<ConnectionPool, KnotError> {
    let path = Path::new(&config.database.path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            KnotError::Config(format!(
                "cannot create database directory {}: {e}",
                parent.display()
            ))
        })?;
    }
    ConnectionPool::initialize(PoolConfig::from(&config.database))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

/// Initializes the tracing subscriber with the given log level.
///
/// `RUST_LOG` wins when set.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("knot={log_level},warn")));

    // A second init in the same process (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_pool_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = KnotConfig::default();
        config.database.path = dir
            .path()
            .join("nested/deeper/knot.db")
            .to_string_lossy()
            .into_owned();
        config.database.min_connections = 1;

        let pool = open_pool(&config).unwrap();
        pool.migrate().unwrap();
        assert!(dir.path().join("nested/deeper/knot.db").exists());
    }
}
