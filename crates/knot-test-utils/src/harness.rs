// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for integration testing.
//!
//! `TestHarness` assembles a migrated SQLite database in a temp directory,
//! a connection pool over it, the full set of services, and a token
//! authority. The temp directory lives as long as the harness.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use knot_auth::{Argon2Hasher, HmacTokenAuthority};
use knot_core::{IdGenerator, KnotError, Post, RandomIdGenerator, TokenAuthority, User, UserId};
use knot_service::Services;
use knot_storage::{ConnectionOptions, ConnectionPool, PoolConfig};
use tempfile::TempDir;

/// Password used by [`TestHarness::user`].
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// HMAC key used by the harness token authority.
pub const TEST_TOKEN_SECRET: &str = "test-secret-that-is-at-least-32-bytes-long";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    max_connections: usize,
    acquire_timeout: Duration,
    busy_timeout: Duration,
    token_ttl: Duration,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            max_connections: 4,
            acquire_timeout: Duration::from_secs(10),
            busy_timeout: Duration::from_secs(5),
            token_ttl: Duration::from_secs(3600),
            ids: None,
        }
    }

    /// Set the pool maximum.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set how long an acquire waits on an exhausted pool.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set how long SQLite waits on another connection's write lock.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Set the lifetime of issued tokens.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Replace the random id generator, e.g. with [`crate::ScriptedIds`].
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Build the harness: temp database, migrations, pool, and services.
    pub fn build(self) -> Result<TestHarness, KnotError> {
        let temp_dir = TempDir::new()
            .map_err(|e| KnotError::Internal(format!("failed to create temp dir: {e}")))?;
        let db_path = temp_dir.path().join("test.db");

        let mut options = ConnectionOptions::new(&db_path);
        options.busy_timeout = self.busy_timeout;
        let pool = ConnectionPool::initialize(
            PoolConfig::new(options)
                .max_size(self.max_connections)
                .min_idle(1)
                .acquire_timeout(self.acquire_timeout),
        )?;
        pool.migrate()?;
        let pool = Arc::new(pool);

        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(RandomIdGenerator));
        let services = Services::new(pool.clone(), Arc::new(Argon2Hasher::insecure_fast()), ids);
        let tokens = Arc::new(HmacTokenAuthority::new(
            TEST_TOKEN_SECRET.as_bytes(),
            self.token_ttl,
        ));

        tracing::debug!(path = %db_path.display(), "test harness ready");
        Ok(TestHarness {
            _temp_dir: temp_dir,
            db_path,
            pool,
            services,
            tokens,
        })
    }
}

/// A complete, isolated backend for one test.
pub struct TestHarness {
    _temp_dir: TempDir,
    db_path: PathBuf,
    pub pool: Arc<ConnectionPool>,
    pub services: Services,
    pub tokens: Arc<HmacTokenAuthority>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default settings.
    pub fn new() -> Result<Self, KnotError> {
        Self::builder().build()
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Registers a user with [`TEST_PASSWORD`].
    pub fn user(&self, username: &str) -> Result<User, KnotError> {
        self.services.users.register(username, TEST_PASSWORD)
    }

    /// Creates a post with an empty description.
    pub fn post(&self, author: UserId, title: &str) -> Result<Post, KnotError> {
        self.services.posts.create(author, title, "")
    }

    /// A bearer token for `user`.
    pub fn token(&self, user: UserId) -> Result<String, KnotError> {
        self.tokens.issue(user)
    }
}
