// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded, blocking connection pool.
//!
//! The pool keeps a FIFO of idle connections and a count of connections
//! currently issued to [`ScopedConnection`] guards. Both live under one
//! mutex, and `idle + issued <= max_size` holds whenever that mutex is
//! released. Callers that find the pool exhausted wait on a condition
//! variable until a release or the acquire timeout.
//!
//! Opening and pinging connections happens outside the lock: a slot is
//! reserved (counted as issued) first, and handed back if the open fails.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use knot_config::DatabaseConfig;
use knot_core::KnotError;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::connection::{Connection, ConnectionOptions};
use crate::guard::ScopedConnection;
use crate::migrations;
use crate::transaction::Transaction;

/// Pool sizing and timeouts.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub connection: ConnectionOptions,
    /// Maximum connections open at once, idle plus issued.
    pub max_size: usize,
    /// Connections opened by [`ConnectionPool::initialize`].
    pub min_idle: usize,
    /// Upper bound on how long [`ConnectionPool::acquire`] blocks.
    pub acquire_timeout: Duration,
}

impl PoolConfig {
    pub fn new(connection: ConnectionOptions) -> Self {
        Self {
            connection,
            max_size: 10,
            min_idle: 1,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn min_idle(mut self, min_idle: usize) -> Self {
        self.min_idle = min_idle;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    fn validate(&self) -> Result<(), KnotError> {
        if self.connection.path.as_os_str().is_empty() {
            return Err(KnotError::Config("database path must not be empty".into()));
        }
        if self.max_size == 0 {
            return Err(KnotError::Config("pool max_size must be at least 1".into()));
        }
        if self.min_idle > self.max_size {
            return Err(KnotError::Config(format!(
                "pool min_idle ({}) exceeds max_size ({})",
                self.min_idle, self.max_size
            )));
        }
        if self.acquire_timeout.is_zero() {
            return Err(KnotError::Config(
                "pool acquire_timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

impl From<&DatabaseConfig> for PoolConfig {
    fn from(db: &DatabaseConfig) -> Self {
        Self {
            connection: ConnectionOptions {
                path: db.path.clone().into(),
                busy_timeout: db.busy_timeout(),
                wal_mode: db.wal_mode,
            },
            max_size: db.max_connections,
            min_idle: db.min_connections,
            acquire_timeout: db.acquire_timeout(),
        }
    }
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub idle: usize,
    pub issued: usize,
    pub max_size: usize,
    /// Connections opened over the pool's lifetime.
    pub created: u64,
    /// Connections dropped because they were invalid or the pool was closed.
    pub discarded: u64,
    /// Acquires that gave up after the timeout.
    pub timeouts: u64,
}

struct PoolState {
    idle: VecDeque<Connection>,
    issued: usize,
    closed: bool,
}

enum Slot {
    Idle(Connection),
    Open,
}

/// Process-wide bounded pool. Construct once and share behind an `Arc`.
pub struct ConnectionPool {
    config: PoolConfig,
    state: Mutex<PoolState>,
    released: Condvar,
    next_id: AtomicU64,
    created: AtomicU64,
    discarded: AtomicU64,
    timeouts: AtomicU64,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl ConnectionPool {
    /// Validates the configuration and opens `min_idle` connections (at
    /// least one), failing fast if the database cannot be reached.
    pub fn initialize(config: PoolConfig) -> Result<Self, KnotError> {
        config.validate()?;

        let pool = Self {
            state: Mutex::new(PoolState {
                idle: VecDeque::with_capacity(config.max_size),
                issued: 0,
                closed: false,
            }),
            released: Condvar::new(),
            next_id: AtomicU64::new(1),
            created: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            config,
        };

        let warm = pool.config.min_idle.max(1);
        for _ in 0..warm {
            let conn = pool.open_connection()?;
            if !conn.ping() {
                return Err(KnotError::ConnectionInvalid(format!(
                    "database at {} did not answer",
                    pool.config.connection.path.display()
                )));
            }
            pool.lock().idle.push_back(conn);
        }

        info!(
            path = %pool.config.connection.path.display(),
            max_size = pool.config.max_size,
            idle = warm,
            "connection pool initialized"
        );
        Ok(pool)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Takes a connection, waiting up to the acquire timeout.
    ///
    /// Idle connections are handed out oldest-first after a liveness check;
    /// dead ones are discarded and the loop tries again. When nothing is
    /// idle and the pool is below `max_size` a new connection is opened.
    pub fn acquire(&self) -> Result<ScopedConnection<'_>, KnotError> {
        let deadline = Instant::now() + self.config.acquire_timeout;

        loop {
            match self.reserve(deadline)? {
                Slot::Idle(conn) => {
                    if conn.ping() {
                        debug!(conn_id = conn.id(), "connection acquired");
                        return Ok(ScopedConnection::new(self, conn));
                    }
                    warn!(conn_id = conn.id(), "discarding dead idle connection");
                    self.release(conn);
                }
                Slot::Open => match self.open_connection() {
                    Ok(conn) => {
                        debug!(conn_id = conn.id(), "connection opened and acquired");
                        return Ok(ScopedConnection::new(self, conn));
                    }
                    Err(e) => {
                        self.return_slot();
                        return Err(e);
                    }
                },
            }
        }
    }

    /// Claims an idle connection or the right to open one.
    fn reserve(&self, deadline: Instant) -> Result<Slot, KnotError> {
        let mut state = self.lock();
        let mut waited = false;
        loop {
            if state.closed {
                return Err(KnotError::PoolClosed);
            }
            if let Some(conn) = state.idle.pop_front() {
                state.issued += 1;
                return Ok(Slot::Idle(conn));
            }
            if state.issued < self.config.max_size {
                state.issued += 1;
                return Ok(Slot::Open);
            }

            let now = Instant::now();
            if now >= deadline {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
                error!(
                    issued = state.issued,
                    max_size = self.config.max_size,
                    timeout = ?self.config.acquire_timeout,
                    "timed out waiting for a database connection"
                );
                return Err(KnotError::ConnectionUnavailable {
                    timeout: self.config.acquire_timeout,
                });
            }
            if !waited {
                warn!(
                    issued = state.issued,
                    max_size = self.config.max_size,
                    "connection pool exhausted, waiting"
                );
                waited = true;
            }
            state = self
                .released
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Gives a reserved slot back after a failed open.
    fn return_slot(&self) {
        let mut state = self.lock();
        state.issued = state.issued.saturating_sub(1);
        drop(state);
        self.released.notify_one();
    }

    /// Returns a connection taken by [`acquire`](Self::acquire).
    ///
    /// Valid connections in autocommit mode go back on the idle queue. A
    /// connection that is invalid, or that still has a transaction open, is
    /// closed; its slot frees up so a later acquire can open a replacement.
    /// Either way one waiter is woken.
    pub(crate) fn release(&self, conn: Connection) {
        let in_transaction = !conn.is_autocommit();
        if in_transaction && conn.is_valid() {
            warn!(
                conn_id = conn.id(),
                "connection released with an open transaction, discarding"
            );
        }
        let reusable = conn.is_valid() && !in_transaction;

        let mut state = self.lock();
        state.issued = state.issued.saturating_sub(1);
        let discard = if reusable && !state.closed {
            state.idle.push_back(conn);
            None
        } else {
            Some(conn)
        };
        drop(state);
        self.released.notify_one();

        match discard {
            Some(conn) => {
                self.discarded.fetch_add(1, Ordering::Relaxed);
                debug!(conn_id = conn.id(), "connection discarded");
            }
            None => debug!("connection released to pool"),
        }
    }

    /// Snapshot of pool occupancy and lifetime totals.
    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        PoolStats {
            idle: state.idle.len(),
            issued: state.issued,
            max_size: self.config.max_size,
            created: self.created.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }

    /// Closes idle connections and refuses further acquires.
    ///
    /// Connections still issued are closed as their guards drop. Waiters are
    /// woken and fail with [`KnotError::PoolClosed`].
    pub fn close(&self) {
        let drained: Vec<Connection> = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.idle.drain(..).collect()
        };
        self.released.notify_all();
        self.discarded
            .fetch_add(drained.len() as u64, Ordering::Relaxed);
        info!(closed_idle = drained.len(), "connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Acquires a connection, runs `f` inside a transaction on it, and
    /// commits if `f` succeeds. On error the transaction is rolled back and
    /// the error returned.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T, KnotError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, KnotError>,
    {
        let conn = self.acquire()?;
        let mut tx = Transaction::start(&conn)?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "rollback after failed closure also failed");
                }
                Err(e)
            }
        }
    }

    /// Applies pending schema migrations on a pooled connection.
    pub fn migrate(&self) -> Result<(), KnotError> {
        let mut conn = self.acquire()?;
        migrations::run_migrations(conn.connection_mut().raw_mut())
    }

    fn open_connection(&self) -> Result<Connection, KnotError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let conn = Connection::open(id, &self.config.connection)?;
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(conn)
    }

    /// The state is consistent at every unlock point, so a poisoned lock is
    /// still safe to use.
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Barrier;
    use std::thread;

    use super::*;

    fn pool_with(dir: &tempfile::TempDir, max: usize, timeout: Duration) -> ConnectionPool {
        let config = PoolConfig::new(ConnectionOptions::new(dir.path().join("pool.db")))
            .max_size(max)
            .min_idle(1)
            .acquire_timeout(timeout);
        ConnectionPool::initialize(config).unwrap()
    }

    #[test]
    fn initialize_rejects_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        let base = PoolConfig::new(ConnectionOptions::new(dir.path().join("x.db")));
        assert!(matches!(
            ConnectionPool::initialize(base.clone().max_size(0)),
            Err(KnotError::Config(_))
        ));
        assert!(matches!(
            ConnectionPool::initialize(base.clone().max_size(2).min_idle(3)),
            Err(KnotError::Config(_))
        ));
        assert!(matches!(
            ConnectionPool::initialize(base.acquire_timeout(Duration::ZERO)),
            Err(KnotError::Config(_))
        ));
    }

    #[test]
    fn initialize_fails_fast_when_unreachable() {
        let config = PoolConfig::new(ConnectionOptions::new("/nonexistent-dir/knot/pool.db"));
        assert!(matches!(
            ConnectionPool::initialize(config),
            Err(KnotError::ConnectionInvalid(_))
        ));
    }

    #[test]
    fn initialize_warms_min_idle() {
        let dir = tempfile::tempdir().unwrap();
        let config = PoolConfig::new(ConnectionOptions::new(dir.path().join("w.db")))
            .max_size(4)
            .min_idle(3);
        let pool = ConnectionPool::initialize(config).unwrap();
        let stats = pool.stats();
        assert_eq!(stats.idle, 3);
        assert_eq!(stats.issued, 0);
        assert_eq!(stats.created, 3);
    }

    #[test]
    fn acquire_release_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(&dir, 2, Duration::from_secs(1));
        {
            let conn = pool.acquire().unwrap();
            assert!(conn.is_valid());
            let stats = pool.stats();
            assert_eq!((stats.idle, stats.issued), (0, 1));
        }
        let stats = pool.stats();
        assert_eq!((stats.idle, stats.issued), (1, 0));
    }

    #[test]
    fn idle_connections_reused_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(&dir, 3, Duration::from_secs(1));
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        let (id_a, id_b) = (a.id(), b.id());
        drop(a);
        drop(b);
        assert_eq!(pool.acquire().unwrap().id(), id_a);
        // The first guard above went back to the tail of the queue.
        assert_eq!(pool.acquire().unwrap().id(), id_b);
    }

    #[test]
    fn times_out_when_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(&dir, 1, Duration::from_millis(100));
        let _held = pool.acquire().unwrap();
        let started = Instant::now();
        let err = pool.acquire().unwrap_err();
        assert!(matches!(err, KnotError::ConnectionUnavailable { .. }));
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(pool.stats().timeouts, 1);
    }

    #[test]
    fn invalid_connection_is_discarded_and_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(&dir, 1, Duration::from_secs(1));
        let first_id = {
            let conn = pool.acquire().unwrap();
            conn.mark_invalid();
            conn.id()
        };
        let stats = pool.stats();
        assert_eq!((stats.idle, stats.issued, stats.discarded), (0, 0, 1));

        let replacement = pool.acquire().unwrap();
        assert_ne!(replacement.id(), first_id);
        assert!(replacement.is_valid());
    }

    #[test]
    fn open_transaction_on_release_discards() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(&dir, 1, Duration::from_secs(1));
        {
            let conn = pool.acquire().unwrap();
            conn.execute_batch("BEGIN IMMEDIATE").unwrap();
        }
        let stats = pool.stats();
        assert_eq!((stats.idle, stats.issued, stats.discarded), (0, 0, 1));
    }

    #[test]
    fn release_on_panic() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(&dir, 1, Duration::from_secs(1));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _conn = pool.acquire().unwrap();
            panic!("handler failed");
        }));
        assert!(result.is_err());
        let stats = pool.stats();
        assert_eq!((stats.idle, stats.issued), (1, 0));
        assert!(pool.acquire().is_ok());
    }

    #[test]
    fn close_rejects_acquire_and_discards_returns() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(&dir, 2, Duration::from_secs(1));
        let held = pool.acquire().unwrap();
        pool.close();
        assert!(pool.is_closed());
        assert!(matches!(pool.acquire(), Err(KnotError::PoolClosed)));
        drop(held);
        let stats = pool.stats();
        assert_eq!((stats.idle, stats.issued), (0, 0));
    }

    #[test]
    fn close_wakes_waiters() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(&dir, 1, Duration::from_secs(10));
        let held = pool.acquire().unwrap();
        thread::scope(|s| {
            let waiter = s.spawn(|| pool.acquire().map(|_| ()));
            thread::sleep(Duration::from_millis(100));
            pool.close();
            let started = Instant::now();
            assert!(matches!(waiter.join().unwrap(), Err(KnotError::PoolClosed)));
            assert!(started.elapsed() < Duration::from_secs(5));
        });
        drop(held);
    }

    #[test]
    fn concurrent_acquires_get_distinct_connections() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(&dir, 4, Duration::from_secs(5));
        let barrier = Barrier::new(4);
        let ids: Vec<u64> = thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        let conn = pool.acquire().unwrap();
                        // Hold until everyone has one.
                        barrier.wait();
                        conn.id()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let unique: HashSet<u64> = ids.iter().copied().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn never_exceeds_max_under_contention() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_with(&dir, 3, Duration::from_secs(10));
        let peak = AtomicU64::new(0);
        thread::scope(|s| {
            for _ in 0..12 {
                s.spawn(|| {
                    for _ in 0..20 {
                        let conn = pool.acquire().unwrap();
                        let stats = pool.stats();
                        assert!(stats.idle + stats.issued <= stats.max_size);
                        peak.fetch_max(stats.issued as u64, Ordering::Relaxed);
                        conn.ping();
                    }
                });
            }
        });
        assert!(peak.load(Ordering::Relaxed) <= 3);
        let stats = pool.stats();
        assert_eq!(stats.issued, 0);
        assert!(stats.created <= 3);
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(16))]

        /// Any sequence of acquires and releases keeps the pool within bounds.
        #[test]
        fn bounded_under_arbitrary_sequences(ops in proptest::collection::vec(proptest::bool::ANY, 1..40), max in 1usize..4) {
            let dir = tempfile::tempdir().unwrap();
            let pool = pool_with(&dir, max, Duration::from_millis(10));
            let mut held = Vec::new();
            for acquire in ops {
                if acquire {
                    match pool.acquire() {
                        Ok(conn) => held.push(conn),
                        Err(e) => {
                            let timed_out_at_max =
                                matches!(e, KnotError::ConnectionUnavailable { .. }) && held.len() == max;
                            proptest::prop_assert!(timed_out_at_max, "unexpected acquire failure: {}", e);
                        }
                    }
                } else {
                    held.pop();
                }
                let stats = pool.stats();
                proptest::prop_assert_eq!(stats.issued, held.len());
                proptest::prop_assert!(stats.idle + stats.issued <= max);
            }
        }
    }
}
