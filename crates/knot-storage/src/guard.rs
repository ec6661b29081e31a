// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scoped connection acquisition.

use std::ops::Deref;

use knot_core::KnotError;

use crate::connection::Connection;
use crate::pool::ConnectionPool;

/// Exclusive use of one pooled connection for the guard's lifetime.
///
/// The connection goes back to the pool exactly once, when the guard is
/// dropped, on every exit path including `?` returns and panics. The guard
/// is neither `Clone` nor `Copy`, and the connection is only lent out by
/// reference, so it cannot outlive the guard.
pub struct ScopedConnection<'p> {
    pool: &'p ConnectionPool,
    conn: Option<Connection>,
}

impl<'p> ScopedConnection<'p> {
    pub(crate) fn new(pool: &'p ConnectionPool, conn: Connection) -> Self {
        Self {
            pool,
            conn: Some(conn),
        }
    }

    /// Acquires from `pool`. Same as [`ConnectionPool::acquire`].
    pub fn acquire(pool: &'p ConnectionPool) -> Result<Self, KnotError> {
        pool.acquire()
    }

    pub fn connection(&self) -> &Connection {
        // Only `drop` takes the connection out.
        self.conn
            .as_ref()
            .expect("BUG: ScopedConnection used after release")
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        self.conn
            .as_mut()
            .expect("BUG: ScopedConnection used after release")
    }

    /// Whether the held connection is still usable.
    pub fn is_valid(&self) -> bool {
        self.conn.as_ref().is_some_and(Connection::is_valid)
    }

    /// The pool this guard returns to.
    pub fn pool(&self) -> &'p ConnectionPool {
        self.pool
    }
}

impl Deref for ScopedConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.connection()
    }
}

impl std::fmt::Debug for ScopedConnection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedConnection")
            .field("conn", &self.conn)
            .finish()
    }
}

impl Drop for ScopedConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::connection::ConnectionOptions;
    use crate::pool::PoolConfig;

    fn pool(dir: &tempfile::TempDir) -> ConnectionPool {
        ConnectionPool::initialize(
            PoolConfig::new(ConnectionOptions::new(dir.path().join("g.db")))
                .max_size(2)
                .acquire_timeout(Duration::from_millis(200)),
        )
        .unwrap()
    }

    fn fails_early(pool: &ConnectionPool) -> Result<(), KnotError> {
        let conn = ScopedConnection::acquire(pool)?;
        conn.execute("SELECT * FROM no_such_table", [])?;
        Ok(())
    }

    #[test]
    fn released_on_error_path() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool(&dir);
        assert!(fails_early(&pool).is_err());
        assert_eq!(pool.stats().issued, 0);
        assert_eq!(pool.stats().idle, 1);
    }

    #[test]
    fn released_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool(&dir);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        drop(a);
        // A double release would push the idle count past the opened total.
        drop(b);
        let stats = pool.stats();
        assert_eq!(stats.idle, 2);
        assert_eq!(stats.issued, 0);
        assert_eq!(stats.created, 2);
    }

    #[test]
    fn validity_tracks_connection() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool(&dir);
        let guard = pool.acquire().unwrap();
        assert!(guard.is_valid());
        guard.mark_invalid();
        assert!(!guard.is_valid());
        assert!(std::ptr::eq(guard.pool(), &pool));
    }

    #[test]
    fn guard_moves_across_threads() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool(&dir);
        let guard = pool.acquire().unwrap();
        std::thread::scope(|s| {
            s.spawn(move || {
                assert!(guard.ping());
            });
        });
        assert_eq!(pool.stats().issued, 0);
    }
}
