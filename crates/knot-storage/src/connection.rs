// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A single pooled SQLite connection plus its validity flag.
//!
//! Every driver error passes through [`Connection::classify`], which marks
//! the connection invalid when the failure means the handle itself is
//! unusable. The pool discards invalid connections on release.

use std::cell::Cell;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use knot_core::KnotError;
use rusqlite::{ErrorCode, OptionalExtension, Params, Row};
use tracing::{debug, warn};

/// How to open each connection in the pool.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub path: PathBuf,
    pub busy_timeout: Duration,
    pub wal_mode: bool,
}

impl ConnectionOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_secs(5),
            wal_mode: true,
        }
    }
}

/// A live database handle owned by the pool or by exactly one
/// [`ScopedConnection`](crate::ScopedConnection).
///
/// `Connection` is `Send` but not `Sync`: it moves between threads through
/// the pool, and is used by one thread at a time.
pub struct Connection {
    id: u64,
    inner: rusqlite::Connection,
    valid: Cell<bool>,
    opened_at: Instant,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("valid", &self.valid.get())
            .field("age", &self.opened_at.elapsed())
            .finish()
    }
}

impl Connection {
    /// Opens the database file and applies the per-connection PRAGMAs.
    pub fn open(id: u64, options: &ConnectionOptions) -> Result<Self, KnotError> {
        let inner = rusqlite::Connection::open(&options.path).map_err(|e| {
            KnotError::ConnectionInvalid(format!(
                "cannot open {}: {e}",
                options.path.display()
            ))
        })?;

        apply_pragmas(&inner, options).map_err(|e| {
            KnotError::ConnectionInvalid(format!("failed to configure connection: {e}"))
        })?;

        debug!(conn_id = id, path = %options.path.display(), "opened database connection");
        Ok(Self {
            id,
            inner,
            valid: Cell::new(true),
            opened_at: Instant::now(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }

    pub fn is_valid(&self) -> bool {
        self.valid.get()
    }

    /// Flags the connection so the pool discards it instead of reusing it.
    pub fn mark_invalid(&self) {
        if self.valid.replace(false) {
            warn!(conn_id = self.id, "connection marked invalid");
        }
    }

    /// Liveness check. A failed `SELECT 1` marks the connection invalid.
    pub fn ping(&self) -> bool {
        if !self.is_valid() {
            return false;
        }
        match self.inner.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)) {
            Ok(_) => true,
            Err(e) => {
                warn!(conn_id = self.id, error = %e, "connection failed liveness check");
                self.mark_invalid();
                false
            }
        }
    }

    /// Whether no transaction is open on this handle.
    pub fn is_autocommit(&self) -> bool {
        self.inner.is_autocommit()
    }

    /// The underlying driver handle.
    pub fn raw(&self) -> &rusqlite::Connection {
        &self.inner
    }

    pub fn raw_mut(&mut self) -> &mut rusqlite::Connection {
        &mut self.inner
    }

    /// Runs one statement and returns the number of rows changed.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize, KnotError> {
        self.inner
            .execute(sql, params)
            .map_err(|e| self.classify(e))
    }

    /// Runs a batch of statements with no parameters.
    pub fn execute_batch(&self, sql: &str) -> Result<(), KnotError> {
        self.inner.execute_batch(sql).map_err(|e| self.classify(e))
    }

    /// Runs a query expected to return at most one row.
    pub fn query_optional<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<Option<T>, KnotError>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.inner
            .query_row(sql, params, map)
            .optional()
            .map_err(|e| self.classify(e))
    }

    /// Runs a query expected to return exactly one row.
    pub fn query_one<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<T, KnotError>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.inner
            .query_row(sql, params, map)
            .map_err(|e| self.classify(e))
    }

    /// Runs a query and collects every row.
    pub fn query_all<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<Vec<T>, KnotError>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self
            .inner
            .prepare_cached(sql)
            .map_err(|e| self.classify(e))?;
        let rows = stmt.query_map(params, map).map_err(|e| self.classify(e))?;
        rows.collect::<rusqlite::Result<Vec<T>>>()
            .map_err(|e| self.classify(e))
    }

    /// Converts a driver error into a [`KnotError`], invalidating this
    /// connection if the error means the handle can no longer be trusted.
    pub fn classify(&self, err: rusqlite::Error) -> KnotError {
        if is_fatal(&err) {
            self.mark_invalid();
            KnotError::ConnectionInvalid(err.to_string())
        } else {
            KnotError::statement(err)
        }
    }
}

/// Per-connection PRAGMAs. `journal_mode` is persistent in the file, the
/// rest must be set on every handle.
fn apply_pragmas(conn: &rusqlite::Connection, options: &ConnectionOptions) -> rusqlite::Result<()> {
    conn.busy_timeout(options.busy_timeout)?;
    if options.wal_mode {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    }
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA synchronous = NORMAL;",
    )
}

/// Errors after which the handle is not worth keeping.
fn is_fatal(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => matches!(
            e.code,
            ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::NotADatabase
                | ErrorCode::PermissionDenied
        ),
        _ => false,
    }
}

/// Whether an insert failed because the row already exists.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

/// Whether an insert referenced a parent row that does not exist.
pub fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

/// Whether another connection held the database lock past `busy_timeout`.
pub fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(1, &ConnectionOptions::new(dir.path().join("c.db"))).unwrap();
        (dir, conn)
    }

    #[test]
    fn pragmas_applied() {
        let (_dir, conn) = open_temp();
        let mode: String = conn
            .raw()
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
        let fk: i64 = conn
            .raw()
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn ping_and_invalidate() {
        let (_dir, conn) = open_temp();
        assert!(conn.ping());
        conn.mark_invalid();
        assert!(!conn.is_valid());
        assert!(!conn.ping());
    }

    #[test]
    fn unique_violation_detected() {
        let (_dir, conn) = open_temp();
        conn.execute_batch("CREATE TABLE t (k INTEGER NOT NULL UNIQUE);")
            .unwrap();
        conn.execute("INSERT INTO t (k) VALUES (1)", []).unwrap();
        let err = conn
            .raw()
            .execute("INSERT INTO t (k) VALUES (1)", [])
            .unwrap_err();
        assert!(is_unique_violation(&err));

        let err = conn.raw().execute("INSERT INTO missing VALUES (1)", []).unwrap_err();
        assert!(!is_unique_violation(&err));
    }

    #[test]
    fn statement_errors_keep_connection_valid() {
        let (_dir, conn) = open_temp();
        let err = conn.execute("SELEC 1", []).unwrap_err();
        assert!(matches!(err, KnotError::Statement { .. }));
        assert!(conn.is_valid());
    }

    #[test]
    fn query_helpers() {
        let (_dir, conn) = open_temp();
        conn.execute_batch("CREATE TABLE t (k INTEGER); INSERT INTO t VALUES (1), (2), (3);")
            .unwrap();
        let all = conn
            .query_all("SELECT k FROM t ORDER BY k", [], |r| r.get::<_, i64>(0))
            .unwrap();
        assert_eq!(all, vec![1, 2, 3]);
        let none = conn
            .query_optional("SELECT k FROM t WHERE k = 9", [], |r| r.get::<_, i64>(0))
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn open_failure_is_connection_invalid() {
        let err = Connection::open(
            1,
            &ConnectionOptions::new("/nonexistent-dir/knot/never.db"),
        )
        .unwrap_err();
        assert!(matches!(err, KnotError::ConnectionInvalid(_)));
    }
}
