// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Explicit transaction lifecycle on a single connection.
//!
//! `begin()` issues `BEGIN IMMEDIATE`, which takes SQLite's write lock up
//! front. Two writers therefore queue on `busy_timeout` at begin instead of
//! both reading and then failing to upgrade, which is what serializes
//! concurrent counter updates.

use knot_core::KnotError;
use rusqlite::Params;
use strum::Display;
use tracing::{debug, warn};

use crate::connection::{is_busy, Connection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TxState {
    NotStarted,
    Active,
    Committed,
    RolledBack,
}

/// A transaction borrowed from a connection.
///
/// Dropping a transaction that is still [`TxState::Active`] rolls it back.
/// If that rollback fails the connection is marked invalid so the pool does
/// not reuse a handle with a transaction stuck open.
pub struct Transaction<'c> {
    conn: &'c Connection,
    state: TxState,
}

impl<'c> Transaction<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            state: TxState::NotStarted,
        }
    }

    /// `new` followed by `begin`.
    pub fn start(conn: &'c Connection) -> Result<Self, KnotError> {
        let mut tx = Self::new(conn);
        tx.begin()?;
        Ok(tx)
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TxState::Active
    }

    /// The connection the transaction runs on, for reads inside it.
    pub fn connection(&self) -> &'c Connection {
        self.conn
    }

    /// Starts the transaction. On failure the state stays `NotStarted`.
    pub fn begin(&mut self) -> Result<(), KnotError> {
        if self.state != TxState::NotStarted {
            return Err(self.state_error("begin"));
        }
        if let Err(e) = self.conn.raw().execute_batch("BEGIN IMMEDIATE") {
            let busy = is_busy(&e);
            warn!(conn_id = self.conn.id(), busy, error = %e, "failed to begin transaction");
            return Err(match self.conn.classify(e) {
                KnotError::Statement { source } => KnotError::TransactionStartFailed { source, busy },
                other => other,
            });
        }
        self.state = TxState::Active;
        debug!(conn_id = self.conn.id(), "transaction started");
        Ok(())
    }

    /// Commits. If COMMIT fails a rollback is attempted and the transaction
    /// ends `RolledBack`; the commit error is returned.
    pub fn commit(&mut self) -> Result<(), KnotError> {
        if self.state != TxState::Active {
            return Err(self.state_error("commit"));
        }
        match self.conn.raw().execute_batch("COMMIT") {
            Ok(()) => {
                self.state = TxState::Committed;
                debug!(conn_id = self.conn.id(), "transaction committed");
                Ok(())
            }
            Err(e) => {
                warn!(conn_id = self.conn.id(), error = %e, "commit failed, rolling back");
                self.state = TxState::RolledBack;
                if !self.conn.is_autocommit() && self.conn.raw().execute_batch("ROLLBACK").is_err() {
                    self.conn.mark_invalid();
                }
                Err(self.conn.classify(e))
            }
        }
    }

    /// Rolls back. The transaction ends `RolledBack` even if ROLLBACK fails,
    /// in which case the connection is marked invalid.
    pub fn rollback(&mut self) -> Result<(), KnotError> {
        if self.state != TxState::Active {
            return Err(self.state_error("rollback"));
        }
        self.state = TxState::RolledBack;
        match self.conn.raw().execute_batch("ROLLBACK") {
            Ok(()) => {
                debug!(conn_id = self.conn.id(), "transaction rolled back");
                Ok(())
            }
            Err(e) => {
                self.conn.mark_invalid();
                Err(self.conn.classify(e))
            }
        }
    }

    /// Runs a statement inside the transaction.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize, KnotError> {
        self.ensure_active("execute in")?;
        self.conn.execute(sql, params)
    }

    pub(crate) fn ensure_active(&self, operation: &'static str) -> Result<(), KnotError> {
        if self.state == TxState::Active {
            Ok(())
        } else {
            Err(self.state_error(operation))
        }
    }

    fn state_error(&self, operation: &'static str) -> KnotError {
        KnotError::TransactionState {
            operation,
            state: self.state.to_string(),
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state != TxState::Active {
            return;
        }
        warn!(
            conn_id = self.conn.id(),
            "transaction dropped while active, rolling back"
        );
        self.state = TxState::RolledBack;
        if let Err(e) = self.conn.raw().execute_batch("ROLLBACK") {
            warn!(conn_id = self.conn.id(), error = %e, "automatic rollback failed");
            self.conn.mark_invalid();
        }
    }
}
