// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Knot backend.
//!
//! Expected conditions (a duplicate interaction row, a counter already at
//! zero) are not errors. They travel as outcome values from the storage
//! layer. Everything here is either a resource failure, a failed statement,
//! or a request that the service layer refuses.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across storage, services, and the gateway.
#[derive(Debug, Error)]
pub enum KnotError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// The pool stayed exhausted for the whole acquire timeout.
    #[error("no database connection available within {timeout:?}")]
    ConnectionUnavailable { timeout: Duration },

    /// A connection failed its liveness check or hit a fatal driver error.
    #[error("database connection is not usable: {0}")]
    ConnectionInvalid(String),

    /// The pool has been closed and no longer hands out connections.
    #[error("connection pool is closed")]
    PoolClosed,

    /// The start-transaction statement failed; the transaction never began.
    ///
    /// `busy` is set when another writer held the database lock for the
    /// whole busy timeout.
    #[error("failed to start transaction: {source}")]
    TransactionStartFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
        busy: bool,
    },

    /// Commit or rollback requested from a state that does not allow it.
    #[error("cannot {operation} a transaction in state {state}")]
    TransactionState {
        operation: &'static str,
        state: String,
    },

    /// A SQL statement failed to prepare or execute.
    #[error("statement failed: {source}")]
    Statement {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The request was well-formed but carried an unacceptable value.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request conflicts with existing state (e.g. a taken username).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller is authenticated but may not perform the action.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Missing, malformed, or expired credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl KnotError {
    /// Shorthand for a [`KnotError::NotFound`] with a displayable id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Wraps any driver error as a statement failure.
    pub fn statement(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Statement {
            source: Box::new(err),
        }
    }

    /// Whether a caller may reasonably retry the same request later.
    ///
    /// Pool exhaustion, discarded connections and write-lock contention are
    /// transient; everything else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionUnavailable { .. }
                | Self::ConnectionInvalid(_)
                | Self::TransactionStartFailed { busy: true, .. }
        )
    }

    /// Whether the failure came from the connection layer or the store
    /// rather than the request.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionUnavailable { .. }
                | Self::ConnectionInvalid(_)
                | Self::PoolClosed
                | Self::TransactionStartFailed { busy: true, .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(
            KnotError::ConnectionUnavailable {
                timeout: Duration::from_secs(1)
            }
            .is_retryable()
        );
        assert!(KnotError::ConnectionInvalid("ping failed".into()).is_retryable());
        assert!(!KnotError::PoolClosed.is_retryable());
        assert!(!KnotError::Validation("empty".into()).is_retryable());
    }

    #[test]
    fn busy_start_is_transient() {
        let busy = KnotError::TransactionStartFailed {
            source: Box::new(std::io::Error::other("database is locked")),
            busy: true,
        };
        assert!(busy.is_retryable());
        assert!(busy.is_unavailable());

        let other = KnotError::TransactionStartFailed {
            source: Box::new(std::io::Error::other("cannot start a transaction within a transaction")),
            busy: false,
        };
        assert!(!other.is_retryable());
        assert!(!other.is_unavailable());
    }

    #[test]
    fn pool_closed_counts_as_unavailable() {
        assert!(KnotError::PoolClosed.is_unavailable());
        assert!(!KnotError::not_found("post", 7).is_unavailable());
    }

    #[test]
    fn display_messages() {
        let err = KnotError::not_found("post", 42);
        assert_eq!(err.to_string(), "post not found: 42");

        let err = KnotError::TransactionState {
            operation: "commit",
            state: "Committed".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot commit a transaction in state Committed"
        );

        let err = KnotError::statement(std::io::Error::other("disk full"));
        assert_eq!(err.to_string(), "statement failed: disk full");
    }
}
