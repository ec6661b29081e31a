// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Knot social backend.
//!
//! Provides a bounded blocking [`ConnectionPool`], the [`ScopedConnection`]
//! guard that returns connections on every exit path, explicit
//! [`Transaction`]s with rollback on drop, the counter protocol in
//! [`counter`], embedded migrations, and typed queries per table.

pub mod connection;
pub mod counter;
pub mod guard;
pub mod migrations;
pub mod pool;
pub mod queries;
pub mod transaction;

pub use connection::{Connection, ConnectionOptions};
pub use counter::{
    add_interaction, remove_interaction, Counter, CounterOutcome, DeleteOutcome, InsertOutcome,
    Interaction,
};
pub use guard::ScopedConnection;
pub use pool::{ConnectionPool, PoolConfig, PoolStats};
pub use transaction::{Transaction, TxState};
