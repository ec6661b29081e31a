// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed queries per table.
//!
//! Reads take a [`Connection`](crate::Connection); writes that must move a
//! counter take a [`Transaction`](crate::Transaction). Expected conditions
//! (missing row, duplicate row) come back as `Option`, `bool`, or outcome
//! values, never as errors.

pub mod comments;
pub mod follows;
pub mod links;
pub mod posts;
pub mod reactions;
pub mod shares;
pub mod users;
