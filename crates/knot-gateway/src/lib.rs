// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP API for the Knot backend.
//!
//! JSON over axum. The services underneath are synchronous and hold a
//! pooled connection for the length of a call, so every handler runs its
//! service call on tokio's blocking thread pool.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::AuthUser;
pub use error::ApiError;
pub use server::{router, start_server, GatewayState, ServerConfig};
