// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Narrow interfaces for collaborators the services depend on but do not own.
//!
//! Services hold these behind `Arc<dyn ...>` so tests can swap in cheap
//! implementations (argon2 with production parameters is slow).

use crate::error::KnotError;
use crate::types::UserId;

/// One-way password hashing.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password into a self-describing string.
    fn hash(&self, password: &str) -> Result<String, KnotError>;

    /// Checks a plaintext password against a stored hash.
    ///
    /// A malformed stored hash verifies as `false`, never as an error.
    fn verify(&self, password: &str, stored_hash: &str) -> bool;
}

/// Issues and validates bearer tokens.
pub trait TokenAuthority: Send + Sync {
    fn issue(&self, user_id: UserId) -> Result<String, KnotError>;

    /// Returns the user the token was issued for.
    ///
    /// Fails with [`KnotError::Unauthorized`] for malformed, forged, or
    /// expired tokens.
    fn verify(&self, token: &str) -> Result<UserId, KnotError>;
}

/// Generates public identifiers for comments, shares, and share links.
pub trait IdGenerator: Send + Sync {
    /// A unique id with a readable prefix, e.g. `cmt_3f9a...`.
    fn next_id(&self, prefix: &str) -> String;

    /// A short code for share links.
    fn short_code(&self) -> String;
}
