// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential handling for Knot: argon2id password hashes and
//! HMAC-SHA256 signed bearer tokens.

pub mod password;
pub mod token;

pub use password::Argon2Hasher;
pub use token::HmacTokenAuthority;
