// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Input checks shared by the services.

use knot_core::KnotError;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 32;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 128;
pub const TITLE_MAX: usize = 200;
pub const DESCRIPTION_MAX: usize = 5000;
pub const COMMENT_MAX: usize = 1000;
pub const MESSAGE_MAX: usize = 500;
pub const BIO_MAX: usize = 500;
pub const CLIENT_ID_MAX: usize = 64;

fn invalid(msg: impl Into<String>) -> KnotError {
    KnotError::Validation(msg.into())
}

pub fn username(name: &str) -> Result<(), KnotError> {
    let len = name.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(invalid(format!(
            "username must be {USERNAME_MIN} to {USERNAME_MAX} characters"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid(
            "username may contain only letters, digits, and underscores",
        ));
    }
    Ok(())
}

pub fn password(password: &str) -> Result<(), KnotError> {
    let len = password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(invalid(format!(
            "password must be {PASSWORD_MIN} to {PASSWORD_MAX} characters"
        )));
    }
    Ok(())
}

/// Non-blank text of at most `max` characters without control characters
/// (newlines and tabs allowed).
pub fn text(field: &str, value: &str, max: usize, required: bool) -> Result<(), KnotError> {
    if required && value.trim().is_empty() {
        return Err(invalid(format!("{field} must not be empty")));
    }
    if value.chars().count() > max {
        return Err(invalid(format!("{field} must be at most {max} characters")));
    }
    if value
        .chars()
        .any(|c| c.is_control() && c != '\n' && c != '\t' && c != '\r')
    {
        return Err(invalid(format!("{field} contains control characters")));
    }
    Ok(())
}

/// Client-chosen ids used for idempotent retries.
pub fn client_id(id: &str) -> Result<(), KnotError> {
    if id.is_empty()
        || id.len() > CLIENT_ID_MAX
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(invalid(format!(
            "client id must be 1 to {CLIENT_ID_MAX} characters of letters, digits, '_' or '-'"
        )));
    }
    Ok(())
}
