// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-token authentication middleware.
//!
//! Requests must carry `Authorization: Bearer <token>`. A valid token puts
//! an [`AuthUser`] into the request extensions for handlers to extract.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use knot_core::{KnotError, UserId};

use crate::error::ApiError;
use crate::server::GatewayState;

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

/// Pulls the token out of an `Authorization` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub async fn auth_middleware(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| KnotError::Unauthorized("missing bearer token".into()))?;

    let user = state.tokens.verify(token)?;
    tracing::trace!(user_id = user, "request authenticated");
    request.extensions_mut().insert(AuthUser(user));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic dXNlcg=="), None);
    }
}
