// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping from [`KnotError`] to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use knot_core::KnotError;
use serde_json::json;

/// A [`KnotError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub KnotError);

impl From<KnotError> for ApiError {
    fn from(err: KnotError) -> Self {
        Self(err)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self(KnotError::Internal(format!("request task failed: {err}")))
    }
}

/// Status code for an error. Connection-layer failures are 503 so clients
/// know to retry.
pub fn status_for(err: &KnotError) -> StatusCode {
    match err {
        KnotError::NotFound { .. } => StatusCode::NOT_FOUND,
        KnotError::Validation(_) => StatusCode::BAD_REQUEST,
        KnotError::Conflict(_) => StatusCode::CONFLICT,
        KnotError::Forbidden(_) => StatusCode::FORBIDDEN,
        KnotError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        e if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = match status {
            StatusCode::SERVICE_UNAVAILABLE => {
                tracing::warn!(error = %self.0, "request failed: store unavailable");
                "temporarily unavailable".to_string()
            }
            StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %self.0, "request failed");
                "internal server error".to_string()
            }
            _ => self.0.to_string(),
        };
        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, axum::http::HeaderValue::from_static("1"));
        }
        response
    }
}
