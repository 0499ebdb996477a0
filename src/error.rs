//! Error types

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Reasons a single rewrite leaves its input untouched.
///
/// None of these reach the caller of a public entry point: every entry point
/// maps them back to "return the input unchanged".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewriteError {
    #[error("CDN link is not configured")]
    ConfigDisabled,
    #[error("not a rewritable image extension: {0}")]
    UnrecognizedExtension(String),
    #[error("unknown image size preset: {0}")]
    UnknownSizePreset(String),
    #[error("malformed URL: {0}")]
    MalformedUrl(String),
    #[error("unknown attachment: {0}")]
    UnknownAttachment(u64),
}

/// Errors surfaced by the HTTP layer
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_error_messages() {
        assert_eq!(
            RewriteError::UnknownSizePreset("huge".to_string()).to_string(),
            "unknown image size preset: huge"
        );
        assert_eq!(RewriteError::ConfigDisabled.to_string(), "CDN link is not configured");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            AppError::BadRequest("nope".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Unauthorized.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Internal("boom".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
