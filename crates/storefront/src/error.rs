//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. Route handlers that cannot degrade gracefully
//! return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::backend::BackendError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Backend(err) => match err.status() {
                Some(StatusCode::NOT_FOUND) => StatusCode::NOT_FOUND,
                Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => StatusCode::UNAUTHORIZED,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose backend or internal details to clients
        let message = match &self {
            Self::Internal(_) => "Internal server error".to_string(),
            Self::Backend(_) => match status {
                StatusCode::NOT_FOUND => "Not found".to_string(),
                StatusCode::UNAUTHORIZED => "Please sign in again".to_string(),
                _ => "The shop is temporarily unavailable".to_string(),
            },
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the signed-in visitor.
///
/// Call this after resolving the current user to associate errors with them.
pub fn set_sentry_user(user_id: &impl ToString, username: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: Some(username.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn http_error(status: StatusCode) -> AppError {
        AppError::Backend(BackendError::Http {
            status,
            detail: Some("Secret backend detail".to_string()),
            body: json!({"detail": "Secret backend detail"}),
        })
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::Internal("session layer missing".to_string());
        assert_eq!(err.to_string(), "Internal error: session layer missing");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            let response = err.into_response();
            response.status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(http_error(StatusCode::INTERNAL_SERVER_ERROR)),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(http_error(StatusCode::NOT_FOUND)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(http_error(StatusCode::FORBIDDEN)),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_backend_detail_is_not_leaked() {
        let response = http_error(StatusCode::BAD_REQUEST).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        let text = String::from_utf8_lossy(&body);
        assert!(!text.contains("Secret backend detail"));
    }
}
