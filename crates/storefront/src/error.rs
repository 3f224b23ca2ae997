//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. Route handlers return `Result<T, AppError>` for
//! failures that are not reported through redirects.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::gigya::GigyaError;
use crate::services::ProfileError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Gigya operation failed.
    #[error("Gigya error: {0}")]
    Gigya(#[from] GigyaError),

    /// Profile flow failed.
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    const fn is_server_error(&self) -> bool {
        match self {
            Self::Database(_) | Self::Internal(_) | Self::Gigya(_) => true,
            Self::Profile(err) => matches!(
                err,
                ProfileError::Gigya(_)
                    | ProfileError::Save(_)
                    | ProfileError::Repository(_)
                    | ProfileError::PasswordHash
            ),
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Gigya(_) => StatusCode::BAD_GATEWAY,
            Self::Profile(err) => match err {
                ProfileError::NotFound => StatusCode::NOT_FOUND,
                ProfileError::InvalidSignature | ProfileError::AccountDeleted => {
                    StatusCode::UNAUTHORIZED
                }
                ProfileError::MissingFields(_)
                | ProfileError::Mapping(_)
                | ProfileError::AccountMismatch(_) => StatusCode::BAD_REQUEST,
                ProfileError::Gigya(_) => StatusCode::BAD_GATEWAY,
                ProfileError::Save(_) | ProfileError::Repository(_) | ProfileError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Gigya(_) => "External service error".to_string(),
            Self::Profile(err) => match err {
                ProfileError::NotFound => "Customer not found".to_string(),
                ProfileError::InvalidSignature => "Login could not be verified".to_string(),
                ProfileError::AccountDeleted => "This account is no longer available".to_string(),
                ProfileError::MissingFields(errors) => errors.messages().join("\n"),
                ProfileError::Mapping(_) | ProfileError::AccountMismatch(_) => {
                    "Invalid input".to_string()
                }
                ProfileError::Gigya(_) => "External service error".to_string(),
                ProfileError::Save(_) | ProfileError::Repository(_) | ProfileError::PasswordHash => {
                    "Internal server error".to_string()
                }
            },
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a customer ID.
///
/// Call this after successful authentication to associate errors with customers.
pub fn set_sentry_user(customer_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(customer_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the customer.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
