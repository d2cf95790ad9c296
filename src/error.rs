//! Error taxonomy for the HTTP surface.
//!
//! `NotFound` and `Forbidden` on task operations are deliberately collapsed
//! into one opaque [`ApiError::Rejected`] so a non-owner cannot learn
//! whether a task id exists.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Errors surfaced to API clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No or invalid session. Surfaced as 401; the UI redirects to login.
    #[error("authentication required")]
    Unauthenticated,

    /// Login failed. One message for unknown email and wrong password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Malformed input; the message names the offending field.
    #[error("{0}")]
    Validation(String),

    /// Duplicate email at registration.
    #[error("{0}")]
    Conflict(String),

    /// Target missing or owned by someone else. One message for both.
    #[error("not found")]
    Rejected,

    /// Anything unanticipated. Detail goes to the log, not the client.
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Rejected => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<crate::store::StoreError> for ApiError {
    fn from(e: crate::store::StoreError) -> Self {
        use crate::store::StoreError;
        match e {
            // Missing task, foreign task, and missing user row all
            // collapse into the same opaque rejection.
            StoreError::Rejected | StoreError::UserNotFound => ApiError::Rejected,
            StoreError::EmailTaken => ApiError::Conflict("email already in use".to_string()),
            StoreError::Corrupt(_) | StoreError::Sqlite(_) => {
                ApiError::Internal(anyhow::Error::new(e))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(e) => {
                tracing::error!("internal error: {:#}", e);
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_is_opaque() {
        // Same status and message regardless of whether the task exists.
        assert_eq!(ApiError::Rejected.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Rejected.to_string(), "not found");
    }

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            ApiError::Unauthenticated.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Validation("password must be at least 6 characters".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Conflict("email already in use".into()).status(),
            StatusCode::CONFLICT
        );
    }
}
