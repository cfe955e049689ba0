use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::{auth::service::AuthError, db::StoreError, validation::ValidationError};

/// Errors a handler can return; each maps onto one HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Not authorized to access this activity")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Store(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateUsername(_) => Self::Conflict("Username already registered".into()),
            StoreError::NotFound(_) => Self::NotFound("User"),
            other => Self::Store(other),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::UnknownUser | AuthError::WrongPassword => Self::InvalidCredentials,
            AuthError::NoSession => Self::Unauthenticated,
            AuthError::Session(e) => Self::Session(e),
            AuthError::Store(e) => e.into(),
            AuthError::Internal(e) => Self::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = if status.is_server_error() {
            error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn credential_failures_are_indistinguishable() {
        let unknown: AppError = AuthError::UnknownUser.into();
        let wrong: AppError = AuthError::WrongPassword.into();
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(unknown.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn store_errors_map_to_taxonomy() {
        let dup: AppError = StoreError::DuplicateUsername("alice".into()).into();
        assert_eq!(dup.status_code(), StatusCode::CONFLICT);

        let missing: AppError = StoreError::NotFound(Uuid::new_v4()).into();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let db: AppError = StoreError::Database(sqlx::Error::PoolTimedOut).into();
        assert_eq!(db.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn server_errors_hide_details() {
        let resp = AppError::Internal(anyhow::anyhow!("secret detail")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
