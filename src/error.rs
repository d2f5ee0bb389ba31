use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::error;

#[derive(Debug, ThisError)]
pub enum PortalError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Session token generation failed: {0}")]
    TokenGeneration(String),

    #[error("Missing required field")]
    MissingFields,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,
}

impl From<password_hash::Error> for PortalError {
    fn from(e: password_hash::Error) -> Self {
        PortalError::PasswordHash(e.to_string())
    }
}

impl From<argon2::Error> for PortalError {
    fn from(e: argon2::Error) -> Self {
        PortalError::PasswordHash(e.to_string())
    }
}

impl PortalError {
    /// Redirect-friendly indicator for form errors, e.g. `/register?error=email_taken`.
    pub fn indicator(&self) -> &'static str {
        match self {
            PortalError::MissingFields => "missing_fields",
            PortalError::EmailTaken => "email_taken",
            PortalError::InvalidCredentials => "invalid_credentials",
            PortalError::NotFound => "not_found",
            PortalError::Forbidden => "forbidden",
            PortalError::DatabaseError(_)
            | PortalError::PasswordHash(_)
            | PortalError::TaskJoin(_)
            | PortalError::TokenGeneration(_) => "server_error",
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            PortalError::DatabaseError(_)
            | PortalError::PasswordHash(_)
            | PortalError::TaskJoin(_)
            | PortalError::TokenGeneration(_) => {
                error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.",
                )
            }
            PortalError::MissingFields => (StatusCode::BAD_REQUEST, "Missing required field."),
            PortalError::EmailTaken => (StatusCode::BAD_REQUEST, "Email already registered."),
            PortalError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid email or password.")
            }
            PortalError::NotFound => (StatusCode::NOT_FOUND, "Not found."),
            PortalError::Forbidden => (StatusCode::FORBIDDEN, "Access denied."),
        };
        (status, message).into_response()
    }
}
