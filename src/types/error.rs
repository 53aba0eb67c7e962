//! Error Types

use crate::auth::{PasswordError, TokenError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("User not found")]
    UserNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    #[error("Missing bearer token")]
    MissingToken,

    #[error("Unauthorized: {0}")]
    Unauthorized(#[source] TokenError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("User store error: {0}")]
    Store(String),

    #[error("Password error: {0}")]
    Password(#[from] PasswordError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status the boundary layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::UserNotFound
            | AuthError::InvalidCredentials
            | AuthError::MissingToken
            | AuthError::Unauthorized(_) => 401,
            AuthError::UsernameTaken(_) => 409,
            AuthError::InvalidRequest(_) => 400,
            AuthError::PayloadTooLarge { .. } => 413,
            AuthError::Store(_) | AuthError::Password(_) | AuthError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for error bodies
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::UsernameTaken(_) => "USERNAME_TAKEN",
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::Unauthorized(TokenError::Expired) => "TOKEN_EXPIRED",
            AuthError::Unauthorized(_) => "INVALID_TOKEN",
            AuthError::InvalidRequest(_) => "INVALID_REQUEST",
            AuthError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            AuthError::Store(_) | AuthError::Password(_) | AuthError::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }

    /// Render as the JSON error body used by the HTTP boundary
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.code(),
                "message": self.to_string()
            }
        })
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
