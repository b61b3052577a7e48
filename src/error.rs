//! Error types for the recipes service.
//!
//! Each dependency has its own error enum; `AppError` is the HTTP-facing type
//! that handlers return. Internal causes are logged when the response is built
//! and never serialized into the body.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures of the document store (Sled).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("document not found")]
    NotFound,
    #[error("sled: {0}")]
    Sled(#[from] sled::Error),
    #[error("document codec: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Failures of the listing cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("cached snapshot is unreadable: {0}")]
    Corrupt(#[source] serde_json::Error),
}

/// Why a presented token was not accepted. Logged only; callers always see 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenRejection {
    #[error("malformed token")]
    Malformed,
    #[error("invalid signature")]
    Invalid,
    #[error("token expired")]
    Expired,
}

/// Failures of sign-in, token issuance and token verification.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown user or wrong secret. The two cases are deliberately merged.
    #[error("invalid username or password")]
    Unauthenticated,
    #[error("token rejected: {0}")]
    Rejected(#[from] TokenRejection),
    #[error("password hashing: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("token signing: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("credential store: {0}")]
    Storage(#[from] StorageError),
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Startup configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
}

/// Error returned by handlers and the recipe service.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("recipe not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Store(#[source] StorageError),
    #[error("cache unavailable: {0}")]
    Cache(#[from] CacheError),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("request timed out")]
    Timeout,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Timeout => StatusCode::REQUEST_TIMEOUT,
            AppError::Store(_) | AppError::Cache(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Validation(message) => message.clone(),
            AppError::Unauthorized => "Unauthorized".to_string(),
            AppError::NotFound => "Recipe not found".to_string(),
            AppError::Timeout => "Request timed out".to_string(),
            AppError::Store(_) | AppError::Cache(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => AppError::NotFound,
            other => AppError::Store(other),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated | AuthError::Rejected(_) => AppError::Unauthorized,
            AuthError::Storage(inner) => AppError::Store(inner),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Store(err) => tracing::error!(dependency = "store", error = %err, "request failed"),
            AppError::Cache(err) => tracing::error!(dependency = "cache", error = %err, "request failed"),
            AppError::Internal(err) => tracing::error!(error = %err, "request failed"),
            AppError::Timeout => tracing::warn!("request deadline exceeded"),
            _ => tracing::debug!(error = %self, "request rejected"),
        }
        let status = self.status();
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
