use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use boutique_core::crypto::CryptoError;
use boutique_core::error::CoreError;
use boutique_core::oauth_state::StateError;
use boutique_pos::PosError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain, persistence, vault and provider errors and adds
/// HTTP-specific variants. Implements [`IntoResponse`] to produce
/// consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `boutique_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A provider adapter or registry error.
    #[error(transparent)]
    Pos(#[from] PosError),

    /// Token encryption or decryption failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The OAuth `state` parameter was unusable.
    #[error(transparent)]
    OAuthState(#[from] StateError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// HTTP status, error code and client-safe message for this error.
    pub fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),

            // --- Provider errors ---
            AppError::Pos(err) => classify_pos_error(err),

            // --- Vault errors ---
            AppError::Crypto(err) => {
                tracing::error!(error = %err, "Token vault error");
                internal()
            }

            // --- OAuth state ---
            AppError::OAuthState(err) => {
                let code = match err {
                    StateError::Expired => "STATE_EXPIRED",
                    StateError::Malformed | StateError::ProviderMismatch { .. } => "INVALID_STATE",
                };
                (StatusCode::BAD_REQUEST, code, err.to_string())
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.classify();

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// Classify a provider error.
///
/// Configuration and input problems are the caller's; upstream failures are
/// logged with their detail and answered with a generic message.
fn classify_pos_error(err: &PosError) -> (StatusCode, &'static str, String) {
    match err {
        PosError::NotRegistered(provider) => (
            StatusCode::BAD_REQUEST,
            "UNSUPPORTED_PROVIDER",
            format!("Unsupported POS provider: {provider}"),
        ),
        PosError::Unsupported { .. } => {
            (StatusCode::BAD_REQUEST, "UNSUPPORTED_OPERATION", err.to_string())
        }
        PosError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        PosError::Api { .. } | PosError::Request(_) | PosError::Decode { .. } => {
            tracing::error!(error = %err, timeout = err.is_timeout(), "POS provider call failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PROVIDER_ERROR",
                "The POS provider request failed".to_string(),
            )
        }
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}
