use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use nestguard_backends::StoreError;
use nestguard_core::SettingsError;
use serde::Serialize;

/// Failure of a protected lookup.
///
/// Cache and lock-coordinator failures never show up here; only the backing
/// store can fail a lookup.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("backing store failed: {0}")]
    Store(#[from] StoreError),

    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),
}

#[derive(Debug)]
pub enum AppError {
    /// Entidad no encontrada
    NotFound { resource: String, id: String },

    /// Backing store unavailable or timed out
    Unavailable(String),

    /// Parametros invalidos
    BadRequest(String),

    /// Error interno
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl From<LookupError> for AppError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::Store(e) if e.is_transient() => AppError::Unavailable(e.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                "Not Found",
                format!("No {} with id '{}'", resource, id),
            ),
            AppError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable", msg)
            },
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad Request", msg),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                msg,
            ),
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });

        (status, body).into_response()
    }
}
