//! Application error type mapping to HTTP status codes and envelope format.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use answerpool_types::error::PoolError;

use super::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Pool(PoolError),
    /// Malformed request input.
    Validation(String),
}

impl From<PoolError> for AppError {
    fn from(e: PoolError) -> Self {
        AppError::Pool(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, Option<serde_json::Value>) {
        match self {
            AppError::Pool(PoolError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "PROVIDER_NOT_FOUND", None)
            }
            AppError::Pool(PoolError::NoAvailableProvider { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "NO_AVAILABLE_PROVIDER", None)
            }
            AppError::Pool(PoolError::AllProvidersExhausted { attempts }) => (
                StatusCode::BAD_GATEWAY,
                "ALL_PROVIDERS_EXHAUSTED",
                serde_json::to_value(attempts).ok(),
            ),
            AppError::Pool(PoolError::Cancelled) => {
                (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED", None)
            }
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", None),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Pool(e) => write!(f, "{e}"),
            AppError::Validation(msg) => f.write_str(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, details) = self.parts();
        if status.is_server_error() {
            tracing::warn!(code, error = %self, "Request failed");
        }
        let body = ApiResponse::error(code, self.to_string(), details);
        (status, Json(body)).into_response()
    }
}
