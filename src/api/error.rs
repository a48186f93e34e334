//! HTTP mapping for service errors
//!
//! Every handler funnels `hostbridge_core::Error` through [`ApiError`] so
//! the taxonomy maps to status codes in exactly one place. Error bodies are
//! always `{"error": "<message>"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use hostbridge_core::Error;

/// Response adapter for service-level errors.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidArgument(_) | Error::FailedPrecondition(_) => StatusCode::BAD_REQUEST,
            // A missing file surfaces as not-found, not as a server fault.
            Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            Error::Io(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

/// Result alias for handler return types.
pub type ApiResult<T> = Result<T, ApiError>;
