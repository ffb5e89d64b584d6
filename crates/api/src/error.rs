//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga::{DownstreamError, SagaError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// The request body could not be read.
    BadRequest(String),
    /// The purchase failed.
    Saga(SagaError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Saga(SagaError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Saga(SagaError::StepFailed { source, .. }) => {
                downstream_status(source.last_error())
            }
        }
    }
}

/// Exhausted retries report the status of the attempt that ended them.
fn downstream_status(err: &DownstreamError) -> StatusCode {
    match err {
        DownstreamError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        DownstreamError::ConnectionFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
        DownstreamError::UnexpectedStatus { .. } | DownstreamError::DecodeFailure(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Saga(err) => {
                if status.is_server_error() {
                    tracing::error!(error = %err, kind = ?err.kind(), "purchase failed");
                }
                err.to_string()
            }
        };

        let body = serde_json::json!({ "success": false, "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}
