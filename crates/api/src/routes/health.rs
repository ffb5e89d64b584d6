//! Health check endpoint.

use axum::Json;
use common::HealthResponse;

/// GET /health - returns gateway health status.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
