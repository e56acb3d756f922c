//! Liveness endpoint.
//!
//! `GET /health` needs no API key and never touches the item store. It is
//! still counted by the rate limiter like every other request.

use axum::Json;
use tracing::instrument;

use crate::models::HealthResponse;

/// Health check endpoint.
///
/// # Response Body
///
/// ```json
/// { "status": "ok" }
/// ```
#[instrument]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
