//! Health check endpoint for service monitoring.

use crate::{error::AppError, models::ticket::now_micros, state::AppState};
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
///
/// Returns service status and storage connectivity.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status
    pub status: String,

    /// Storage connection status
    pub storage: String,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "online",
///   "storage": "connected",
///   "timestamp": "2025-06-01T19:00:00Z"
/// }
/// ```
///
/// # Response (503 Service Unavailable)
///
/// If the store is unreachable, returns standard error response.
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, AppError> {
    state.tickets.ping().await?;

    Ok(Json(HealthResponse {
        status: "online".to_string(),
        storage: "connected".to_string(),
        timestamp: now_micros(),
    }))
}
