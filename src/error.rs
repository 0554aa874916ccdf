//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.
//!
//! Validation outcomes (`not_found`, `already_used`, `valid`) are never
//! errors; they are regular 200 responses built by the validation handler.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::store::StoreError;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Store Errors**: The ticket store or ledger could not serve the request
/// - **Resource Errors**: Requested ticket not found (lookup endpoint only)
/// - **Validation Errors**: Invalid request data (e.g. malformed import)
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Storage backend failed or timed out.
    ///
    /// Returns HTTP 503 Service Unavailable. The caller may retry.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Requested ticket does not exist.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Ticket not found")]
    TicketNotFound,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `TicketNotFound` → 404 Not Found
/// - `InvalidRequest` → 400 Bad Request
/// - `Store` → 503 Service Unavailable (hides details from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::TicketNotFound => {
                (StatusCode::NOT_FOUND, "ticket_not_found", self.to_string())
            }
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Store(ref err) => {
                tracing::error!(error = %err, "Request failed on store error");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "store_unavailable",
                    "The ticket store is unavailable, please retry".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
