//! Validation HTTP handler.

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    error::AppError,
    models::validation::{ValidationQuery, ValidationResponse},
    state::AppState,
};

/// Validate (and redeem) a scanned ticket code.
///
/// # Endpoint
///
/// `GET /api/v1/validate/{code}?validator=&device=&location=`
///
/// # Response (200)
///
/// Always a structured outcome: `not_found`, `already_used` (with the original
/// redemption time) or `valid` (with the ticket snapshot). See
/// `ValidationResponse` for the exact shapes.
///
/// # Errors
///
/// - 503 `store_unavailable`: the store failed or did not answer in time. A
///   redemption that was already under way may still complete; its scan is
///   then recorded, and a retry reports `already_used` with this scanner's
///   stamp
pub async fn validate_ticket(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<ValidationQuery>,
) -> Result<Json<ValidationResponse>, AppError> {
    let validation = state.engine.validate(&code, query.into()).await?;

    Ok(Json(validation.into()))
}
