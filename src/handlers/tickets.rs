//! Ticket HTTP handlers.
//!
//! This module implements the ticket management endpoints:
//! - POST /api/v1/tickets/import - Bulk upsert from a CSV upload
//! - GET /api/v1/tickets/:code - Get ticket by code

use axum::{
    Json,
    extract::{Multipart, Path, State},
};

use crate::{
    error::AppError,
    models::{
        import::ImportResponse,
        ticket::{Ticket, now_micros},
    },
    services::import_service,
    state::AppState,
};

/// Multipart field carrying the CSV file.
const FILE_FIELD: &str = "file";

/// Import tickets from a CSV file.
///
/// # Request
///
/// `multipart/form-data` with the file in field `file`. Other fields are ignored.
///
/// # Response (200)
///
/// ```json
/// {
///   "success": true,
///   "message": "Imported 120 tickets",
///   "imported": 120,
///   "errors": ["Row 7: invalid price 'gratis'"]
/// }
/// ```
///
/// Rows that fail to parse are skipped and reported (first 5 only); the other
/// rows are imported.
///
/// # Errors
///
/// - 400 `invalid_request`: no `file` field, empty file, or no CSV header
/// - 503 `store_unavailable`: the ticket store failed
pub async fn import_tickets(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ImportResponse>, AppError> {
    let mut payload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() == Some(FILE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::InvalidRequest(format!("Could not read upload: {e}")))?;
            payload = Some(bytes);
            break;
        }
    }

    let payload = payload
        .ok_or_else(|| AppError::InvalidRequest(format!("Missing `{FILE_FIELD}` field")))?;

    let report = import_service::import_csv(
        state.tickets.as_ref(),
        &payload,
        state.reimport_policy,
        now_micros(),
    )
    .await?;

    Ok(Json(report.into()))
}

/// Get a ticket by code.
///
/// Read-only: does not redeem the ticket and does not write to the scan ledger.
///
/// # Errors
///
/// - 404 `ticket_not_found`: no ticket with that code
pub async fn get_ticket(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Ticket>, AppError> {
    let ticket = state
        .tickets
        .get(&code)
        .await?
        .ok_or(AppError::TicketNotFound)?;

    Ok(Json(ticket))
}
