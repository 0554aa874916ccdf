//! Validation API request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ticket::Ticket;
use crate::services::redemption_service::{ScanContext, Validation, ValidationOutcome};

/// Query string of `GET /api/v1/validate/{code}`.
///
/// Every field is optional; blank values fall back to the scan defaults
/// (`validador`, `web`, `general`).
#[derive(Debug, Default, Deserialize)]
pub struct ValidationQuery {
    pub validator: Option<String>,
    pub device: Option<String>,
    pub location: Option<String>,
}

impl From<ValidationQuery> for ScanContext {
    fn from(query: ValidationQuery) -> Self {
        ScanContext::new(query.validator, query.device, query.location)
    }
}

/// Response body of the validation endpoint, tagged by `status`.
///
/// # JSON Examples
///
/// ```json
/// { "status": "not_found", "message": "Ticket not found", "code": "X1", "scan_recorded": true }
/// ```
///
/// ```json
/// {
///   "status": "already_used",
///   "message": "Ticket already used",
///   "code": "T1",
///   "redeemed_at": "2025-06-01T20:00:00.123456Z",
///   "redeemed_by": "gate-1",
///   "scan_recorded": true
/// }
/// ```
///
/// ```json
/// {
///   "status": "valid",
///   "message": "Ticket valid",
///   "validated_at": "2025-06-01T20:00:00.123456Z",
///   "validator": "gate-1",
///   "ticket": { "code": "T1", "state": "redeemed", "...": "..." },
///   "scan_recorded": true
/// }
/// ```
///
/// `scan_recorded` is `false` when the decision was made but the scan could
/// not be written to the ledger.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationResponse {
    NotFound {
        message: &'static str,
        code: String,
        scan_recorded: bool,
    },
    AlreadyUsed {
        message: &'static str,
        code: String,
        redeemed_at: Option<DateTime<Utc>>,
        redeemed_by: Option<String>,
        scan_recorded: bool,
    },
    Valid {
        message: &'static str,
        validated_at: DateTime<Utc>,
        validator: String,
        ticket: Ticket,
        scan_recorded: bool,
    },
}

impl From<Validation> for ValidationResponse {
    fn from(validation: Validation) -> Self {
        let scan_recorded = validation.scan_recorded;
        match validation.outcome {
            ValidationOutcome::NotFound => ValidationResponse::NotFound {
                message: "Ticket not found",
                code: validation.code,
                scan_recorded,
            },
            ValidationOutcome::AlreadyRedeemed(ticket) => ValidationResponse::AlreadyUsed {
                message: "Ticket already used",
                code: validation.code,
                redeemed_at: ticket.redeemed_at,
                redeemed_by: ticket.redeemed_by,
                scan_recorded,
            },
            ValidationOutcome::Valid(ticket) => ValidationResponse::Valid {
                message: "Ticket valid",
                validated_at: validation.scanned_at,
                validator: validation.validator,
                ticket,
                scan_recorded,
            },
        }
    }
}
