//! Scan ledger data models.
//!
//! Every validation attempt produces exactly one `ScanRecord`, whatever the
//! outcome. Records are append-only.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of a single validation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    NotFound,
    #[serde(rename = "already_used")]
    AlreadyRedeemed,
    Valid,
}

impl ScanOutcome {
    /// Value stored in the `scans.outcome` column.
    pub fn as_str(self) -> &'static str {
        match self {
            ScanOutcome::NotFound => "not_found",
            ScanOutcome::AlreadyRedeemed => "already_used",
            ScanOutcome::Valid => "valid",
        }
    }
}

impl TryFrom<String> for ScanOutcome {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "not_found" => Ok(ScanOutcome::NotFound),
            "already_used" => Ok(ScanOutcome::AlreadyRedeemed),
            "valid" => Ok(ScanOutcome::Valid),
            other => Err(format!("unknown scan outcome '{other}'")),
        }
    }
}

/// A scan about to be appended to the ledger.
#[derive(Debug, Clone)]
pub struct NewScanRecord {
    pub ticket_code: String,
    pub scanned_at: DateTime<Utc>,
    pub outcome: ScanOutcome,
    pub device: String,
    pub location: String,
    pub validator: String,
}

/// Represents a scan record from the database.
///
/// # Database Table
///
/// Maps to the `scans` table. `id` is assigned at insertion and orders the
/// ledger; `ticket_code` may reference a code that never existed.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct ScanRecord {
    pub id: i64,
    pub ticket_code: String,
    pub scanned_at: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub outcome: ScanOutcome,
    pub device: String,
    pub location: String,
    pub validator: String,
}

impl ScanRecord {
    pub fn from_new(id: i64, record: NewScanRecord) -> Self {
        Self {
            id,
            ticket_code: record.ticket_code,
            scanned_at: record.scanned_at,
            outcome: record.outcome,
            device: record.device,
            location: record.location,
            validator: record.validator,
        }
    }
}

/// A scan record left-joined with the ticket it refers to.
///
/// `holder_name` and `event_name` are `None` for codes that do not resolve.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct ScanReport {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub scan: ScanRecord,
    pub holder_name: Option<String>,
    pub event_name: Option<String>,
}
