//! Bulk import response types.

use serde::Serialize;

use crate::services::import_service::ImportReport;

/// How many row errors are echoed back to the client.
pub const MAX_REPORTED_ERRORS: usize = 5;

/// Response body for `POST /api/v1/tickets/import`.
///
/// # JSON Example
///
/// ```json
/// {
///   "success": true,
///   "message": "Imported 2 tickets",
///   "imported": 2,
///   "errors": ["Row 2: invalid price 'abc'"]
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    pub imported: usize,

    /// First few row errors, in file order
    pub errors: Vec<String>,
}

impl From<ImportReport> for ImportResponse {
    fn from(report: ImportReport) -> Self {
        Self {
            success: true,
            message: format!("Imported {} tickets", report.imported),
            imported: report.imported,
            errors: report
                .errors
                .into_iter()
                .take(MAX_REPORTED_ERRORS)
                .collect(),
        }
    }
}
