//! Import service - bulk ticket upserts from delimited text.
//!
//! # Format
//!
//! The first record is the header. Column names are matched case-insensitively
//! and may use either the scanner export names (`codigo_unico`, `nombre_cliente`,
//! `evento`, ...) or English ones (`code`, `name`, `event`, ...). Unknown
//! columns are ignored.
//!
//! # Fault Tolerance
//!
//! Import is row-level: a row that cannot be parsed is reported and skipped,
//! the other rows are still upserted. A payload without a header is rejected
//! as a whole. A store fault aborts the import; rows already upserted stay
//! (re-running the same file is safe since upserts are keyed by code).

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};

use crate::{
    error::AppError,
    models::ticket::{ReimportPolicy, TicketState, TicketUpsert},
    store::TicketStore,
};

const DEFAULT_HOLDER: &str = "Cliente";
const DEFAULT_EVENT: &str = "Evento";
const DEFAULT_TICKET_TYPE: &str = "General";

/// Largest accepted price, in currency units, so that cents fit in an `i64`.
const MAX_PRICE: f64 = (i64::MAX / 100) as f64;

/// Why a single data row was skipped.
///
/// Rendered as `"Row n: <error>"` in the import report.
#[derive(Debug, thiserror::Error)]
pub enum ImportRowError {
    #[error("invalid price '{0}'")]
    InvalidPrice(String),

    #[error("price '{0}' is too large")]
    PriceOutOfRange(String),

    #[error("unknown state '{0}'")]
    UnknownState(String),

    #[error("{0}")]
    Malformed(#[from] csv::Error),
}

/// Outcome of one import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,

    /// One message per rejected row, in file order
    pub errors: Vec<String>,
}

/// Decode an uploaded file: UTF-8 (BOM stripped), or Latin-1 when it is not
/// valid UTF-8.
pub fn decode_payload(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.trim_start_matches('\u{feff}').to_string(),
        // Latin-1 maps every byte to the code point of the same value
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Column positions resolved from the header.
#[derive(Debug, Default)]
struct Columns {
    code: Option<usize>,
    holder_name: Option<usize>,
    email: Option<usize>,
    event_name: Option<usize>,
    event_date: Option<usize>,
    ticket_type: Option<usize>,
    price: Option<usize>,
    seat: Option<usize>,
    state: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Self {
        let mut columns = Columns::default();

        for (index, name) in headers.iter().enumerate() {
            let slot = match name.trim().to_lowercase().as_str() {
                "codigo_unico" | "code" => &mut columns.code,
                "nombre_cliente" | "holder_name" | "name" => &mut columns.holder_name,
                "email" => &mut columns.email,
                "evento" | "event_name" | "event" => &mut columns.event_name,
                "fecha_evento" | "event_date" => &mut columns.event_date,
                "tipo_entrada" | "ticket_type" => &mut columns.ticket_type,
                "precio" | "price" => &mut columns.price,
                "asiento" | "seat" => &mut columns.seat,
                "estado" | "state" => &mut columns.state,
                _ => continue,
            };
            // First matching column wins
            slot.get_or_insert(index);
        }

        columns
    }

    /// Non-blank cell value for a column.
    fn cell<'r>(record: &'r StringRecord, column: Option<usize>) -> Option<&'r str> {
        column
            .and_then(|index| record.get(index))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    fn to_upsert(
        &self,
        record: &StringRecord,
        row: usize,
    ) -> Result<TicketUpsert, ImportRowError> {
        let text = |column: Option<usize>, default: &str| {
            Self::cell(record, column).unwrap_or(default).to_string()
        };

        let price_cents = match Self::cell(record, self.price) {
            Some(raw) => parse_price_cents(raw)?,
            None => 0,
        };

        let state = match Self::cell(record, self.state) {
            Some(raw) => Some(
                TicketState::from_label(raw)
                    .ok_or_else(|| ImportRowError::UnknownState(raw.to_string()))?,
            ),
            None => None,
        };

        Ok(TicketUpsert {
            code: Self::cell(record, self.code)
                .map(str::to_string)
                .unwrap_or_else(|| format!("TICKET-{row}")),
            holder_name: text(self.holder_name, DEFAULT_HOLDER),
            email: text(self.email, ""),
            event_name: text(self.event_name, DEFAULT_EVENT),
            event_date: text(self.event_date, ""),
            ticket_type: text(self.ticket_type, DEFAULT_TICKET_TYPE),
            price_cents,
            seat: text(self.seat, ""),
            state,
        })
    }
}

/// Parse a decimal amount ("12", "12.5", "12.50") into cents.
fn parse_price_cents(raw: &str) -> Result<i64, ImportRowError> {
    let invalid = || ImportRowError::InvalidPrice(raw.to_string());
    let amount: f64 = raw.parse().map_err(|_| invalid())?;

    if !amount.is_finite() || amount < 0.0 {
        return Err(invalid());
    }
    if amount >= MAX_PRICE {
        return Err(ImportRowError::PriceOutOfRange(raw.to_string()));
    }

    Ok((amount * 100.0).round() as i64)
}

/// Parse a payload into one result per data row.
///
/// # Errors
///
/// Returns `InvalidRequest` if the payload is empty or has no readable header.
pub fn parse_rows(text: &str) -> Result<Vec<Result<TicketUpsert, ImportRowError>>, AppError> {
    if text.trim().is_empty() {
        return Err(AppError::InvalidRequest("CSV payload is empty".to_string()));
    }

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::InvalidRequest(format!("Invalid CSV header: {e}")))?
        .clone();
    let columns = Columns::from_headers(&headers);

    let rows: Vec<_> = reader
        .records()
        .enumerate()
        .map(|(row, record)| {
            record
                .map_err(ImportRowError::from)
                .and_then(|record| columns.to_upsert(&record, row))
        })
        .collect();

    Ok(rows)
}

/// Import a CSV payload into the ticket store.
///
/// # Process
///
/// 1. Decode the bytes (UTF-8, Latin-1 fallback)
/// 2. Parse the header and every data row
/// 3. Upsert each valid row; collect `"Row n: reason"` for the others
///
/// # Errors
///
/// - `InvalidRequest`: Payload is empty or has no header
/// - `Store`: The ticket store failed during an upsert
pub async fn import_csv(
    store: &dyn TicketStore,
    payload: &[u8],
    policy: ReimportPolicy,
    now: DateTime<Utc>,
) -> Result<ImportReport, AppError> {
    let text = decode_payload(payload);
    let rows = parse_rows(&text)?;

    let mut report = ImportReport::default();
    for (row, parsed) in rows.into_iter().enumerate() {
        match parsed {
            Ok(upsert) => {
                store.upsert(upsert, policy, now).await?;
                report.imported += 1;
            }
            Err(reason) => {
                tracing::warn!(row, %reason, "Skipping import row");
                report.errors.push(format!("Row {row}: {reason}"));
            }
        }
    }

    tracing::info!(
        imported = report.imported,
        rejected = report.errors.len(),
        "Ticket import finished"
    );

    Ok(report)
}
