//! Data models representing database entities and API payloads.

/// Bulk import response
pub mod import;
/// Scan ledger records
pub mod scan;
/// Usage statistics
pub mod statistics;
/// Ticket entity and lifecycle
pub mod ticket;
/// Validation request/response
pub mod validation;
