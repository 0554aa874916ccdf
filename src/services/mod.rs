//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They own the store handles they need and never touch HTTP types.

pub mod import_service;
pub mod redemption_service;
pub mod statistics_service;
