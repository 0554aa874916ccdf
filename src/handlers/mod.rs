//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (multipart body, URL params, query string)
//! 2. Delegates to a service
//! 3. Returns HTTP response (JSON, status code)

/// Liveness probe
pub mod health;
/// Usage statistics
pub mod statistics;
/// Ticket import and lookup
pub mod tickets;
/// Ticket validation
pub mod validation;
