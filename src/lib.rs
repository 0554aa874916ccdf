//! Ticket validation service.
//!
//! Validates event tickets by code, guaranteeing each ticket is redeemed at
//! most once even when scanned concurrently from several devices. Every scan
//! attempt is recorded in an append-only ledger, and usage statistics are
//! derived from the tickets and the ledger.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
