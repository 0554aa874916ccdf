//! Storage seams for tickets and the scan ledger.
//!
//! The redemption engine and the statistics aggregator only see these two
//! traits. Two backends implement both:
//!
//! - `PgStore`: PostgreSQL, row locks via `SELECT ... FOR UPDATE`
//! - `MemoryStore`: process-local, one mutex per ticket
//!
//! # Atomicity Contract
//!
//! `TicketStore::try_redeem` is the only mutation on the redemption path. For
//! a given code it must behave as a single compare-and-set: among any number
//! of concurrent callers exactly one observes `Redeemed`, the rest observe
//! `AlreadyRedeemed` with the winner's stamp. Different codes must not
//! contend with each other.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::models::{
    scan::{NewScanRecord, ScanRecord, ScanReport},
    statistics::TicketCounts,
    ticket::{RedemptionStamp, ReimportPolicy, Ticket, TicketUpsert},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Failure of a storage backend.
///
/// Never used to signal "ticket not found" or "already redeemed"; those are
/// outcomes, not errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed (connection, lock timeout, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The operation did not finish within the configured bound.
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    /// The backend cannot serve requests.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of the atomic Active→Redeemed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedemptionOutcome {
    /// No ticket with that code.
    NotFound,

    /// The ticket was already redeemed; carries the stored, untouched ticket.
    AlreadyRedeemed(Ticket),

    /// This call performed the transition; carries the redeemed ticket.
    Redeemed(Ticket),
}

/// Durable keyed record of tickets and their redemption state.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Create a ticket or fully replace the one with the same code.
    ///
    /// The replacement is computed by `TicketUpsert::into_ticket` under the
    /// backend's per-ticket lock.
    async fn upsert(
        &self,
        upsert: TicketUpsert,
        policy: ReimportPolicy,
        now: DateTime<Utc>,
    ) -> StoreResult<Ticket>;

    async fn get(&self, code: &str) -> StoreResult<Option<Ticket>>;

    /// Atomically redeem `code` with `stamp` if it is still active.
    async fn try_redeem(
        &self,
        code: &str,
        stamp: &RedemptionStamp,
    ) -> StoreResult<RedemptionOutcome>;

    /// Total and redeemed counts from one consistent read.
    async fn counts(&self) -> StoreResult<TicketCounts>;

    /// Cheap connectivity check for the health endpoint.
    async fn ping(&self) -> StoreResult<()>;
}

/// Append-only log of every validation attempt.
#[async_trait]
pub trait ScanLedger: Send + Sync {
    /// Append one record. Records are ordered by insertion.
    async fn append(&self, record: NewScanRecord) -> StoreResult<ScanRecord>;

    /// The `limit` most recent records, newest first, left-joined with the
    /// holder and event name of the referenced ticket.
    async fn recent(&self, limit: usize) -> StoreResult<Vec<ScanReport>>;

    /// Number of records in the ledger.
    async fn total(&self) -> StoreResult<i64>;
}
