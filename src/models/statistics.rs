//! Usage statistics models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::scan::ScanReport;

/// Ticket counts taken from a single read of the ticket store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TicketCounts {
    pub total: i64,
    pub redeemed: i64,
}

impl TicketCounts {
    /// Active tickets. Derived so that `redeemed + active == total` always holds.
    pub fn active(&self) -> i64 {
        self.total - self.redeemed
    }

    /// Share of redeemed tickets in percent, rounded to 2 decimals.
    ///
    /// Zero when there are no tickets.
    pub fn redemption_percentage(&self) -> f64 {
        if self.total <= 0 {
            return 0.0;
        }
        let percentage = self.redeemed as f64 / self.total as f64 * 100.0;
        (percentage * 100.0).round() / 100.0
    }
}

/// Aggregate counters returned by the statistics endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageStatistics {
    pub total_tickets: i64,
    pub redeemed: i64,
    pub active: i64,
    pub redemption_percentage: f64,
    pub total_scans: i64,
}

impl UsageStatistics {
    pub fn new(counts: TicketCounts, total_scans: i64) -> Self {
        Self {
            total_tickets: counts.total,
            redeemed: counts.redeemed,
            active: counts.active(),
            redemption_percentage: counts.redemption_percentage(),
            total_scans,
        }
    }
}

/// Response body for `GET /api/v1/statistics`.
///
/// # JSON Example
///
/// ```json
/// {
///   "timestamp": "2025-06-01T20:15:00Z",
///   "statistics": {
///     "total_tickets": 1,
///     "redeemed": 1,
///     "active": 0,
///     "redemption_percentage": 100.0,
///     "total_scans": 3
///   },
///   "recent_scans": [
///     {
///       "id": 3,
///       "ticket_code": "UNKNOWN",
///       "scanned_at": "2025-06-01T20:14:59Z",
///       "outcome": "not_found",
///       "device": "web",
///       "location": "general",
///       "validator": "validador",
///       "holder_name": null,
///       "event_name": null
///     }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsReport {
    pub timestamp: DateTime<Utc>,
    pub statistics: UsageStatistics,
    pub recent_scans: Vec<ScanReport>,
}
