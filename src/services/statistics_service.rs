//! Statistics service - read-only usage reporting.
//!
//! Counts and the recent-scan list come from independent reads. Each part is
//! internally consistent (counts come from a single query), but the two may
//! reflect slightly different moments.

use std::sync::Arc;

use crate::{
    models::{
        statistics::{StatisticsReport, UsageStatistics},
        ticket::now_micros,
    },
    store::{ScanLedger, StoreResult, TicketStore},
};

/// Default size of the recent-scan list.
pub const DEFAULT_RECENT_SCANS: usize = 10;

pub struct StatisticsAggregator {
    tickets: Arc<dyn TicketStore>,
    ledger: Arc<dyn ScanLedger>,
    recent_limit: usize,
}

impl StatisticsAggregator {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        ledger: Arc<dyn ScanLedger>,
        recent_limit: usize,
    ) -> Self {
        Self {
            tickets,
            ledger,
            recent_limit,
        }
    }

    /// Build the statistics report.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if either store cannot be read.
    pub async fn report(&self) -> StoreResult<StatisticsReport> {
        let counts = self.tickets.counts().await?;
        let total_scans = self.ledger.total().await?;
        let recent_scans = self.ledger.recent(self.recent_limit).await?;

        Ok(StatisticsReport {
            timestamp: now_micros(),
            statistics: UsageStatistics::new(counts, total_scans),
            recent_scans,
        })
    }
}
