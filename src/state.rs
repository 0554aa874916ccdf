//! Shared application state.
//!
//! Store handles are created once at startup and handed to the services
//! explicitly; handlers reach them only through `AppState`.

use std::sync::Arc;

use crate::{
    config::Config,
    models::ticket::ReimportPolicy,
    services::{redemption_service::RedemptionEngine, statistics_service::StatisticsAggregator},
    store::{MemoryStore, ScanLedger, TicketStore},
};

#[derive(Clone)]
pub struct AppState {
    pub tickets: Arc<dyn TicketStore>,
    pub engine: Arc<RedemptionEngine>,
    pub statistics: Arc<StatisticsAggregator>,
    pub reimport_policy: ReimportPolicy,
}

impl AppState {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        ledger: Arc<dyn ScanLedger>,
        config: &Config,
    ) -> Self {
        let engine =
            RedemptionEngine::new(tickets.clone(), ledger.clone(), config.store_timeout());
        let statistics =
            StatisticsAggregator::new(tickets.clone(), ledger, config.recent_scans_limit);

        Self {
            tickets,
            engine: Arc::new(engine),
            statistics: Arc::new(statistics),
            reimport_policy: config.reimport_policy,
        }
    }

    /// State backed by a fresh `MemoryStore` for both tickets and scans.
    pub fn in_memory(config: &Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(store.clone(), store, config)
    }
}
