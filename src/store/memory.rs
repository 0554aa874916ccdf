//! In-memory backend.
//!
//! Used when no `DATABASE_URL` is configured and as the store behind the
//! test suite. Nothing survives a restart.
//!
//! Each ticket lives behind its own `Mutex`; the index `RwLock` is only
//! write-locked to insert a new code. Redemptions of different codes
//! therefore never wait on each other. No lock is held across an `.await`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::{
    models::{
        scan::{NewScanRecord, ScanRecord, ScanReport},
        statistics::TicketCounts,
        ticket::{RedemptionStamp, ReimportPolicy, Ticket, TicketUpsert},
    },
    store::{RedemptionOutcome, ScanLedger, StoreError, StoreResult, TicketStore},
};

type TicketSlot = Arc<Mutex<Ticket>>;

/// Process-local ticket store and scan ledger.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tickets: RwLock<HashMap<String, TicketSlot>>,
    scans: Mutex<Vec<ScanRecord>>,
}

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Unavailable("in-memory store lock poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, code: &str) -> StoreResult<Option<TicketSlot>> {
        let index = self.tickets.read().map_err(poisoned)?;
        Ok(index.get(code).cloned())
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn upsert(
        &self,
        upsert: TicketUpsert,
        policy: ReimportPolicy,
        now: DateTime<Utc>,
    ) -> StoreResult<Ticket> {
        let slot = {
            let mut index = self.tickets.write().map_err(poisoned)?;
            match index.get(&upsert.code) {
                Some(slot) => Arc::clone(slot),
                None => {
                    let ticket = upsert.into_ticket(None, policy, now);
                    index.insert(ticket.code.clone(), Arc::new(Mutex::new(ticket.clone())));
                    return Ok(ticket);
                }
            }
        };

        let mut current = slot.lock().map_err(poisoned)?;
        let ticket = upsert.into_ticket(Some(&*current), policy, now);
        *current = ticket.clone();

        Ok(ticket)
    }

    async fn get(&self, code: &str) -> StoreResult<Option<Ticket>> {
        match self.slot(code)? {
            Some(slot) => Ok(Some(slot.lock().map_err(poisoned)?.clone())),
            None => Ok(None),
        }
    }

    async fn try_redeem(
        &self,
        code: &str,
        stamp: &RedemptionStamp,
    ) -> StoreResult<RedemptionOutcome> {
        let Some(slot) = self.slot(code)? else {
            return Ok(RedemptionOutcome::NotFound);
        };

        // Check and write under the same guard
        let mut ticket = slot.lock().map_err(poisoned)?;
        if ticket.is_redeemed() {
            return Ok(RedemptionOutcome::AlreadyRedeemed(ticket.clone()));
        }

        ticket.apply_redemption(stamp);
        Ok(RedemptionOutcome::Redeemed(ticket.clone()))
    }

    async fn counts(&self) -> StoreResult<TicketCounts> {
        let index = self.tickets.read().map_err(poisoned)?;

        let mut redeemed = 0;
        for slot in index.values() {
            if slot.lock().map_err(poisoned)?.is_redeemed() {
                redeemed += 1;
            }
        }

        Ok(TicketCounts {
            total: index.len() as i64,
            redeemed,
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        let _index = self.tickets.read().map_err(poisoned)?;
        Ok(())
    }
}

#[async_trait]
impl ScanLedger for MemoryStore {
    async fn append(&self, record: NewScanRecord) -> StoreResult<ScanRecord> {
        let mut scans = self.scans.lock().map_err(poisoned)?;
        let record = ScanRecord::from_new(scans.len() as i64 + 1, record);
        scans.push(record.clone());
        Ok(record)
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<ScanReport>> {
        let latest: Vec<ScanRecord> = {
            let scans = self.scans.lock().map_err(poisoned)?;
            scans.iter().rev().take(limit).cloned().collect()
        };

        let mut reports = Vec::with_capacity(latest.len());
        for scan in latest {
            let ticket = self.get(&scan.ticket_code).await?;
            reports.push(ScanReport {
                holder_name: ticket.as_ref().map(|t| t.holder_name.clone()),
                event_name: ticket.map(|t| t.event_name),
                scan,
            });
        }

        Ok(reports)
    }

    async fn total(&self) -> StoreResult<i64> {
        Ok(self.scans.lock().map_err(poisoned)?.len() as i64)
    }
}
