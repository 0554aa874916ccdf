//! Redemption service - the ticket validation state machine.
//!
//! This service handles:
//! - The one-time Active→Redeemed transition
//! - Recording every scan attempt in the ledger
//! - Bounding every store call in time
//!
//! # Atomicity Guarantees
//!
//! The read-check-write of a validation is delegated to
//! `TicketStore::try_redeem`, which is atomic per code. The ledger append
//! happens afterwards, outside any lock. A ledger failure is logged and
//! reported through `Validation::scan_recorded`; it never undoes the decision.
//!
//! # Timeouts
//!
//! `try_redeem` runs on its own task and is never cancelled, so a redemption
//! that reached the store always finishes. When its answer is late, the
//! ticket is re-read: a ticket carrying this scan's stamp is reported as
//! `Valid`. Otherwise the caller gets `StoreError::Timeout`, and if the
//! redemption lands afterwards its scan is still appended to the ledger.

use chrono::{DateTime, Utc};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::task::JoinHandle;

use crate::{
    models::{
        scan::{NewScanRecord, ScanOutcome},
        ticket::{RedemptionStamp, Ticket},
    },
    store::{RedemptionOutcome, ScanLedger, StoreError, StoreResult, TicketStore},
};

pub const DEFAULT_VALIDATOR: &str = "validador";
pub const DEFAULT_DEVICE: &str = "web";
pub const DEFAULT_LOCATION: &str = "general";

/// Who is scanning, with what, and where.
///
/// Validator identities are opaque labels; they are not authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanContext {
    pub validator: String,
    pub device: String,
    pub location: String,
}

impl ScanContext {
    /// Build a context, replacing absent or blank values with the defaults.
    pub fn new(
        validator: Option<String>,
        device: Option<String>,
        location: Option<String>,
    ) -> Self {
        fn or_default(value: Option<String>, default: &str) -> String {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        }

        Self {
            validator: or_default(validator, DEFAULT_VALIDATOR),
            device: or_default(device, DEFAULT_DEVICE),
            location: or_default(location, DEFAULT_LOCATION),
        }
    }
}

impl Default for ScanContext {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

/// Decision taken for one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    NotFound,

    /// Carries the stored ticket with its original redemption stamp.
    AlreadyRedeemed(Ticket),

    /// Carries the ticket snapshot right after this scan redeemed it.
    Valid(Ticket),
}

impl ValidationOutcome {
    pub fn scan_outcome(&self) -> ScanOutcome {
        match self {
            ValidationOutcome::NotFound => ScanOutcome::NotFound,
            ValidationOutcome::AlreadyRedeemed(_) => ScanOutcome::AlreadyRedeemed,
            ValidationOutcome::Valid(_) => ScanOutcome::Valid,
        }
    }
}

impl From<RedemptionOutcome> for ValidationOutcome {
    fn from(outcome: RedemptionOutcome) -> Self {
        match outcome {
            RedemptionOutcome::NotFound => ValidationOutcome::NotFound,
            RedemptionOutcome::AlreadyRedeemed(ticket) => {
                ValidationOutcome::AlreadyRedeemed(ticket)
            }
            RedemptionOutcome::Redeemed(ticket) => ValidationOutcome::Valid(ticket),
        }
    }
}

/// Result of `RedemptionEngine::validate`.
#[derive(Debug, Clone)]
pub struct Validation {
    pub code: String,
    pub outcome: ValidationOutcome,

    /// When the scan happened; equals `redeemed_at` for a `Valid` outcome
    pub scanned_at: DateTime<Utc>,

    pub validator: String,

    /// Whether the scan reached the ledger
    pub scan_recorded: bool,
}

/// The redemption engine.
///
/// Owns handles to the ticket store and the scan ledger; constructed once at
/// startup and shared by all request handlers.
pub struct RedemptionEngine {
    tickets: Arc<dyn TicketStore>,
    ledger: Arc<dyn ScanLedger>,
    store_timeout: Duration,
}

impl RedemptionEngine {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        ledger: Arc<dyn ScanLedger>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            tickets,
            ledger,
            store_timeout,
        }
    }

    /// Validate a scanned code.
    ///
    /// # Process
    ///
    /// 1. Atomically try the Active→Redeemed transition for `code`
    /// 2. Map the store result to `NotFound`, `AlreadyRedeemed` or `Valid`
    /// 3. Append one scan record, whatever the outcome
    ///
    /// # Errors
    ///
    /// Returns `StoreError` only when the transition itself could not be
    /// performed (store fault or timeout). Unknown and already used codes are
    /// outcomes, not errors. Ledger failures never surface as errors.
    pub async fn validate(&self, code: &str, context: ScanContext) -> StoreResult<Validation> {
        let stamp = RedemptionStamp::new(context.validator, context.device, context.location);

        let decision = self
            .redeem(code, &stamp)
            .await
            .inspect_err(|err| {
                tracing::error!(code, error = %err, "Redemption could not be performed");
            })?;

        let outcome = ValidationOutcome::from(decision);
        let scan_outcome = outcome.scan_outcome();

        tracing::info!(
            code,
            outcome = scan_outcome.as_str(),
            validator = %stamp.validator,
            device = %stamp.device,
            location = %stamp.location,
            "Ticket scanned"
        );

        let record = NewScanRecord {
            ticket_code: code.to_string(),
            scanned_at: stamp.at,
            outcome: scan_outcome,
            device: stamp.device,
            location: stamp.location,
            validator: stamp.validator.clone(),
        };

        let scan_recorded = match self.bounded(self.ledger.append(record)).await {
            Ok(_) => true,
            Err(err) => {
                // The decision above is already committed and stays as is
                tracing::error!(
                    code,
                    outcome = scan_outcome.as_str(),
                    error = %err,
                    "Failed to record scan in ledger"
                );
                false
            }
        };

        Ok(Validation {
            code: code.to_string(),
            outcome,
            scanned_at: stamp.at,
            validator: stamp.validator,
            scan_recorded,
        })
    }

    /// Redeem on a separate task and wait for it at most `store_timeout`.
    async fn redeem(
        &self,
        code: &str,
        stamp: &RedemptionStamp,
    ) -> StoreResult<RedemptionOutcome> {
        let mut redemption: JoinHandle<StoreResult<RedemptionOutcome>> = {
            let tickets = Arc::clone(&self.tickets);
            let code = code.to_string();
            let stamp = stamp.clone();
            tokio::spawn(async move { tickets.try_redeem(&code, &stamp).await })
        };

        let waited = tokio::time::timeout(self.store_timeout, &mut redemption).await;
        match waited {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(StoreError::Unavailable(format!(
                "redemption task failed: {join_error}"
            ))),
            Err(_) => match self.bounded(self.tickets.get(code)).await {
                // The store applied this very scan; only the answer was late
                Ok(Some(ticket)) if ticket.redeemed_with(stamp) => {
                    tracing::warn!(code, "Late redemption confirmed by re-reading the ticket");
                    Ok(RedemptionOutcome::Redeemed(ticket))
                }
                _ => {
                    self.record_late_redemption(code, stamp, redemption);
                    Err(StoreError::Timeout(self.store_timeout))
                }
            },
        }
    }

    /// Append the scan of a redemption that commits after its caller gave up.
    fn record_late_redemption(
        &self,
        code: &str,
        stamp: &RedemptionStamp,
        redemption: JoinHandle<StoreResult<RedemptionOutcome>>,
    ) {
        let ledger = Arc::clone(&self.ledger);
        let record = NewScanRecord {
            ticket_code: code.to_string(),
            scanned_at: stamp.at,
            outcome: ScanOutcome::Valid,
            device: stamp.device.clone(),
            location: stamp.location.clone(),
            validator: stamp.validator.clone(),
        };

        tokio::spawn(async move {
            let Ok(Ok(RedemptionOutcome::Redeemed(_))) = redemption.await else {
                return;
            };

            tracing::warn!(
                code = %record.ticket_code,
                validator = %record.validator,
                "Redemption committed after the caller timed out"
            );
            if let Err(err) = ledger.append(record).await {
                tracing::error!(error = %err, "Failed to record late redemption in ledger");
            }
        });
    }

    async fn bounded<T>(&self, operation: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        tokio::time::timeout(self.store_timeout, operation)
            .await
            .unwrap_or(Err(StoreError::Timeout(self.store_timeout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::scan::{ScanRecord, ScanReport};
    use crate::models::statistics::TicketCounts;
    use crate::models::ticket::{ReimportPolicy, TicketState, TicketUpsert, now_micros};
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    /// Ledger that rejects every append.
    struct BrokenLedger;

    #[async_trait]
    impl ScanLedger for BrokenLedger {
        async fn append(&self, _record: NewScanRecord) -> StoreResult<ScanRecord> {
            Err(StoreError::Unavailable("disk full".to_string()))
        }

        async fn recent(&self, _limit: usize) -> StoreResult<Vec<ScanReport>> {
            Ok(Vec::new())
        }

        async fn total(&self) -> StoreResult<i64> {
            Ok(0)
        }
    }

    /// Ticket store whose every call fails.
    struct DownStore;

    #[async_trait]
    impl TicketStore for DownStore {
        async fn upsert(
            &self,
            _upsert: TicketUpsert,
            _policy: ReimportPolicy,
            _now: DateTime<Utc>,
        ) -> StoreResult<Ticket> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn get(&self, _code: &str) -> StoreResult<Option<Ticket>> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn try_redeem(
            &self,
            _code: &str,
            _stamp: &RedemptionStamp,
        ) -> StoreResult<RedemptionOutcome> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn counts(&self) -> StoreResult<TicketCounts> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn ping(&self) -> StoreResult<()> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    /// Ticket store that never answers a redemption.
    struct StuckStore;

    #[async_trait]
    impl TicketStore for StuckStore {
        async fn upsert(
            &self,
            _upsert: TicketUpsert,
            _policy: ReimportPolicy,
            _now: DateTime<Utc>,
        ) -> StoreResult<Ticket> {
            std::future::pending().await
        }

        async fn get(&self, _code: &str) -> StoreResult<Option<Ticket>> {
            Ok(None)
        }

        async fn try_redeem(
            &self,
            _code: &str,
            _stamp: &RedemptionStamp,
        ) -> StoreResult<RedemptionOutcome> {
            std::future::pending().await
        }

        async fn counts(&self) -> StoreResult<TicketCounts> {
            Ok(TicketCounts::default())
        }

        async fn ping(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    /// Ticket store that delays `try_redeem` before and after applying it.
    struct DelayedStore {
        inner: Arc<MemoryStore>,
        before: Duration,
        after: Duration,
    }

    #[async_trait]
    impl TicketStore for DelayedStore {
        async fn upsert(
            &self,
            upsert: TicketUpsert,
            policy: ReimportPolicy,
            now: DateTime<Utc>,
        ) -> StoreResult<Ticket> {
            self.inner.upsert(upsert, policy, now).await
        }

        async fn get(&self, code: &str) -> StoreResult<Option<Ticket>> {
            self.inner.get(code).await
        }

        async fn try_redeem(
            &self,
            code: &str,
            stamp: &RedemptionStamp,
        ) -> StoreResult<RedemptionOutcome> {
            tokio::time::sleep(self.before).await;
            let outcome = self.inner.try_redeem(code, stamp).await;
            tokio::time::sleep(self.after).await;
            outcome
        }

        async fn counts(&self) -> StoreResult<TicketCounts> {
            self.inner.counts().await
        }

        async fn ping(&self) -> StoreResult<()> {
            self.inner.ping().await
        }
    }

    async fn seeded_store(codes: &[&str]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for code in codes {
            store
                .upsert(
                    TicketUpsert {
                        code: code.to_string(),
                        holder_name: "Ana".to_string(),
                        email: String::new(),
                        event_name: "Concert".to_string(),
                        event_date: String::new(),
                        ticket_type: "General".to_string(),
                        price_cents: 0,
                        seat: String::new(),
                        state: None,
                    },
                    ReimportPolicy::Preserve,
                    now_micros(),
                )
                .await
                .unwrap();
        }
        store
    }

    fn engine(store: &Arc<MemoryStore>) -> RedemptionEngine {
        RedemptionEngine::new(store.clone(), store.clone(), Duration::from_secs(2))
    }

    fn context(validator: &str, device: &str) -> ScanContext {
        ScanContext::new(
            Some(validator.to_string()),
            Some(device.to_string()),
            Some("north".to_string()),
        )
    }

    #[test]
    fn test_scan_context_defaults() {
        let context = ScanContext::new(None, Some("  ".to_string()), Some(" gate ".to_string()));

        assert_eq!(context.validator, DEFAULT_VALIDATOR);
        assert_eq!(context.device, DEFAULT_DEVICE);
        assert_eq!(context.location, "gate");
    }

    #[tokio::test]
    async fn test_validate_twice_keeps_first_stamp() {
        let store = seeded_store(&["T1"]).await;
        let engine = engine(&store);

        let first = engine
            .validate("T1", context("gate-1", "phone-a"))
            .await
            .unwrap();
        let ValidationOutcome::Valid(ticket) = &first.outcome else {
            panic!("expected valid, got {:?}", first.outcome);
        };
        assert_eq!(ticket.state, TicketState::Redeemed);
        assert_eq!(ticket.redeemed_at, Some(first.scanned_at));
        assert_eq!(ticket.redeemed_by.as_deref(), Some("gate-1"));
        assert!(first.scan_recorded);

        let second = engine
            .validate("T1", context("gate-2", "phone-b"))
            .await
            .unwrap();
        let ValidationOutcome::AlreadyRedeemed(again) = &second.outcome else {
            panic!("expected already redeemed, got {:?}", second.outcome);
        };
        assert_eq!(again.redeemed_at, Some(first.scanned_at));
        assert_eq!(again.redeemed_by.as_deref(), Some("gate-1"));
        assert_eq!(again.redeemed_device.as_deref(), Some("phone-a"));

        assert_eq!(store.total().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_code_is_recorded_without_mutation() {
        let store = seeded_store(&["T1"]).await;
        let engine = engine(&store);
        let before = store.get("T1").await.unwrap();

        let validation = engine
            .validate("UNKNOWN", ScanContext::default())
            .await
            .unwrap();

        assert_eq!(validation.outcome, ValidationOutcome::NotFound);
        assert_eq!(store.get("T1").await.unwrap(), before);
        assert!(store.get("UNKNOWN").await.unwrap().is_none());

        let scans = store.recent(10).await.unwrap();
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].scan.ticket_code, "UNKNOWN");
        assert_eq!(scans[0].scan.outcome, ScanOutcome::NotFound);
        assert_eq!(scans[0].scan.validator, DEFAULT_VALIDATOR);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_scans_have_one_winner() {
        let store = seeded_store(&["T1"]).await;
        let engine = Arc::new(engine(&store));

        let mut handles = Vec::new();
        for i in 0..32 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .validate("T1", context(&format!("gate-{i}"), &format!("device-{i}")))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = Vec::new();
        let mut already_used = 0;
        for handle in handles {
            let validation = handle.await.unwrap();
            match validation.outcome {
                ValidationOutcome::Valid(_) => winners.push(validation),
                ValidationOutcome::AlreadyRedeemed(_) => already_used += 1,
                ValidationOutcome::NotFound => panic!("ticket vanished"),
            }
        }

        assert_eq!(winners.len(), 1);
        assert_eq!(already_used, 31);

        let winner = &winners[0];
        let stored = store.get("T1").await.unwrap().unwrap();
        assert_eq!(stored.redeemed_by.as_deref(), Some(winner.validator.as_str()));
        assert_eq!(stored.redeemed_at, Some(winner.scanned_at));
        assert_eq!(store.total().await.unwrap(), 32);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_different_codes_redeem_independently() {
        let codes: Vec<String> = (0..16).map(|i| format!("T{i}")).collect();
        let refs: Vec<&str> = codes.iter().map(String::as_str).collect();
        let store = seeded_store(&refs).await;
        let engine = Arc::new(engine(&store));

        let mut handles = Vec::new();
        for code in codes {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.validate(&code, ScanContext::default()).await.unwrap()
            }));
        }

        for handle in handles {
            let validation = handle.await.unwrap();
            assert!(matches!(validation.outcome, ValidationOutcome::Valid(_)));
        }
        assert_eq!(store.counts().await.unwrap().redeemed, 16);
    }

    #[tokio::test]
    async fn test_ledger_failure_keeps_decision() {
        let store = seeded_store(&["T1"]).await;
        let engine =
            RedemptionEngine::new(store.clone(), Arc::new(BrokenLedger), Duration::from_secs(2));

        let validation = engine.validate("T1", ScanContext::default()).await.unwrap();

        assert!(matches!(validation.outcome, ValidationOutcome::Valid(_)));
        assert!(!validation.scan_recorded);
        assert!(store.get("T1").await.unwrap().unwrap().is_redeemed());
    }

    #[tokio::test]
    async fn test_store_fault_is_an_error() {
        let ledger = Arc::new(MemoryStore::new());
        let engine =
            RedemptionEngine::new(Arc::new(DownStore), ledger.clone(), Duration::from_secs(2));

        let result = engine.validate("T1", ScanContext::default()).await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(ledger.total().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stuck_store_times_out() {
        let ledger = Arc::new(MemoryStore::new());
        let engine = RedemptionEngine::new(Arc::new(StuckStore), ledger, Duration::from_millis(50));

        let result = engine.validate("T1", ScanContext::default()).await;

        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_late_acknowledgement_is_still_valid() {
        let store = seeded_store(&["T1"]).await;
        let slow = Arc::new(DelayedStore {
            inner: store.clone(),
            before: Duration::ZERO,
            after: Duration::from_millis(200),
        });
        let engine = RedemptionEngine::new(slow, store.clone(), Duration::from_millis(50));

        let validation = engine
            .validate("T1", context("gate-1", "phone-a"))
            .await
            .unwrap();

        let ValidationOutcome::Valid(ticket) = &validation.outcome else {
            panic!("expected valid, got {:?}", validation.outcome);
        };
        assert_eq!(ticket.redeemed_at, Some(validation.scanned_at));
        assert!(validation.scan_recorded);

        let scans = store.recent(10).await.unwrap();
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].scan.outcome, ScanOutcome::Valid);
        assert_eq!(scans[0].scan.validator, "gate-1");
    }

    #[tokio::test]
    async fn test_redemption_landing_after_timeout_is_recorded() {
        let store = seeded_store(&["T1"]).await;
        let slow = Arc::new(DelayedStore {
            inner: store.clone(),
            before: Duration::from_millis(200),
            after: Duration::ZERO,
        });
        let engine = RedemptionEngine::new(slow, store.clone(), Duration::from_millis(50));

        let result = engine.validate("T1", context("gate-1", "phone-a")).await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));
        assert_eq!(store.total().await.unwrap(), 0);

        tokio::time::sleep(Duration::from_millis(400)).await;

        let stored = store.get("T1").await.unwrap().unwrap();
        assert!(stored.is_redeemed());
        assert_eq!(stored.redeemed_by.as_deref(), Some("gate-1"));

        let scans = store.recent(10).await.unwrap();
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].scan.outcome, ScanOutcome::Valid);
        assert_eq!(Some(scans[0].scan.scanned_at), stored.redeemed_at);
    }
}
