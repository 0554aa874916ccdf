//! PostgreSQL backend.
//!
//! # Atomicity Guarantees
//!
//! Every mutation runs inside a PostgreSQL transaction that first locks the
//! ticket row with `FOR UPDATE`. Concurrent redemptions of the same code queue
//! on that row lock; the first to commit wins and the others then read the
//! redeemed row. Rows for other codes are never locked.
//!
//! Each transaction sets a local `lock_timeout` and `statement_timeout`, so a
//! request waiting on a busy row fails with a database error instead of
//! hanging. Both are kept below the engine's own budget, so the database
//! reports first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::{
    db::DbPool,
    models::{
        scan::{NewScanRecord, ScanRecord, ScanReport},
        statistics::TicketCounts,
        ticket::{RedemptionStamp, ReimportPolicy, Ticket, TicketUpsert},
    },
    store::{RedemptionOutcome, ScanLedger, StoreResult, TicketStore},
};

/// Ticket store and scan ledger backed by one connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
    statement_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: DbPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    /// Start a transaction whose row-lock waits and statements are bounded.
    async fn begin(&self) -> StoreResult<sqlx::Transaction<'static, sqlx::Postgres>> {
        let mut tx = self.pool.begin().await?;

        // set_config(..., true) is the bindable form of SET LOCAL
        sqlx::query(
            "SELECT set_config('lock_timeout', $1, true), \
                    set_config('statement_timeout', $1, true)",
        )
        .bind(format!("{}ms", self.statement_timeout.as_millis()))
        .execute(&mut *tx)
        .await?;

        Ok(tx)
    }
}

#[async_trait]
impl TicketStore for PgStore {
    async fn upsert(
        &self,
        upsert: TicketUpsert,
        policy: ReimportPolicy,
        now: DateTime<Utc>,
    ) -> StoreResult<Ticket> {
        let mut tx = self.begin().await?;

        let existing =
            sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE code = $1 FOR UPDATE")
                .bind(&upsert.code)
                .fetch_optional(&mut *tx)
                .await?;

        let ticket = upsert.into_ticket(existing.as_ref(), policy, now);

        // ON CONFLICT covers two imports racing on a brand new code; the
        // first row's created_at wins.
        let stored = sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (
                code,
                holder_name,
                email,
                event_name,
                event_date,
                ticket_type,
                price_cents,
                seat,
                state,
                created_at,
                redeemed_at,
                redeemed_by,
                redeemed_device,
                redeemed_location
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (code) DO UPDATE SET
                holder_name = EXCLUDED.holder_name,
                email = EXCLUDED.email,
                event_name = EXCLUDED.event_name,
                event_date = EXCLUDED.event_date,
                ticket_type = EXCLUDED.ticket_type,
                price_cents = EXCLUDED.price_cents,
                seat = EXCLUDED.seat,
                state = EXCLUDED.state,
                redeemed_at = EXCLUDED.redeemed_at,
                redeemed_by = EXCLUDED.redeemed_by,
                redeemed_device = EXCLUDED.redeemed_device,
                redeemed_location = EXCLUDED.redeemed_location
            RETURNING *
            "#,
        )
        .bind(&ticket.code)
        .bind(&ticket.holder_name)
        .bind(&ticket.email)
        .bind(&ticket.event_name)
        .bind(&ticket.event_date)
        .bind(&ticket.ticket_type)
        .bind(ticket.price_cents)
        .bind(&ticket.seat)
        .bind(ticket.state.as_str())
        .bind(ticket.created_at)
        .bind(ticket.redeemed_at)
        .bind(&ticket.redeemed_by)
        .bind(&ticket.redeemed_device)
        .bind(&ticket.redeemed_location)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(stored)
    }

    async fn get(&self, code: &str) -> StoreResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(ticket)
    }

    async fn try_redeem(
        &self,
        code: &str,
        stamp: &RedemptionStamp,
    ) -> StoreResult<RedemptionOutcome> {
        let mut tx = self.begin().await?;

        // Lock the ticket row; concurrent scans of this code wait here
        let current =
            sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE code = $1 FOR UPDATE")
                .bind(code)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(RedemptionOutcome::NotFound);
        };

        if current.is_redeemed() {
            tx.rollback().await?;
            return Ok(RedemptionOutcome::AlreadyRedeemed(current));
        }

        let redeemed = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET state = 'redeemed',
                redeemed_at = $2,
                redeemed_by = $3,
                redeemed_device = $4,
                redeemed_location = $5
            WHERE code = $1 AND state = 'active'
            RETURNING *
            "#,
        )
        .bind(code)
        .bind(stamp.at)
        .bind(&stamp.validator)
        .bind(&stamp.device)
        .bind(&stamp.location)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(RedemptionOutcome::Redeemed(redeemed))
    }

    async fn counts(&self) -> StoreResult<TicketCounts> {
        let (total, redeemed): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE state = 'redeemed') FROM tickets",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(TicketCounts { total, redeemed })
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ScanLedger for PgStore {
    async fn append(&self, record: NewScanRecord) -> StoreResult<ScanRecord> {
        let stored = sqlx::query_as::<_, ScanRecord>(
            r#"
            INSERT INTO scans (
                ticket_code,
                scanned_at,
                outcome,
                device,
                location,
                validator
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&record.ticket_code)
        .bind(record.scanned_at)
        .bind(record.outcome.as_str())
        .bind(&record.device)
        .bind(&record.location)
        .bind(&record.validator)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<ScanReport>> {
        let reports = sqlx::query_as::<_, ScanReport>(
            r#"
            SELECT
                s.id,
                s.ticket_code,
                s.scanned_at,
                s.outcome,
                s.device,
                s.location,
                s.validator,
                t.holder_name,
                t.event_name
            FROM scans s
            LEFT JOIN tickets t ON t.code = s.ticket_code
            ORDER BY s.id DESC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(reports)
    }

    async fn total(&self) -> StoreResult<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scans")
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }
}
