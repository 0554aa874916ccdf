//! Ticket data models.
//!
//! This module defines:
//! - `Ticket`: Database entity representing one admission right
//! - `TicketState`: The two-state lifecycle (active, redeemed)
//! - `RedemptionStamp`: The metadata written by the one Active→Redeemed transition
//! - `TicketUpsert`: A ticket as described by an import row
//! - `ReimportPolicy`: How an import treats tickets that were already redeemed

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Label written into the redemption fields of tickets imported as already used.
pub const IMPORT_LABEL: &str = "import";

/// Lifecycle of a ticket.
///
/// The only transition is `Active -> Redeemed`. Nothing in the redemption
/// path ever moves a ticket back to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    Active,
    Redeemed,
}

impl TicketState {
    /// Value stored in the `tickets.state` column.
    pub fn as_str(self) -> &'static str {
        match self {
            TicketState::Active => "active",
            TicketState::Redeemed => "redeemed",
        }
    }

    /// Parse a state cell from an import file.
    ///
    /// Matching is case-insensitive and accepts the Spanish labels used by
    /// the scanner exports (`activo`, `usado`).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "active" | "activo" => Some(TicketState::Active),
            "redeemed" | "used" | "usado" => Some(TicketState::Redeemed),
            _ => None,
        }
    }
}

impl TryFrom<String> for TicketState {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(TicketState::Active),
            "redeemed" => Ok(TicketState::Redeemed),
            other => Err(format!("unknown ticket state '{other}'")),
        }
    }
}

/// Current time at the precision both storage backends round-trip.
///
/// PostgreSQL keeps microseconds, so every timestamp the service creates is
/// truncated to microseconds before it is stored or returned.
pub fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Represents a ticket record from the database.
///
/// # Database Table
///
/// Maps to the `tickets` table, keyed by `code`.
///
/// # Invariant
///
/// `redeemed_at` (and the other `redeemed_*` fields) are `Some` exactly
/// when `state` is `Redeemed`. The table carries a CHECK constraint for it.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct Ticket {
    /// Unique, immutable ticket code (the value encoded in the QR)
    pub code: String,

    pub holder_name: String,
    pub email: String,
    pub event_name: String,

    /// Free-form event date as provided by the import
    pub event_date: String,

    pub ticket_type: String,

    /// Price in cents
    pub price_cents: i64,

    pub seat: String,

    #[sqlx(try_from = "String")]
    pub state: TicketState,

    /// Set once, when the code is first imported
    pub created_at: DateTime<Utc>,

    pub redeemed_at: Option<DateTime<Utc>>,
    pub redeemed_by: Option<String>,
    pub redeemed_device: Option<String>,
    pub redeemed_location: Option<String>,
}

impl Ticket {
    pub fn is_redeemed(&self) -> bool {
        self.state == TicketState::Redeemed
    }

    /// Apply the Active→Redeemed transition.
    ///
    /// Callers must hold the per-ticket lock and must have checked that the
    /// ticket is still active.
    pub fn apply_redemption(&mut self, stamp: &RedemptionStamp) {
        debug_assert!(!self.is_redeemed());
        self.state = TicketState::Redeemed;
        self.redeemed_at = Some(stamp.at);
        self.redeemed_by = Some(stamp.validator.clone());
        self.redeemed_device = Some(stamp.device.clone());
        self.redeemed_location = Some(stamp.location.clone());
    }

    /// Whether this ticket was redeemed by exactly this stamp.
    pub fn redeemed_with(&self, stamp: &RedemptionStamp) -> bool {
        self.is_redeemed()
            && self.redeemed_at == Some(stamp.at)
            && self.redeemed_by.as_deref() == Some(stamp.validator.as_str())
            && self.redeemed_device.as_deref() == Some(stamp.device.as_str())
            && self.redeemed_location.as_deref() == Some(stamp.location.as_str())
    }

    /// Copy state and redemption fields from another version of this ticket.
    fn inherit_redemption(&mut self, previous: &Ticket) {
        self.state = previous.state;
        self.redeemed_at = previous.redeemed_at;
        self.redeemed_by = previous.redeemed_by.clone();
        self.redeemed_device = previous.redeemed_device.clone();
        self.redeemed_location = previous.redeemed_location.clone();
    }
}

/// Who redeemed a ticket, where, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionStamp {
    pub at: DateTime<Utc>,
    pub validator: String,
    pub device: String,
    pub location: String,
}

impl RedemptionStamp {
    /// Stamp a redemption happening now.
    pub fn new(validator: String, device: String, location: String) -> Self {
        Self {
            at: now_micros(),
            validator,
            device,
            location,
        }
    }

    /// Stamp for tickets whose import row already marks them as used.
    pub fn imported(at: DateTime<Utc>) -> Self {
        Self {
            at,
            validator: IMPORT_LABEL.to_string(),
            device: IMPORT_LABEL.to_string(),
            location: IMPORT_LABEL.to_string(),
        }
    }
}

/// How an import treats a code whose stored ticket is already redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReimportPolicy {
    /// Keep the stored redemption unless the row carries an explicit state.
    #[default]
    Preserve,

    /// The row's state (active when absent) always replaces the stored one.
    Overwrite,
}

/// A ticket as described by one import row.
///
/// Descriptive fields are always replaced on upsert. `state` is `None` when
/// the row did not say anything about the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketUpsert {
    pub code: String,
    pub holder_name: String,
    pub email: String,
    pub event_name: String,
    pub event_date: String,
    pub ticket_type: String,
    pub price_cents: i64,
    pub seat: String,
    pub state: Option<TicketState>,
}

impl TicketUpsert {
    /// Build the ticket that replaces `existing` (if any).
    ///
    /// `created_at` always survives from the first import. A ticket that ends
    /// up redeemed keeps an existing redemption stamp rather than re-stamping.
    pub fn into_ticket(
        self,
        existing: Option<&Ticket>,
        policy: ReimportPolicy,
        now: DateTime<Utc>,
    ) -> Ticket {
        let previous_redemption = existing.filter(|ticket| ticket.is_redeemed());

        let mut ticket = Ticket {
            code: self.code,
            holder_name: self.holder_name,
            email: self.email,
            event_name: self.event_name,
            event_date: self.event_date,
            ticket_type: self.ticket_type,
            price_cents: self.price_cents,
            seat: self.seat,
            state: TicketState::Active,
            created_at: existing.map_or(now, |ticket| ticket.created_at),
            redeemed_at: None,
            redeemed_by: None,
            redeemed_device: None,
            redeemed_location: None,
        };

        let target = match (policy, self.state) {
            (_, Some(state)) => state,
            (ReimportPolicy::Preserve, None) => previous_redemption
                .map_or(TicketState::Active, |ticket| ticket.state),
            (ReimportPolicy::Overwrite, None) => TicketState::Active,
        };

        if target == TicketState::Redeemed {
            match previous_redemption {
                Some(previous) => ticket.inherit_redemption(previous),
                None => ticket.apply_redemption(&RedemptionStamp::imported(now)),
            }
        }

        ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upsert(code: &str, state: Option<TicketState>) -> TicketUpsert {
        TicketUpsert {
            code: code.to_string(),
            holder_name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            event_name: "Concert".to_string(),
            event_date: "2025-06-01 20:00".to_string(),
            ticket_type: "VIP".to_string(),
            price_cents: 4500,
            seat: "A1".to_string(),
            state,
        }
    }

    fn redeemed_ticket(code: &str) -> Ticket {
        let created = now_micros();
        let mut ticket = upsert(code, None).into_ticket(None, ReimportPolicy::Preserve, created);
        ticket.apply_redemption(&RedemptionStamp::new(
            "gate-1".to_string(),
            "scanner-7".to_string(),
            "north".to_string(),
        ));
        ticket
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(TicketState::from_label("ACTIVO"), Some(TicketState::Active));
        assert_eq!(TicketState::from_label(" usado "), Some(TicketState::Redeemed));
        assert_eq!(TicketState::from_label("Used"), Some(TicketState::Redeemed));
        assert_eq!(TicketState::from_label("cancelled"), None);
        assert!(TicketState::try_from("usado".to_string()).is_err());
    }

    #[test]
    fn test_new_ticket_is_active() {
        let now = now_micros();
        let ticket = upsert("T1", None).into_ticket(None, ReimportPolicy::Preserve, now);

        assert_eq!(ticket.state, TicketState::Active);
        assert_eq!(ticket.created_at, now);
        assert!(ticket.redeemed_at.is_none());
        assert!(ticket.redeemed_by.is_none());
    }

    #[test]
    fn test_import_as_redeemed_is_stamped() {
        let now = now_micros();
        let ticket = upsert("T1", Some(TicketState::Redeemed)).into_ticket(
            None,
            ReimportPolicy::Preserve,
            now,
        );

        assert!(ticket.is_redeemed());
        assert_eq!(ticket.redeemed_at, Some(now));
        assert_eq!(ticket.redeemed_by.as_deref(), Some(IMPORT_LABEL));
    }

    #[test]
    fn test_preserve_keeps_redemption_on_reimport() {
        let existing = redeemed_ticket("T1");
        let mut row = upsert("T1", None);
        row.holder_name = "Ana Maria".to_string();

        let ticket = row.into_ticket(Some(&existing), ReimportPolicy::Preserve, now_micros());

        assert!(ticket.is_redeemed());
        assert_eq!(ticket.holder_name, "Ana Maria");
        assert_eq!(ticket.redeemed_at, existing.redeemed_at);
        assert_eq!(ticket.redeemed_by.as_deref(), Some("gate-1"));
        assert_eq!(ticket.created_at, existing.created_at);
    }

    #[test]
    fn test_explicit_state_overrides_preserve() {
        let existing = redeemed_ticket("T1");

        let ticket = upsert("T1", Some(TicketState::Active)).into_ticket(
            Some(&existing),
            ReimportPolicy::Preserve,
            now_micros(),
        );

        assert_eq!(ticket.state, TicketState::Active);
        assert!(ticket.redeemed_at.is_none());
        assert!(ticket.redeemed_location.is_none());
    }

    #[test]
    fn test_overwrite_resets_redemption() {
        let existing = redeemed_ticket("T1");

        let ticket = upsert("T1", None).into_ticket(
            Some(&existing),
            ReimportPolicy::Overwrite,
            now_micros(),
        );

        assert_eq!(ticket.state, TicketState::Active);
        assert!(ticket.redeemed_at.is_none());
    }

    #[test]
    fn test_redeemed_row_never_restamps() {
        let existing = redeemed_ticket("T1");

        let ticket = upsert("T1", Some(TicketState::Redeemed)).into_ticket(
            Some(&existing),
            ReimportPolicy::Overwrite,
            now_micros(),
        );

        assert_eq!(ticket.redeemed_at, existing.redeemed_at);
        assert_eq!(ticket.redeemed_device.as_deref(), Some("scanner-7"));
    }

    #[test]
    fn test_redeemed_with_matches_only_its_own_stamp() {
        let mut ticket = upsert("T1", None).into_ticket(None, ReimportPolicy::Preserve, now_micros());
        let stamp = RedemptionStamp::new(
            "gate-1".to_string(),
            "scanner-7".to_string(),
            "north".to_string(),
        );
        assert!(!ticket.redeemed_with(&stamp));

        ticket.apply_redemption(&stamp);
        assert!(ticket.redeemed_with(&stamp));

        let other = RedemptionStamp {
            validator: "gate-2".to_string(),
            ..stamp.clone()
        };
        assert!(!ticket.redeemed_with(&other));
    }
}
