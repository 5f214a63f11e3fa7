use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status last written by a transition. Advisory only: access decisions go
/// through [`SubscriptionRecord::derive_status`], never through this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "stored_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StoredStatus {
    Trial,
    Active,
    Suspended,
    Cancelled,
}

/// Status computed at read time from the stored record and the clock.
/// Authoritative for access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveStatus {
    Trial,
    Active,
    Expired,
    Suspended,
    Cancelled,
}

impl EffectiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectiveStatus::Trial => "trial",
            EffectiveStatus::Active => "active",
            EffectiveStatus::Expired => "expired",
            EffectiveStatus::Suspended => "suspended",
            EffectiveStatus::Cancelled => "cancelled",
        }
    }

    /// Whether this status grants product access.
    pub fn grants_access(&self) -> bool {
        matches!(self, EffectiveStatus::Trial | EffectiveStatus::Active)
    }
}

/// One subscription record per tenant. Trial and active windows may both be
/// populated historically; the derivation decides which one is current.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub stored_status: StoredStatus,
    pub plan: String,
    pub trial_start: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub active_period_start: Option<DateTime<Utc>>,
    pub active_period_end: Option<DateTime<Utc>>,
    pub provider_customer_ref: Option<String>,
    pub provider_subscription_ref: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SubscriptionRecord {
    /// Compute the effective status at `now`. Pure: no I/O, no mutation.
    ///
    /// Priority order, first match wins:
    /// 1. Cancelled wins over everything.
    /// 2. Suspension is sticky; only an explicit reactivation clears it.
    /// 3. Active expires when the paid period has lapsed (edge inclusive);
    ///    no period end means no date-based expiry.
    /// 4. Trial expires when the trial window has lapsed (edge inclusive);
    ///    no trial end means no date-based expiry.
    ///
    /// Providers do not reliably push an "expired" event the instant a period
    /// lapses, so entitlement must be answerable from stored dates alone.
    pub fn derive_status(&self, now: DateTime<Utc>) -> EffectiveStatus {
        match self.stored_status {
            StoredStatus::Cancelled => EffectiveStatus::Cancelled,
            StoredStatus::Suspended => EffectiveStatus::Suspended,
            StoredStatus::Active => match self.active_period_end {
                Some(end) if end <= now => EffectiveStatus::Expired,
                _ => EffectiveStatus::Active,
            },
            StoredStatus::Trial => match self.trial_end {
                Some(end) if end <= now => EffectiveStatus::Expired,
                // No end date means the trial is unbounded until a
                // transition writes one, same as Active without a period end.
                _ => EffectiveStatus::Trial,
            },
        }
    }

    /// Whether the tenant is currently entitled to product access.
    pub fn has_access(&self, now: DateTime<Utc>) -> bool {
        self.derive_status(now).grants_access()
    }
}
