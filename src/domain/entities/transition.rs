use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A requested change to a tenant's subscription record. Webhooks and the
/// admin channel both construct these; one engine applies them.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Set the record active for the given paid period. When `period_start`
    /// is absent and the tenant is already active, the running period's start
    /// is preserved and the end only ever extends forward.
    Activate {
        period_start: Option<DateTime<Utc>>,
        period_end: DateTime<Utc>,
    },
    /// Sticky suspension; date arithmetic never reverses it.
    Suspend,
    Cancel,
    /// Admin-only destructive removal of the record.
    Delete,
    /// Admin-only trial grant; no provider emits this.
    GrantTrial { days: i64 },
    /// Back to active from suspended or expired.
    Reactivate { period_end: Option<DateTime<Utc>> },
}

impl Transition {
    /// Short tag for logs and the subscription audit trail.
    pub fn kind(&self) -> &'static str {
        match self {
            Transition::Activate { .. } => "activate",
            Transition::Suspend => "suspend",
            Transition::Cancel => "cancel",
            Transition::Delete => "delete",
            Transition::GrantTrial { .. } => "grant_trial",
            Transition::Reactivate { .. } => "reactivate",
        }
    }
}

/// Admin request body: `{"action": "...", ...params}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AdminAction {
    GrantTrial {
        days: i64,
    },
    Activate {
        period_start: Option<DateTime<Utc>>,
        period_end: DateTime<Utc>,
    },
    Suspend,
    Cancel,
    Reactivate {
        period_end: Option<DateTime<Utc>>,
    },
    Delete,
}

impl From<AdminAction> for Transition {
    fn from(action: AdminAction) -> Self {
        match action {
            AdminAction::GrantTrial { days } => Transition::GrantTrial { days },
            AdminAction::Activate {
                period_start,
                period_end,
            } => Transition::Activate {
                period_start,
                period_end,
            },
            AdminAction::Suspend => Transition::Suspend,
            AdminAction::Cancel => Transition::Cancel,
            AdminAction::Reactivate { period_end } => Transition::Reactivate { period_end },
            AdminAction::Delete => Transition::Delete,
        }
    }
}

/// What a provider event means for the subscription, after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Payment received for a one-off checkout start. Recorded only; payment
    /// is not entitlement until the invoice/recurrence confirms.
    CheckoutCompleted,
    /// Recurring payment confirmed; extends the paid period.
    InvoicePaid,
    /// A single failed attempt. Recorded only; suspension is intentionally
    /// decoupled from transient card failures.
    PaymentFailed,
    SubscriptionCancelled,
    /// Money returned; access is suspended.
    ChargeRefunded,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CheckoutCompleted => "checkout_completed",
            EventKind::InvoicePaid => "invoice_paid",
            EventKind::PaymentFailed => "payment_failed",
            EventKind::SubscriptionCancelled => "subscription_cancelled",
            EventKind::ChargeRefunded => "charge_refunded",
        }
    }
}
