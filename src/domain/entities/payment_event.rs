use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a payment event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_provider", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    /// Card/invoice processor (recurring card billing).
    Card,
    /// PIX/boleto processor (bank transfer rails).
    Pix,
    /// Recorded by an administrator, no provider involved.
    Manual,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Card => "card",
            PaymentProvider::Pix => "pix",
            PaymentProvider::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_event_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventStatus {
    Approved,
    Refused,
    Refunded,
}

impl PaymentEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentEventStatus::Approved => "approved",
            PaymentEventStatus::Refused => "refused",
            PaymentEventStatus::Refunded => "refunded",
        }
    }
}

/// Durable proof that a provider event was processed, and the audit trail for
/// reconciliation. Created exactly once per distinct external event, never
/// updated, never deleted.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentEvent {
    pub id: Uuid,
    /// Provider-assigned identifier; the idempotency key. A uniqueness
    /// constraint on this column is the system's only dedupe barrier.
    pub external_event_id: String,
    pub provider: PaymentProvider,
    pub status: PaymentEventStatus,
    pub amount_cents: i64,
    pub currency: String,
    /// May be unresolved when the event cannot be mapped to a tenant.
    pub tenant_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    /// Opaque original payload, kept for forensic replay.
    pub raw_payload: serde_json::Value,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentEvent {
    pub external_event_id: String,
    pub provider: PaymentProvider,
    pub status: PaymentEventStatus,
    pub amount_cents: i64,
    pub currency: String,
    pub tenant_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    pub raw_payload: serde_json::Value,
}

/// Result of the atomic insert-or-detect-conflict ledger write.
#[derive(Debug, Clone)]
pub enum IdempotencyOutcome {
    Inserted(PaymentEvent),
    AlreadyProcessed,
}

impl IdempotencyOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, IdempotencyOutcome::AlreadyProcessed)
    }
}
