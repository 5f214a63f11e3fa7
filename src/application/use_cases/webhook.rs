use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{
        payment_event::{NewPaymentEvent, PaymentEventStatus, PaymentProvider},
        transition::{EventKind, Transition},
    },
    ports::ProviderDirectory,
    use_cases::billing::{BillingUseCases, PaymentEventRepo, SubscriptionRepo, UserAccountRepo},
};

/// A provider webhook event reduced to the fields the pipeline acts on.
/// Provider-specific payload shapes stop at normalization; everything past
/// this point is provider-agnostic.
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    pub external_event_id: String,
    pub provider: PaymentProvider,
    pub kind: EventKind,
    pub customer_ref: Option<String>,
    pub subscription_ref: Option<String>,
    pub customer_email: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
    pub raw_payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Ledger hit on `external_event_id`; nothing was re-applied.
    Duplicate,
    /// Event recorded for audit; its kind carries no subscription transition.
    RecordedOnly,
    Processed {
        entitlement_changed: bool,
    },
}

// ============================================================================
// Normalization
// ============================================================================

fn str_field<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

fn epoch_field(value: &Value, pointer: &str) -> Option<DateTime<Utc>> {
    value
        .pointer(pointer)
        .and_then(Value::as_i64)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

fn rfc3339_field(value: &Value, pointer: &str) -> Option<DateTime<Utc>> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Map a card-processor event payload (epoch timestamps, nested
/// `data.object`) to a [`NormalizedEvent`]. Returns `Ok(None)` for event
/// types the pipeline does not handle; those are acknowledged and dropped.
pub fn normalize_card_event(payload: &Value) -> AppResult<Option<NormalizedEvent>> {
    let kind = match str_field(payload, "/type") {
        Some("checkout.session.completed") => EventKind::CheckoutCompleted,
        Some("invoice.paid") => EventKind::InvoicePaid,
        Some("invoice.payment_failed") => EventKind::PaymentFailed,
        Some("customer.subscription.deleted") => EventKind::SubscriptionCancelled,
        Some("charge.refunded") => EventKind::ChargeRefunded,
        Some(_) => return Ok(None),
        None => return Err(AppError::InvalidInput("missing event type".into())),
    };
    let external_event_id = str_field(payload, "/id")
        .ok_or_else(|| AppError::InvalidInput("missing event id".into()))?
        .to_string();
    let occurred_at = epoch_field(payload, "/created")
        .ok_or_else(|| AppError::InvalidInput("missing or invalid created timestamp".into()))?;

    Ok(Some(NormalizedEvent {
        external_event_id,
        provider: PaymentProvider::Card,
        kind,
        customer_ref: str_field(payload, "/data/object/customer").map(str::to_string),
        subscription_ref: str_field(payload, "/data/object/subscription").map(str::to_string),
        customer_email: str_field(payload, "/data/object/customer_email").map(str::to_string),
        amount_cents: payload
            .pointer("/data/object/amount")
            .and_then(Value::as_i64)
            .unwrap_or(0),
        currency: str_field(payload, "/data/object/currency")
            .unwrap_or("brl")
            .to_string(),
        period_start: epoch_field(payload, "/data/object/period_start"),
        period_end: epoch_field(payload, "/data/object/period_end"),
        occurred_at,
        raw_payload: payload.clone(),
    }))
}

/// Map a PIX-processor event payload (flat shape, RFC 3339 timestamps) to a
/// [`NormalizedEvent`].
pub fn normalize_pix_event(payload: &Value) -> AppResult<Option<NormalizedEvent>> {
    let kind = match str_field(payload, "/event") {
        Some("payment_approved") => EventKind::CheckoutCompleted,
        Some("recurring_payment_confirmed") => EventKind::InvoicePaid,
        Some("payment_refused") => EventKind::PaymentFailed,
        Some("subscription_cancelled") => EventKind::SubscriptionCancelled,
        Some("refund_issued") => EventKind::ChargeRefunded,
        Some(_) => return Ok(None),
        None => return Err(AppError::InvalidInput("missing event name".into())),
    };
    let external_event_id = str_field(payload, "/event_id")
        .ok_or_else(|| AppError::InvalidInput("missing event_id".into()))?
        .to_string();
    let occurred_at = rfc3339_field(payload, "/occurred_at")
        .ok_or_else(|| AppError::InvalidInput("missing or invalid occurred_at".into()))?;

    Ok(Some(NormalizedEvent {
        external_event_id,
        provider: PaymentProvider::Pix,
        kind,
        customer_ref: str_field(payload, "/customer/ref").map(str::to_string),
        subscription_ref: str_field(payload, "/subscription_ref").map(str::to_string),
        customer_email: str_field(payload, "/customer/email").map(str::to_string),
        amount_cents: payload
            .pointer("/amount_cents")
            .and_then(Value::as_i64)
            .unwrap_or(0),
        currency: str_field(payload, "/currency").unwrap_or("BRL").to_string(),
        period_start: rfc3339_field(payload, "/period_start"),
        period_end: rfc3339_field(payload, "/period_end"),
        occurred_at,
        raw_payload: payload.clone(),
    }))
}

fn ledger_status(kind: EventKind) -> PaymentEventStatus {
    match kind {
        EventKind::CheckoutCompleted
        | EventKind::InvoicePaid
        | EventKind::SubscriptionCancelled => PaymentEventStatus::Approved,
        EventKind::PaymentFailed => PaymentEventStatus::Refused,
        EventKind::ChargeRefunded => PaymentEventStatus::Refunded,
    }
}

// ============================================================================
// Ingestion
// ============================================================================

#[derive(Clone)]
pub struct WebhookUseCases {
    billing: BillingUseCases,
    subscription_repo: Arc<dyn SubscriptionRepo>,
    payment_event_repo: Arc<dyn PaymentEventRepo>,
    user_account_repo: Arc<dyn UserAccountRepo>,
    provider_directory: Arc<dyn ProviderDirectory>,
}

impl WebhookUseCases {
    pub fn new(
        billing: BillingUseCases,
        subscription_repo: Arc<dyn SubscriptionRepo>,
        payment_event_repo: Arc<dyn PaymentEventRepo>,
        user_account_repo: Arc<dyn UserAccountRepo>,
        provider_directory: Arc<dyn ProviderDirectory>,
    ) -> Self {
        Self {
            billing,
            subscription_repo,
            payment_event_repo,
            user_account_repo,
            provider_directory,
        }
    }

    /// Run one normalized event through the pipeline:
    /// resolve tenant, write the ledger row (or stop on a duplicate), map the
    /// event to a transition, apply it through the engine.
    ///
    /// The ledger write commits before the transition. If the process dies in
    /// between, the provider's retry is answered as a duplicate; the retained
    /// raw payload and the idempotent engine make manual replay safe. Errors
    /// returned here are classified by [`AppError::is_retryable`] at the HTTP
    /// edge.
    pub async fn ingest(&self, event: NormalizedEvent, now: DateTime<Utc>) -> AppResult<IngestOutcome> {
        let mut resolved = self.resolve_by_refs(&event).await?;

        let outcome = self
            .payment_event_repo
            .record_if_new(&NewPaymentEvent {
                external_event_id: event.external_event_id.clone(),
                provider: event.provider,
                status: ledger_status(event.kind),
                amount_cents: event.amount_cents,
                currency: event.currency.clone(),
                tenant_id: resolved,
                occurred_at: event.occurred_at,
                raw_payload: event.raw_payload.clone(),
            })
            .await?;

        if outcome.is_duplicate() {
            tracing::info!(
                external_event_id = %event.external_event_id,
                provider = event.provider.as_str(),
                "Duplicate webhook delivery, already processed"
            );
            return Ok(IngestOutcome::Duplicate);
        }

        // References unseen before: fall back to email and remember the refs
        // so the next event from this provider resolves directly.
        if resolved.is_none() {
            resolved = self.resolve_by_email(&event).await?;
            if let Some(tenant_id) = resolved {
                self.subscription_repo
                    .set_provider_refs(
                        tenant_id,
                        event.customer_ref.as_deref(),
                        event.subscription_ref.as_deref(),
                    )
                    .await?;
                tracing::info!(%tenant_id, provider = event.provider.as_str(), "Linked provider references to tenant");
            }
        }

        let Some(transition) = self.transition_for(&event).await? else {
            tracing::info!(
                external_event_id = %event.external_event_id,
                kind = event.kind.as_str(),
                "Event recorded, no subscription transition"
            );
            return Ok(IngestOutcome::RecordedOnly);
        };

        let Some(tenant_id) = resolved else {
            // The event row stays for the operator queue; replaying it after
            // fixing the linkage is safe.
            return Err(AppError::UnresolvedTenant(format!(
                "event {} has no matching tenant",
                event.external_event_id
            )));
        };

        let applied = self.billing.apply_transition(tenant_id, transition, now).await?;
        Ok(IngestOutcome::Processed {
            entitlement_changed: applied.entitlement_changed,
        })
    }

    async fn resolve_by_refs(&self, event: &NormalizedEvent) -> AppResult<Option<Uuid>> {
        if let Some(sub_ref) = event.subscription_ref.as_deref()
            && let Some(record) = self.subscription_repo.get_by_subscription_ref(sub_ref).await?
        {
            return Ok(Some(record.tenant_id));
        }
        if let Some(cust_ref) = event.customer_ref.as_deref()
            && let Some(record) = self.subscription_repo.get_by_customer_ref(cust_ref).await?
        {
            return Ok(Some(record.tenant_id));
        }
        Ok(None)
    }

    /// Email fallback: the payload's email first, then a provider API lookup
    /// by customer reference. A match counts only when exactly one tenant
    /// owns the address; ambiguity is treated as unresolved.
    async fn resolve_by_email(&self, event: &NormalizedEvent) -> AppResult<Option<Uuid>> {
        let email = match &event.customer_email {
            Some(email) => Some(email.clone()),
            None => match event.customer_ref.as_deref() {
                Some(cust_ref) => {
                    self.provider_directory
                        .customer_email(event.provider, cust_ref)
                        .await?
                }
                None => None,
            },
        };
        let Some(email) = email else {
            return Ok(None);
        };

        let tenants = self.user_account_repo.tenants_by_email(&email).await?;
        match tenants.as_slice() {
            [tenant_id] => Ok(Some(*tenant_id)),
            [] => Ok(None),
            _ => {
                tracing::warn!(
                    external_event_id = %event.external_event_id,
                    matches = tenants.len(),
                    "Email resolution ambiguous, leaving event unresolved"
                );
                Ok(None)
            }
        }
    }

    /// Map the event kind to the transition it implies, completing the paid
    /// period from the provider API when the payload omitted it.
    async fn transition_for(&self, event: &NormalizedEvent) -> AppResult<Option<Transition>> {
        match event.kind {
            EventKind::InvoicePaid => {
                let (period_start, period_end) = match event.period_end {
                    Some(end) => (event.period_start, Some(end)),
                    None => match event.subscription_ref.as_deref() {
                        Some(sub_ref) => {
                            match self
                                .provider_directory
                                .subscription_period(event.provider, sub_ref)
                                .await?
                            {
                                Some((start, end)) => (Some(start), Some(end)),
                                None => (event.period_start, None),
                            }
                        }
                        None => (event.period_start, None),
                    },
                };
                let period_end = period_end.ok_or_else(|| {
                    AppError::InvalidInput(format!(
                        "event {} confirmed a payment without a billing period",
                        event.external_event_id
                    ))
                })?;
                Ok(Some(Transition::Activate {
                    period_start,
                    period_end,
                }))
            }
            EventKind::SubscriptionCancelled => Ok(Some(Transition::Cancel)),
            EventKind::ChargeRefunded => Ok(Some(Transition::Suspend)),
            EventKind::CheckoutCompleted | EventKind::PaymentFailed => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn card_payload(event_type: &str) -> Value {
        json!({
            "id": "evt_123",
            "type": event_type,
            "created": 1706500000,
            "data": { "object": {
                "customer": "cus_9",
                "subscription": "sub_9",
                "customer_email": "owner@example.com",
                "amount": 4990,
                "currency": "brl",
                "period_start": 1706500000,
                "period_end": 1709178400
            }}
        })
    }

    #[test]
    fn card_invoice_paid_normalizes() {
        let event = normalize_card_event(&card_payload("invoice.paid"))
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, EventKind::InvoicePaid);
        assert_eq!(event.provider, PaymentProvider::Card);
        assert_eq!(event.external_event_id, "evt_123");
        assert_eq!(event.customer_ref.as_deref(), Some("cus_9"));
        assert_eq!(event.subscription_ref.as_deref(), Some("sub_9"));
        assert_eq!(event.amount_cents, 4990);
        assert!(event.period_end.is_some());
    }

    #[test]
    fn card_unknown_type_is_dropped_not_an_error() {
        let result = normalize_card_event(&card_payload("customer.updated")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn card_missing_id_is_invalid() {
        let mut payload = card_payload("invoice.paid");
        payload.as_object_mut().unwrap().remove("id");
        assert!(matches!(
            normalize_card_event(&payload),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn pix_recurring_payment_normalizes() {
        let payload = json!({
            "event_id": "pix_evt_7",
            "event": "recurring_payment_confirmed",
            "customer": { "ref": "c_7", "email": "owner@example.com" },
            "subscription_ref": "s_7",
            "amount_cents": 12900,
            "currency": "BRL",
            "occurred_at": "2024-01-05T12:00:00Z",
            "period_end": "2024-02-05T12:00:00Z"
        });
        let event = normalize_pix_event(&payload).unwrap().unwrap();
        assert_eq!(event.kind, EventKind::InvoicePaid);
        assert_eq!(event.provider, PaymentProvider::Pix);
        assert_eq!(event.customer_email.as_deref(), Some("owner@example.com"));
        assert_eq!(event.period_end.unwrap().to_rfc3339(), "2024-02-05T12:00:00+00:00");
    }

    #[test]
    fn pix_refund_maps_to_refunded_status() {
        assert_eq!(
            ledger_status(EventKind::ChargeRefunded),
            PaymentEventStatus::Refunded
        );
        assert_eq!(
            ledger_status(EventKind::PaymentFailed),
            PaymentEventStatus::Refused
        );
    }
}
