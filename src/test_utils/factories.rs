//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible
//! defaults. Use the closure parameter to override specific fields.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::entities::{
    payment_event::{NewPaymentEvent, PaymentEventStatus, PaymentProvider},
    subscription::{StoredStatus, SubscriptionRecord},
    user_account::UserAccount,
};

fn test_datetime() -> DateTime<Utc> {
    Utc::now()
}

/// Create a subscription record with an active paid period 30 days out.
pub fn create_test_record(
    tenant_id: Uuid,
    overrides: impl FnOnce(&mut SubscriptionRecord),
) -> SubscriptionRecord {
    let now = test_datetime();
    let mut record = SubscriptionRecord {
        id: Uuid::new_v4(),
        tenant_id,
        stored_status: StoredStatus::Active,
        plan: "standard".to_string(),
        trial_start: None,
        trial_end: None,
        active_period_start: Some(now),
        active_period_end: Some(now + Duration::days(30)),
        provider_customer_ref: None,
        provider_subscription_ref: None,
        cancelled_at: None,
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut record);
    record
}

pub fn create_test_account(
    tenant_id: Uuid,
    overrides: impl FnOnce(&mut UserAccount),
) -> UserAccount {
    let now = test_datetime();
    let mut account = UserAccount {
        id: Uuid::new_v4(),
        tenant_id,
        email: format!("user-{}@example.com", Uuid::new_v4().simple()),
        active: true,
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut account);
    account
}

pub fn create_test_event(
    tenant_id: Option<Uuid>,
    overrides: impl FnOnce(&mut NewPaymentEvent),
) -> NewPaymentEvent {
    let mut event = NewPaymentEvent {
        external_event_id: format!("evt_{}", Uuid::new_v4().simple()),
        provider: PaymentProvider::Card,
        status: PaymentEventStatus::Approved,
        amount_cents: 4990,
        currency: "brl".to_string(),
        tenant_id,
        occurred_at: test_datetime(),
        raw_payload: serde_json::json!({}),
    };
    overrides(&mut event);
    event
}
