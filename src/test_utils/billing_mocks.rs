//! In-memory mock implementations for the billing repository traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{
        payment_event::{IdempotencyOutcome, NewPaymentEvent, PaymentEvent, PaymentProvider},
        subscription::SubscriptionRecord,
        user_account::UserAccount,
    },
    ports::ProviderDirectory,
    use_cases::billing::{
        NewSubscriptionRecord, PaymentEventRepo, SubscriptionRepo, UserAccountRepo,
    },
};

// ============================================================================
// InMemorySubscriptionRepo
// ============================================================================

#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    pub records: Mutex<HashMap<Uuid, SubscriptionRecord>>,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<SubscriptionRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.tenant_id, r)).collect();
        Self {
            records: Mutex::new(map),
        }
    }

    pub fn get(&self, tenant_id: Uuid) -> Option<SubscriptionRecord> {
        self.records.lock().unwrap().get(&tenant_id).cloned()
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn get_by_tenant(&self, tenant_id: Uuid) -> AppResult<Option<SubscriptionRecord>> {
        Ok(self.records.lock().unwrap().get(&tenant_id).cloned())
    }

    async fn get_by_subscription_ref(
        &self,
        provider_subscription_ref: &str,
    ) -> AppResult<Option<SubscriptionRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|r| r.provider_subscription_ref.as_deref() == Some(provider_subscription_ref))
            .cloned())
    }

    async fn get_by_customer_ref(
        &self,
        provider_customer_ref: &str,
    ) -> AppResult<Option<SubscriptionRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|r| r.provider_customer_ref.as_deref() == Some(provider_customer_ref))
            .cloned())
    }

    async fn create(&self, input: &NewSubscriptionRecord) -> AppResult<SubscriptionRecord> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&input.tenant_id) {
            return Err(AppError::Conflict);
        }
        let now = Utc::now();
        let record = SubscriptionRecord {
            id: Uuid::new_v4(),
            tenant_id: input.tenant_id,
            stored_status: input.stored_status,
            plan: input.plan.clone(),
            trial_start: input.trial_start,
            trial_end: input.trial_end,
            active_period_start: input.active_period_start,
            active_period_end: input.active_period_end,
            provider_customer_ref: input.provider_customer_ref.clone(),
            provider_subscription_ref: input.provider_subscription_ref.clone(),
            cancelled_at: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        records.insert(record.tenant_id, record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        record: &SubscriptionRecord,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> AppResult<SubscriptionRecord> {
        let mut records = self.records.lock().unwrap();
        let current = records
            .get(&record.tenant_id)
            .ok_or(AppError::Conflict)?;
        if current.updated_at != expected_updated_at {
            return Err(AppError::Conflict);
        }
        let mut next = record.clone();
        next.updated_at = Some(Utc::now());
        records.insert(next.tenant_id, next.clone());
        Ok(next)
    }

    async fn set_provider_refs(
        &self,
        tenant_id: Uuid,
        customer_ref: Option<&str>,
        subscription_ref: Option<&str>,
    ) -> AppResult<()> {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.get_mut(&tenant_id) {
            if let Some(customer_ref) = customer_ref {
                record.provider_customer_ref = Some(customer_ref.to_string());
            }
            if let Some(subscription_ref) = subscription_ref {
                record.provider_subscription_ref = Some(subscription_ref.to_string());
            }
            record.updated_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn delete(&self, tenant_id: Uuid) -> AppResult<()> {
        self.records.lock().unwrap().remove(&tenant_id);
        Ok(())
    }
}

// ============================================================================
// InMemoryPaymentEventRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryPaymentEventRepo {
    pub events: Mutex<HashMap<String, PaymentEvent>>,
}

impl InMemoryPaymentEventRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentEventRepo for InMemoryPaymentEventRepo {
    async fn record_if_new(&self, event: &NewPaymentEvent) -> AppResult<IdempotencyOutcome> {
        // Single lock held across check and insert, matching the atomicity
        // of the database's unique constraint.
        let mut events = self.events.lock().unwrap();
        if events.contains_key(&event.external_event_id) {
            return Ok(IdempotencyOutcome::AlreadyProcessed);
        }
        let stored = PaymentEvent {
            id: Uuid::new_v4(),
            external_event_id: event.external_event_id.clone(),
            provider: event.provider,
            status: event.status,
            amount_cents: event.amount_cents,
            currency: event.currency.clone(),
            tenant_id: event.tenant_id,
            occurred_at: event.occurred_at,
            raw_payload: event.raw_payload.clone(),
            created_at: Some(Utc::now()),
        };
        events.insert(stored.external_event_id.clone(), stored.clone());
        Ok(IdempotencyOutcome::Inserted(stored))
    }

    async fn list_by_tenant(&self, tenant_id: Uuid, limit: i64) -> AppResult<Vec<PaymentEvent>> {
        let mut events: Vec<PaymentEvent> = self
            .events
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.tenant_id == Some(tenant_id))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        events.truncate(limit as usize);
        Ok(events)
    }
}

// ============================================================================
// InMemoryUserAccountRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryUserAccountRepo {
    pub accounts: Mutex<HashMap<Uuid, UserAccount>>,
}

impl InMemoryUserAccountRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(accounts: Vec<UserAccount>) -> Self {
        let map = accounts.into_iter().map(|a| (a.id, a)).collect();
        Self {
            accounts: Mutex::new(map),
        }
    }

    pub fn all_active_for(&self, tenant_id: Uuid) -> bool {
        let accounts = self.accounts.lock().unwrap();
        let mut found = false;
        for account in accounts.values().filter(|a| a.tenant_id == tenant_id) {
            found = true;
            if !account.active {
                return false;
            }
        }
        found
    }
}

#[async_trait]
impl UserAccountRepo for InMemoryUserAccountRepo {
    async fn set_active_for_tenant(&self, tenant_id: Uuid, active: bool) -> AppResult<u64> {
        let mut accounts = self.accounts.lock().unwrap();
        let mut touched = 0;
        for account in accounts.values_mut() {
            if account.tenant_id == tenant_id && account.active != active {
                account.active = active;
                account.updated_at = Some(Utc::now());
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn tenants_by_email(&self, email: &str) -> AppResult<Vec<Uuid>> {
        let accounts = self.accounts.lock().unwrap();
        let mut tenants: Vec<Uuid> = accounts
            .values()
            .filter(|a| a.email.eq_ignore_ascii_case(email))
            .map(|a| a.tenant_id)
            .collect();
        tenants.sort();
        tenants.dedup();
        Ok(tenants)
    }
}

// ============================================================================
// StubProviderDirectory
// ============================================================================

/// Provider API stub. Empty by default; seed lookups per test.
#[derive(Default)]
pub struct StubProviderDirectory {
    pub emails: Mutex<HashMap<String, String>>,
    pub periods: Mutex<HashMap<String, (DateTime<Utc>, DateTime<Utc>)>>,
}

impl StubProviderDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_email(&self, customer_ref: &str, email: &str) {
        self.emails
            .lock()
            .unwrap()
            .insert(customer_ref.to_string(), email.to_string());
    }

    pub fn set_period(&self, subscription_ref: &str, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.periods
            .lock()
            .unwrap()
            .insert(subscription_ref.to_string(), (start, end));
    }
}

#[async_trait]
impl ProviderDirectory for StubProviderDirectory {
    async fn customer_email(
        &self,
        _provider: PaymentProvider,
        customer_ref: &str,
    ) -> AppResult<Option<String>> {
        Ok(self.emails.lock().unwrap().get(customer_ref).cloned())
    }

    async fn subscription_period(
        &self,
        _provider: PaymentProvider,
        subscription_ref: &str,
    ) -> AppResult<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        Ok(self.periods.lock().unwrap().get(subscription_ref).copied())
    }
}
