//! Test app state builder for HTTP-level integration testing.
//!
//! Creates a minimal `AppState` backed by in-memory mocks, and keeps handles
//! to them so tests can assert on repository state after requests.

use std::sync::Arc;

use axum::http::HeaderValue;
use secrecy::SecretString;
use time::Duration;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    application::jwt,
    domain::entities::{subscription::SubscriptionRecord, user_account::UserAccount},
    infra::config::AppConfig,
    ports::ProviderDirectory,
    test_utils::{
        InMemoryPaymentEventRepo, InMemorySubscriptionRepo, InMemoryUserAccountRepo,
        StubProviderDirectory,
    },
    use_cases::{
        billing::{BillingUseCases, PaymentEventRepo, SubscriptionRepo, UserAccountRepo},
        webhook::WebhookUseCases,
    },
};

pub const JWT_TEST_SECRET: &str = "test_jwt_secret";
pub const CARD_TEST_SECRET: &str = "whsec_card_test";
pub const PIX_TEST_SECRET: &str = "whsec_pix_test";

fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: SecretString::new(JWT_TEST_SECRET.into()),
        cors_origin: HeaderValue::from_static("http://localhost:3000"),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        database_url: String::new(),
        card_webhook_secret: SecretString::new(CARD_TEST_SECRET.into()),
        pix_webhook_secret: SecretString::new(PIX_TEST_SECRET.into()),
        card_api_base: "http://localhost:0".to_string(),
        card_api_key: SecretString::new("test_card_key".into()),
        payment_events_limit: 100,
    }
}

/// Issue a token signed with the test secret.
pub fn issue_test_token(role: &str, tenant_id: Option<Uuid>) -> String {
    jwt::issue(
        Uuid::new_v4(),
        role,
        tenant_id,
        &SecretString::new(JWT_TEST_SECRET.into()),
        Duration::hours(1),
    )
    .unwrap()
}

pub struct TestAppStateBuilder {
    pub subscription_repo: Arc<InMemorySubscriptionRepo>,
    pub payment_event_repo: Arc<InMemoryPaymentEventRepo>,
    pub user_account_repo: Arc<InMemoryUserAccountRepo>,
    pub provider_directory: Arc<StubProviderDirectory>,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            subscription_repo: Arc::new(InMemorySubscriptionRepo::new()),
            payment_event_repo: Arc::new(InMemoryPaymentEventRepo::new()),
            user_account_repo: Arc::new(InMemoryUserAccountRepo::new()),
            provider_directory: Arc::new(StubProviderDirectory::new()),
        }
    }

    pub fn with_record(self, record: SubscriptionRecord) -> Self {
        self.subscription_repo
            .records
            .lock()
            .unwrap()
            .insert(record.tenant_id, record);
        self
    }

    pub fn with_account(self, account: UserAccount) -> Self {
        self.user_account_repo
            .accounts
            .lock()
            .unwrap()
            .insert(account.id, account);
        self
    }

    /// Build an `AppState`; the builder keeps its mock handles so state can
    /// be inspected afterwards.
    pub fn build(&self) -> AppState {
        let subscription_repo = self.subscription_repo.clone() as Arc<dyn SubscriptionRepo>;
        let payment_event_repo = self.payment_event_repo.clone() as Arc<dyn PaymentEventRepo>;
        let user_account_repo = self.user_account_repo.clone() as Arc<dyn UserAccountRepo>;
        let provider_directory = self.provider_directory.clone() as Arc<dyn ProviderDirectory>;

        let billing_use_cases = BillingUseCases::new(
            subscription_repo.clone(),
            payment_event_repo.clone(),
            user_account_repo.clone(),
        );
        let webhook_use_cases = WebhookUseCases::new(
            billing_use_cases.clone(),
            subscription_repo,
            payment_event_repo,
            user_account_repo,
            provider_directory,
        );

        AppState {
            config: Arc::new(test_config()),
            billing_use_cases: Arc::new(billing_use_cases),
            webhook_use_cases: Arc::new(webhook_use_cases),
        }
    }

    // Assertion helpers

    pub fn record(&self, tenant_id: Uuid) -> Option<SubscriptionRecord> {
        self.subscription_repo.get(tenant_id)
    }

    pub fn account_active(&self, tenant_id: Uuid) -> bool {
        self.user_account_repo.all_active_for(tenant_id)
    }

    pub fn event_count(&self) -> usize {
        self.payment_event_repo.count()
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
