use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{http::app_state::AppState, persistence::PostgresPersistence},
    infra::{card_client::CardProcessorClient, config::AppConfig, db::init_db},
    ports::ProviderDirectory,
    use_cases::{
        billing::{BillingUseCases, PaymentEventRepo, SubscriptionRepo, UserAccountRepo},
        webhook::WebhookUseCases,
    },
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let pool = init_db(&config.database_url).await?;
    let postgres_arc = Arc::new(PostgresPersistence::new(pool));

    let subscription_repo = postgres_arc.clone() as Arc<dyn SubscriptionRepo>;
    let payment_event_repo = postgres_arc.clone() as Arc<dyn PaymentEventRepo>;
    let user_account_repo = postgres_arc.clone() as Arc<dyn UserAccountRepo>;

    let provider_directory = Arc::new(CardProcessorClient::new(
        config.card_api_base.clone(),
        config.card_api_key.clone(),
    )) as Arc<dyn ProviderDirectory>;

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

    Ok(AppState {
        config: Arc::new(config),
        billing_use_cases: Arc::new(billing_use_cases),
        webhook_use_cases: Arc::new(webhook_use_cases),
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "subtrack_api=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
