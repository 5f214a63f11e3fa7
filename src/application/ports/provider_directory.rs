use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{app_error::AppResult, domain::entities::payment_event::PaymentProvider};

/// Outbound lookups against a payment provider's API. Used when a webhook
/// payload alone is not enough: resolving a customer reference to an email,
/// or fetching the billing period an event omitted.
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    /// Billing contact email for a provider customer reference, if the
    /// provider exposes one.
    async fn customer_email(
        &self,
        provider: PaymentProvider,
        customer_ref: &str,
    ) -> AppResult<Option<String>>;

    /// Current billing period of a provider subscription, if the provider
    /// exposes one.
    async fn subscription_period(
        &self,
        provider: PaymentProvider,
        subscription_ref: &str,
    ) -> AppResult<Option<(DateTime<Utc>, DateTime<Utc>)>>;
}
