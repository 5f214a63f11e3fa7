use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::payment_event::PaymentProvider,
    ports::ProviderDirectory,
};

/// HTTP client for the card processor's REST API. The PIX processor carries
/// everything we need in its payloads, so only card lookups go out here.
#[derive(Clone)]
pub struct CardProcessorClient {
    client: Client,
    api_base: String,
    api_key: SecretString,
}

#[derive(Debug, Deserialize)]
struct ProviderCustomer {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderSubscription {
    current_period_start: Option<i64>,
    current_period_end: Option<i64>,
}

impl CardProcessorClient {
    pub fn new(api_base: String, api_key: SecretString) -> Self {
        Self {
            client: Client::new(),
            api_base,
            api_key,
        }
    }

    fn auth_header(&self) -> String {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:", self.api_key.expose_secret()));
        format!("Basic {}", encoded)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> AppResult<Option<T>> {
        let response = self
            .client
            .get(format!("{}{}", self.api_base, path))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Provider request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read provider response: {}", e)))?;
        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Card processor API error");
            return Err(AppError::Internal(format!(
                "Card processor API error: {}",
                status
            )));
        }
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| {
                tracing::error!(body = %body, error = %e, "Failed to parse provider response");
                AppError::Internal(format!("Failed to parse provider response: {}", e))
            })
    }
}

fn epoch_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

#[async_trait]
impl ProviderDirectory for CardProcessorClient {
    async fn customer_email(
        &self,
        provider: PaymentProvider,
        customer_ref: &str,
    ) -> AppResult<Option<String>> {
        if provider != PaymentProvider::Card {
            return Ok(None);
        }
        let customer: Option<ProviderCustomer> =
            self.get_json(&format!("/customers/{}", customer_ref)).await?;
        Ok(customer.and_then(|c| c.email))
    }

    async fn subscription_period(
        &self,
        provider: PaymentProvider,
        subscription_ref: &str,
    ) -> AppResult<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        if provider != PaymentProvider::Card {
            return Ok(None);
        }
        let subscription: Option<ProviderSubscription> = self
            .get_json(&format!("/subscriptions/{}", subscription_ref))
            .await?;
        Ok(subscription.and_then(|s| {
            match (
                s.current_period_start.and_then(epoch_to_utc),
                s.current_period_end.and_then(epoch_to_utc),
            ) {
                (Some(start), Some(end)) => Some((start, end)),
                _ => None,
            }
        }))
    }
}
