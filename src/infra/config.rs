use std::net::SocketAddr;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;

pub struct AppConfig {
    pub jwt_secret: SecretString,
    pub cors_origin: HeaderValue,
    pub bind_addr: SocketAddr,
    pub database_url: String,
    /// Shared secret for the card processor's `t=,v1=` signature scheme.
    pub card_webhook_secret: SecretString,
    /// Shared secret for the PIX processor's plain HMAC signature.
    pub pix_webhook_secret: SecretString,
    pub card_api_base: String,
    pub card_api_key: SecretString,
    /// Page size cap for the admin payment-event listing.
    pub payment_events_limit: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let jwt_secret: SecretString = SecretString::new(get_env::<String>("JWT_SECRET").into());

        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");

        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap());
        let database_url: String = get_env("DATABASE_URL");

        let card_webhook_secret: SecretString =
            SecretString::new(get_env::<String>("CARD_WEBHOOK_SECRET").into());
        let pix_webhook_secret: SecretString =
            SecretString::new(get_env::<String>("PIX_WEBHOOK_SECRET").into());
        let card_api_base: String = get_env_default(
            "CARD_API_BASE",
            "https://api.cardgateway.example/v1".to_string(),
        );
        let card_api_key: SecretString =
            SecretString::new(get_env::<String>("CARD_API_KEY").into());

        let payment_events_limit: i64 = get_env_default("PAYMENT_EVENTS_LIMIT", 100);

        Self {
            jwt_secret,
            cors_origin,
            bind_addr,
            database_url,
            card_webhook_secret,
            pix_webhook_secret,
            card_api_base,
            card_api_key,
            payment_events_limit,
        }
    }
}
