use axum::Router;

use crate::adapters::http::app_state::AppState;

pub mod admin;
pub mod entitlement;
pub mod webhooks;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/webhooks", webhooks::router())
        .nest("/admin", admin::router())
        .merge(entitlement::router())
}
