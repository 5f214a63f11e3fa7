//! Manual subscription management for support staff. Every action funnels
//! into the same transition engine the webhooks use.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::{
        app_state::AppState,
        middleware::{bearer_claims, require_admin},
    },
    app_error::{AppError, AppResult},
    domain::entities::{
        subscription::{EffectiveStatus, SubscriptionRecord},
        transition::AdminAction,
    },
};

#[derive(Serialize)]
struct SubscriptionResponse {
    record: SubscriptionRecord,
    effective_status: EffectiveStatus,
    has_access: bool,
}

#[derive(Serialize)]
struct TransitionResponse {
    record: Option<SubscriptionRecord>,
    effective_status: EffectiveStatus,
    has_access: bool,
    entitlement_changed: bool,
}

#[derive(Deserialize)]
struct ManualPaymentPayload {
    amount_cents: i64,
    currency: String,
}

fn actor_id(sub: &str) -> AppResult<Uuid> {
    Uuid::parse_str(sub).map_err(|_| AppError::InvalidCredentials)
}

async fn get_subscription(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let claims = bearer_claims(&headers, &app_state.config)?;
    require_admin(&claims, tenant_id)?;

    let record = app_state.billing_use_cases.get_record(tenant_id).await?;
    let now: DateTime<Utc> = Utc::now();
    let effective_status = record.derive_status(now);
    Ok(Json(SubscriptionResponse {
        has_access: effective_status.grants_access(),
        effective_status,
        record,
    }))
}

async fn apply_action(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    headers: HeaderMap,
    Json(action): Json<AdminAction>,
) -> AppResult<impl IntoResponse> {
    let claims = bearer_claims(&headers, &app_state.config)?;
    require_admin(&claims, tenant_id)?;
    let actor = actor_id(&claims.sub)?;

    let outcome = app_state
        .billing_use_cases
        .apply_admin_action(tenant_id, action, actor, Utc::now())
        .await?;

    Ok(Json(TransitionResponse {
        record: outcome.record,
        effective_status: outcome.effective_status,
        has_access: outcome.effective_status.grants_access(),
        entitlement_changed: outcome.entitlement_changed,
    }))
}

async fn list_payment_events(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let claims = bearer_claims(&headers, &app_state.config)?;
    require_admin(&claims, tenant_id)?;

    let events = app_state
        .billing_use_cases
        .list_payment_events(tenant_id, app_state.config.payment_events_limit)
        .await?;
    Ok(Json(events))
}

async fn record_manual_payment(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<ManualPaymentPayload>,
) -> AppResult<impl IntoResponse> {
    let claims = bearer_claims(&headers, &app_state.config)?;
    require_admin(&claims, tenant_id)?;
    let actor = actor_id(&claims.sub)?;

    if payload.amount_cents <= 0 {
        return Err(AppError::InvalidInput("amount must be positive".into()));
    }

    let event = app_state
        .billing_use_cases
        .record_manual_payment(tenant_id, payload.amount_cents, &payload.currency, actor, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/tenants/{tenant_id}/subscription",
            get(get_subscription).post(apply_action),
        )
        .route(
            "/tenants/{tenant_id}/payment-events",
            get(list_payment_events).post(record_manual_payment),
        )
}
