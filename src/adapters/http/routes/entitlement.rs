//! Entitlement read path. Answered entirely from the stored record and the
//! clock; no provider call sits on this path.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    adapters::http::{
        app_state::AppState,
        middleware::{bearer_claims, require_tenant},
    },
    app_error::AppResult,
};

async fn get_entitlement(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let claims = bearer_claims(&headers, &app_state.config)?;
    require_tenant(&claims, tenant_id)?;

    let view = app_state
        .billing_use_cases
        .get_effective_status(tenant_id, Utc::now())
        .await?;
    Ok(Json(view))
}

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/tenants/{tenant_id}/entitlement", get(get_entitlement))
}
