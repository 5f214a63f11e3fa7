//! Payment provider webhook endpoints.
//!
//! Response contract, which both providers honor on their side:
//! 400 for signature or parse failures (a misconfiguration, redelivery will
//! not help), 500 for transient failures so the provider retries, and 200
//! for everything else including duplicates and unresolvable events.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;
use secrecy::ExposeSecret;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    infra::signature::{verify_card_signature, verify_pix_signature},
    use_cases::webhook::{IngestOutcome, NormalizedEvent, normalize_card_event, normalize_pix_event},
};

async fn handle_card_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<impl IntoResponse> {
    let signature = headers
        .get("x-card-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;
    verify_card_signature(
        &body,
        signature,
        app_state.config.card_webhook_secret.expose_secret(),
    )?;

    let payload: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| AppError::InvalidInput(format!("Invalid webhook payload: {}", e)))?;

    let Some(event) = normalize_card_event(&payload)? else {
        // Event type we do not act on; acknowledge so it is not redelivered.
        return Ok(StatusCode::OK);
    };

    Ok(dispatch(&app_state, event).await)
}

async fn handle_pix_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<impl IntoResponse> {
    let signature = headers
        .get("x-pix-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;
    verify_pix_signature(
        &body,
        signature,
        app_state.config.pix_webhook_secret.expose_secret(),
    )?;

    let payload: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| AppError::InvalidInput(format!("Invalid webhook payload: {}", e)))?;

    let Some(event) = normalize_pix_event(&payload)? else {
        return Ok(StatusCode::OK);
    };

    Ok(dispatch(&app_state, event).await)
}

/// Run the pipeline and translate its result into the provider-facing
/// status. Errors after this point never bubble into a generic error
/// response; the retry decision is the whole point.
async fn dispatch(app_state: &AppState, event: NormalizedEvent) -> StatusCode {
    let event_id = event.external_event_id.clone();
    let kind = event.kind;

    match app_state.webhook_use_cases.ingest(event, Utc::now()).await {
        Ok(IngestOutcome::Processed { entitlement_changed }) => {
            tracing::info!(
                external_event_id = %event_id,
                kind = kind.as_str(),
                entitlement_changed,
                "Webhook event processed"
            );
            StatusCode::OK
        }
        Ok(IngestOutcome::Duplicate) | Ok(IngestOutcome::RecordedOnly) => StatusCode::OK,
        Err(e) if e.is_retryable() => {
            tracing::error!(
                error = %e,
                external_event_id = %event_id,
                kind = kind.as_str(),
                retryable = true,
                "Webhook processing failed, returning 500 for provider retry"
            );
            StatusCode::INTERNAL_SERVER_ERROR
        }
        Err(e) => {
            // Redelivery cannot fix this; the ledger row and this log line
            // are the operator's queue.
            tracing::error!(
                error = %e,
                external_event_id = %event_id,
                kind = kind.as_str(),
                retryable = false,
                "Webhook processing failed, acknowledging to stop redelivery"
            );
            StatusCode::OK
        }
    }
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/card", post(handle_card_webhook))
        .route("/pix", post(handle_pix_webhook))
}
