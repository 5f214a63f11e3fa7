use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::billing::PaymentEventRepo,
    domain::entities::payment_event::{IdempotencyOutcome, NewPaymentEvent, PaymentEvent},
};

fn row_to_event(row: &sqlx::postgres::PgRow) -> PaymentEvent {
    PaymentEvent {
        id: row.get("id"),
        external_event_id: row.get("external_event_id"),
        provider: row.get("provider"),
        status: row.get("status"),
        amount_cents: row.get("amount_cents"),
        currency: row.get("currency"),
        tenant_id: row.get("tenant_id"),
        occurred_at: row.get("occurred_at"),
        raw_payload: row.get("raw_payload"),
        created_at: row.get("created_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, external_event_id, provider, status, amount_cents, currency,
    tenant_id, occurred_at, raw_payload, created_at
"#;

#[async_trait]
impl PaymentEventRepo for PostgresPersistence {
    async fn record_if_new(&self, event: &NewPaymentEvent) -> AppResult<IdempotencyOutcome> {
        let id = Uuid::new_v4();
        // Single statement riding the unique index on external_event_id.
        // Concurrent redeliveries race here and exactly one insert wins.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payment_events
                (id, external_event_id, provider, status, amount_cents,
                 currency, tenant_id, occurred_at, raw_payload)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (external_event_id) DO NOTHING
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(&event.external_event_id)
        .bind(event.provider)
        .bind(event.status)
        .bind(event.amount_cents)
        .bind(&event.currency)
        .bind(event.tenant_id)
        .bind(event.occurred_at)
        .bind(&event.raw_payload)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(match row {
            Some(row) => IdempotencyOutcome::Inserted(row_to_event(&row)),
            None => IdempotencyOutcome::AlreadyProcessed,
        })
    }

    async fn list_by_tenant(&self, tenant_id: Uuid, limit: i64) -> AppResult<Vec<PaymentEvent>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payment_events WHERE tenant_id = $1 ORDER BY occurred_at DESC LIMIT $2",
            SELECT_COLS
        ))
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_event).collect())
    }
}
