use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::billing::{NewSubscriptionRecord, SubscriptionRepo},
    domain::entities::subscription::SubscriptionRecord,
};

fn row_to_record(row: &sqlx::postgres::PgRow) -> SubscriptionRecord {
    SubscriptionRecord {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        stored_status: row.get("stored_status"),
        plan: row.get("plan"),
        trial_start: row.get("trial_start"),
        trial_end: row.get("trial_end"),
        active_period_start: row.get("active_period_start"),
        active_period_end: row.get("active_period_end"),
        provider_customer_ref: row.get("provider_customer_ref"),
        provider_subscription_ref: row.get("provider_subscription_ref"),
        cancelled_at: row.get("cancelled_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, tenant_id, stored_status, plan, trial_start, trial_end,
    active_period_start, active_period_end, provider_customer_ref,
    provider_subscription_ref, cancelled_at, created_at, updated_at
"#;

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn get_by_tenant(&self, tenant_id: Uuid) -> AppResult<Option<SubscriptionRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscription_records WHERE tenant_id = $1",
            SELECT_COLS
        ))
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn get_by_subscription_ref(
        &self,
        provider_subscription_ref: &str,
    ) -> AppResult<Option<SubscriptionRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscription_records WHERE provider_subscription_ref = $1",
            SELECT_COLS
        ))
        .bind(provider_subscription_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn get_by_customer_ref(
        &self,
        provider_customer_ref: &str,
    ) -> AppResult<Option<SubscriptionRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscription_records WHERE provider_customer_ref = $1",
            SELECT_COLS
        ))
        .bind(provider_customer_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn create(&self, input: &NewSubscriptionRecord) -> AppResult<SubscriptionRecord> {
        let id = Uuid::new_v4();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscription_records
                (id, tenant_id, stored_status, plan, trial_start, trial_end,
                 active_period_start, active_period_end, provider_customer_ref,
                 provider_subscription_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(input.tenant_id)
        .bind(input.stored_status)
        .bind(&input.plan)
        .bind(input.trial_start)
        .bind(input.trial_end)
        .bind(input.active_period_start)
        .bind(input.active_period_end)
        .bind(&input.provider_customer_ref)
        .bind(&input.provider_subscription_ref)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_record(&row))
    }

    async fn update(
        &self,
        record: &SubscriptionRecord,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> AppResult<SubscriptionRecord> {
        // The updated_at guard loses against any write that landed since the
        // caller read the row; zero rows means the caller must reload.
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscription_records SET
                stored_status = $2,
                plan = $3,
                trial_start = $4,
                trial_end = $5,
                active_period_start = $6,
                active_period_end = $7,
                cancelled_at = $8,
                updated_at = CURRENT_TIMESTAMP
            WHERE tenant_id = $1 AND updated_at IS NOT DISTINCT FROM $9
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(record.tenant_id)
        .bind(record.stored_status)
        .bind(&record.plan)
        .bind(record.trial_start)
        .bind(record.trial_end)
        .bind(record.active_period_start)
        .bind(record.active_period_end)
        .bind(record.cancelled_at)
        .bind(expected_updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        match row {
            Some(row) => Ok(row_to_record(&row)),
            None => Err(AppError::Conflict),
        }
    }

    async fn set_provider_refs(
        &self,
        tenant_id: Uuid,
        customer_ref: Option<&str>,
        subscription_ref: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE subscription_records SET
                provider_customer_ref = COALESCE($2, provider_customer_ref),
                provider_subscription_ref = COALESCE($3, provider_subscription_ref),
                updated_at = CURRENT_TIMESTAMP
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(customer_ref)
        .bind(subscription_ref)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn delete(&self, tenant_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM subscription_records WHERE tenant_id = $1")
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}
