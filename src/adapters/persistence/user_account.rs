use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::billing::UserAccountRepo,
};

#[async_trait]
impl UserAccountRepo for PostgresPersistence {
    async fn set_active_for_tenant(&self, tenant_id: Uuid, active: bool) -> AppResult<u64> {
        // The `active <> $2` predicate keeps replays write-free and avoids
        // churning updated_at on rows that already match.
        let result = sqlx::query(
            r#"
            UPDATE user_accounts SET
                active = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE tenant_id = $1 AND active <> $2
            "#,
        )
        .bind(tenant_id)
        .bind(active)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected())
    }

    async fn tenants_by_email(&self, email: &str) -> AppResult<Vec<Uuid>> {
        let tenants: Vec<Uuid> = sqlx::query_scalar(
            "SELECT DISTINCT tenant_id FROM user_accounts WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(tenants)
    }
}
