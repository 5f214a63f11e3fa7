use axum::http::HeaderMap;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::jwt::{self, ApiClaims},
    infra::config::AppConfig,
};

/// Extract and verify the bearer token from the Authorization header.
pub fn bearer_claims(headers: &HeaderMap, config: &AppConfig) -> AppResult<ApiClaims> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::InvalidCredentials)?;
    jwt::verify(token, &config.jwt_secret)
}

/// Admin role scoped to the tenant in the path (platform tokens pass for
/// any tenant).
pub fn require_admin(claims: &ApiClaims, tenant_id: Uuid) -> AppResult<()> {
    if !claims.is_admin() || !claims.scopes_tenant(tenant_id) {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Any authenticated caller scoped to the tenant in the path.
pub fn require_tenant(claims: &ApiClaims, tenant_id: Uuid) -> AppResult<()> {
    if !claims.scopes_tenant(tenant_id) {
        return Err(AppError::Forbidden);
    }
    Ok(())
}
