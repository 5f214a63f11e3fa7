use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};

/// Claims for the admin/read surface. `tenant_id` scopes the token to one
/// tenant; the platform role carries no tenant and may act on any of them.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiClaims {
    pub sub: String,
    pub role: String,
    pub tenant_id: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl ApiClaims {
    pub fn is_admin(&self) -> bool {
        self.role == "admin" || self.role == "platform"
    }

    /// Whether this token may act on the given tenant.
    pub fn scopes_tenant(&self, tenant_id: Uuid) -> bool {
        match &self.tenant_id {
            Some(claim) => claim == &tenant_id.to_string(),
            // Platform tokens are unscoped.
            None => self.role == "platform",
        }
    }
}

/// Token issuance belongs to the identity service; this encoder exists so
/// tests can mint tokens with the same claims shape.
#[cfg(test)]
pub fn issue(
    subject: Uuid,
    role: &str,
    tenant_id: Option<Uuid>,
    secret: &secrecy::SecretString,
    ttl: time::Duration,
) -> AppResult<String> {
    use jsonwebtoken::{EncodingKey, Header, encode};

    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    let claims = ApiClaims {
        sub: subject.to_string(),
        role: role.to_string(),
        tenant_id: tenant_id.map(|id| id.to_string()),
        iat: now,
        exp: now + ttl.whole_seconds(),
    };
    let header = Header::new(Algorithm::HS256);
    encode(
        &header,
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub fn verify(token: &str, secret: &secrecy::SecretString) -> AppResult<ApiClaims> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<ApiClaims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use time::Duration;

    fn secret() -> SecretString {
        SecretString::new("test_jwt_secret".into())
    }

    #[test]
    fn issue_and_verify_round_trip() {
        let tenant = Uuid::new_v4();
        let token = issue(
            Uuid::new_v4(),
            "admin",
            Some(tenant),
            &secret(),
            Duration::hours(1),
        )
        .unwrap();
        let claims = verify(&token, &secret()).unwrap();
        assert!(claims.is_admin());
        assert!(claims.scopes_tenant(tenant));
        assert!(!claims.scopes_tenant(Uuid::new_v4()));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue(Uuid::new_v4(), "admin", None, &secret(), Duration::hours(1)).unwrap();
        let other = SecretString::new("other_secret".into());
        assert!(matches!(
            verify(&token, &other),
            Err(AppError::InvalidCredentials)
        ));
    }

    #[test]
    fn platform_role_is_unscoped() {
        let token = issue(Uuid::new_v4(), "platform", None, &secret(), Duration::hours(1)).unwrap();
        let claims = verify(&token, &secret()).unwrap();
        assert!(claims.scopes_tenant(Uuid::new_v4()));
    }

    #[test]
    fn member_role_is_not_admin() {
        let tenant = Uuid::new_v4();
        let token = issue(
            Uuid::new_v4(),
            "member",
            Some(tenant),
            &secret(),
            Duration::hours(1),
        )
        .unwrap();
        let claims = verify(&token, &secret()).unwrap();
        assert!(!claims.is_admin());
        assert!(claims.scopes_tenant(tenant));
    }
}
