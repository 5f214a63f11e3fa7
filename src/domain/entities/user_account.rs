use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// User account row, owned by the identity subsystem. Billing is only
/// permitted to flip the `active` flag, via the side-effect propagator.
#[derive(Debug, Clone, Serialize)]
pub struct UserAccount {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
