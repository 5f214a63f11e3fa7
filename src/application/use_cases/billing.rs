use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{
        payment_event::{
            IdempotencyOutcome, NewPaymentEvent, PaymentEvent, PaymentEventStatus, PaymentProvider,
        },
        subscription::{EffectiveStatus, StoredStatus, SubscriptionRecord},
        transition::{AdminAction, Transition},
    },
};

/// Plan recorded on records created by the engine itself (webhook activation
/// of a tenant we have never seen, admin trial grants without a plan).
pub const DEFAULT_PLAN: &str = "standard";

/// Attempts for the read-transition-write cycle when a concurrent writer
/// wins the compare-and-swap.
const MAX_CAS_RETRIES: usize = 3;

// ============================================================================
// Repository Traits
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewSubscriptionRecord {
    pub tenant_id: Uuid,
    pub stored_status: StoredStatus,
    pub plan: String,
    pub trial_start: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub active_period_start: Option<DateTime<Utc>>,
    pub active_period_end: Option<DateTime<Utc>>,
    pub provider_customer_ref: Option<String>,
    pub provider_subscription_ref: Option<String>,
}

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn get_by_tenant(&self, tenant_id: Uuid) -> AppResult<Option<SubscriptionRecord>>;

    async fn get_by_subscription_ref(
        &self,
        provider_subscription_ref: &str,
    ) -> AppResult<Option<SubscriptionRecord>>;

    async fn get_by_customer_ref(
        &self,
        provider_customer_ref: &str,
    ) -> AppResult<Option<SubscriptionRecord>>;

    async fn create(&self, input: &NewSubscriptionRecord) -> AppResult<SubscriptionRecord>;

    /// Conditional update: applies only while the row's `updated_at` still
    /// matches `expected_updated_at` (compare-and-swap against concurrent
    /// writers). Zero rows touched must surface as [`AppError::Conflict`].
    async fn update(
        &self,
        record: &SubscriptionRecord,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> AppResult<SubscriptionRecord>;

    /// First-time linkage: persist provider references resolved via email so
    /// later events resolve by reference.
    async fn set_provider_refs(
        &self,
        tenant_id: Uuid,
        customer_ref: Option<&str>,
        subscription_ref: Option<&str>,
    ) -> AppResult<()>;

    async fn delete(&self, tenant_id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait PaymentEventRepo: Send + Sync {
    /// Atomic insert-or-detect-conflict on `external_event_id`. Must be a
    /// single statement backed by the uniqueness constraint, never a
    /// check-then-insert pair: webhook delivery is at-least-once and
    /// concurrent redelivery of the same event is an expected race.
    async fn record_if_new(&self, event: &NewPaymentEvent) -> AppResult<IdempotencyOutcome>;

    async fn list_by_tenant(&self, tenant_id: Uuid, limit: i64) -> AppResult<Vec<PaymentEvent>>;
}

#[async_trait]
pub trait UserAccountRepo: Send + Sync {
    /// Flip `active` on every account under the tenant. Implementations must
    /// be a no-op for accounts already in the target state so redelivery and
    /// crash-recovery replays cost nothing.
    async fn set_active_for_tenant(&self, tenant_id: Uuid, active: bool) -> AppResult<u64>;

    /// Distinct tenants owning an account with this email. Used for
    /// best-effort provider-event resolution; zero or multiple matches mean
    /// "unresolved", never a guess.
    async fn tenants_by_email(&self, email: &str) -> AppResult<Vec<Uuid>>;
}

// ============================================================================
// Outcome Types
// ============================================================================

#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    /// The record after the transition; `None` after `Delete`.
    pub record: Option<SubscriptionRecord>,
    pub effective_status: EffectiveStatus,
    /// Whether `has_access` flipped. Logged and returned to admins; the
    /// account propagation itself is unconditional but write-free when
    /// nothing changed.
    pub entitlement_changed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitlementView {
    pub tenant_id: Uuid,
    pub effective_status: EffectiveStatus,
    pub has_access: bool,
    pub plan: String,
    pub trial_end: Option<DateTime<Utc>>,
    pub active_period_end: Option<DateTime<Utc>>,
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct BillingUseCases {
    subscription_repo: Arc<dyn SubscriptionRepo>,
    payment_event_repo: Arc<dyn PaymentEventRepo>,
    user_account_repo: Arc<dyn UserAccountRepo>,
}

impl BillingUseCases {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepo>,
        payment_event_repo: Arc<dyn PaymentEventRepo>,
        user_account_repo: Arc<dyn UserAccountRepo>,
    ) -> Self {
        Self {
            subscription_repo,
            payment_event_repo,
            user_account_repo,
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Entitlement is always answered from the derived status, never from
    /// `stored_status`. A missing record reads as expired.
    pub async fn get_effective_status(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<EntitlementView> {
        let record = self
            .subscription_repo
            .get_by_tenant(tenant_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let effective_status = record.derive_status(now);
        Ok(EntitlementView {
            tenant_id,
            effective_status,
            has_access: effective_status.grants_access(),
            plan: record.plan,
            trial_end: record.trial_end,
            active_period_end: record.active_period_end,
        })
    }

    pub async fn get_record(&self, tenant_id: Uuid) -> AppResult<SubscriptionRecord> {
        self.subscription_repo
            .get_by_tenant(tenant_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn list_payment_events(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<PaymentEvent>> {
        self.payment_event_repo.list_by_tenant(tenant_id, limit).await
    }

    // ========================================================================
    // Transition Engine
    // ========================================================================

    /// The single code path that mutates a subscription record, regardless of
    /// trigger source (webhook or admin). Total over `(record, transition)`:
    /// billing reality is messy, so a cancelled tenant activating again is a
    /// normal case, not an error. Validation failures are reported to the
    /// caller and never applied.
    ///
    /// Safe to invoke twice with the same inputs: activation never regresses
    /// an existing paid period, suspension and cancellation are no-ops when
    /// already in place, and account propagation is write-free when access is
    /// unchanged.
    pub async fn apply_transition(
        &self,
        tenant_id: Uuid,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> AppResult<TransitionOutcome> {
        if matches!(transition, Transition::Delete) {
            let existing = self.subscription_repo.get_by_tenant(tenant_id).await?;
            let Some(record) = existing else {
                return Err(AppError::NotFound);
            };
            let access_before = record.has_access(now);
            self.subscription_repo.delete(tenant_id).await?;
            self.user_account_repo
                .set_active_for_tenant(tenant_id, false)
                .await?;
            tracing::info!(%tenant_id, "Subscription record deleted, accounts deactivated");
            return Ok(TransitionOutcome {
                record: None,
                effective_status: EffectiveStatus::Cancelled,
                entitlement_changed: access_before,
            });
        }

        // Losing the compare-and-swap means another transition landed
        // between our read and write. Reload and re-apply on the fresh
        // record; transitions are idempotent, so re-applying is safe.
        // Surfacing the conflict would strand webhook events: their ledger
        // row has already committed, so a redelivery dedupes to 200 and
        // never reaches the engine again.
        let mut attempts = 0;
        let (record, access_before) = loop {
            let existing = self.subscription_repo.get_by_tenant(tenant_id).await?;
            let access_before = existing
                .as_ref()
                .map(|r| r.has_access(now))
                .unwrap_or(false);

            let result = match existing {
                Some(record) => {
                    let expected = record.updated_at;
                    let (next, mutated) = transition_record(record, &transition, now)?;
                    if mutated {
                        self.subscription_repo.update(&next, expected).await
                    } else {
                        Ok(next)
                    }
                }
                None => {
                    let input = new_record_for(tenant_id, &transition, now)?;
                    self.subscription_repo.create(&input).await
                }
            };

            match result {
                Ok(record) => break (record, access_before),
                Err(AppError::Conflict) if attempts < MAX_CAS_RETRIES => {
                    attempts += 1;
                    tracing::warn!(
                        %tenant_id,
                        attempts,
                        transition = transition.kind(),
                        "Concurrent subscription write, reloading and re-applying"
                    );
                }
                Err(e) => return Err(e),
            }
        };

        let access_after = record.has_access(now);
        let entitlement_changed = access_before != access_after;

        // Propagate unconditionally; the repo's conditional write makes an
        // unchanged flag free and a crashed earlier propagation self-healing.
        let touched = self
            .user_account_repo
            .set_active_for_tenant(tenant_id, access_after)
            .await?;

        tracing::info!(
            %tenant_id,
            transition = transition.kind(),
            effective_status = record.derive_status(now).as_str(),
            entitlement_changed,
            accounts_touched = touched,
            "Applied subscription transition"
        );

        Ok(TransitionOutcome {
            effective_status: record.derive_status(now),
            record: Some(record),
            entitlement_changed,
        })
    }

    // ========================================================================
    // Manual Admin Channel
    // ========================================================================

    /// Admin actions run through the identical engine so validation and
    /// propagation cannot be bypassed by support tooling.
    pub async fn apply_admin_action(
        &self,
        tenant_id: Uuid,
        action: AdminAction,
        actor: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<TransitionOutcome> {
        let transition: Transition = action.into();
        tracing::info!(%tenant_id, %actor, action = transition.kind(), "Admin billing action");
        self.apply_transition(tenant_id, transition, now).await
    }

    /// Record an out-of-band payment (e.g. a wire transfer reconciled by
    /// support) through the same ledger the providers use, keeping the audit
    /// trail uniform.
    pub async fn record_manual_payment(
        &self,
        tenant_id: Uuid,
        amount_cents: i64,
        currency: &str,
        actor: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<PaymentEvent> {
        let event = NewPaymentEvent {
            external_event_id: format!("manual_{}", Uuid::new_v4()),
            provider: PaymentProvider::Manual,
            status: PaymentEventStatus::Approved,
            amount_cents,
            currency: currency.to_string(),
            tenant_id: Some(tenant_id),
            occurred_at: now,
            raw_payload: serde_json::json!({ "recorded_by": actor.to_string() }),
        };
        match self.payment_event_repo.record_if_new(&event).await? {
            IdempotencyOutcome::Inserted(event) => Ok(event),
            // A freshly generated id can never collide.
            IdempotencyOutcome::AlreadyProcessed => {
                Err(AppError::Internal("manual payment id collision".into()))
            }
        }
    }
}

// ============================================================================
// Pure Transition Logic
// ============================================================================

/// Apply a transition to an existing record. Returns the next record and
/// whether anything actually changed (unchanged records skip the write).
fn transition_record(
    mut record: SubscriptionRecord,
    transition: &Transition,
    now: DateTime<Utc>,
) -> AppResult<(SubscriptionRecord, bool)> {
    match transition {
        Transition::Activate {
            period_start,
            period_end,
        } => {
            let was_active = record.stored_status == StoredStatus::Active;

            let (start, end) = match (period_start, was_active) {
                // No explicit start on an already-active record: a duplicate
                // or stale provider event. Preserve the running period and
                // never regress its end.
                (None, true) => {
                    let start = record.active_period_start.unwrap_or(now);
                    let end = match record.active_period_end {
                        Some(current) => current.max(*period_end),
                        None => *period_end,
                    };
                    (start, end)
                }
                (Some(start), _) => (*start, *period_end),
                (None, false) => (now, *period_end),
            };

            if end <= start {
                return Err(AppError::InvalidInput(format!(
                    "period_end {} must be after period_start {}",
                    end, start
                )));
            }

            let changed = record.stored_status != StoredStatus::Active
                || record.active_period_start != Some(start)
                || record.active_period_end != Some(end);
            record.stored_status = StoredStatus::Active;
            record.active_period_start = Some(start);
            record.active_period_end = Some(end);
            Ok((record, changed))
        }

        Transition::Suspend => {
            if record.stored_status == StoredStatus::Suspended {
                return Ok((record, false));
            }
            record.stored_status = StoredStatus::Suspended;
            Ok((record, true))
        }

        Transition::Cancel => {
            if record.stored_status == StoredStatus::Cancelled {
                return Ok((record, false));
            }
            record.stored_status = StoredStatus::Cancelled;
            record.cancelled_at = Some(now);
            Ok((record, true))
        }

        Transition::GrantTrial { days } => {
            if *days <= 0 {
                return Err(AppError::InvalidInput(
                    "trial length must be at least one day".into(),
                ));
            }
            record.stored_status = StoredStatus::Trial;
            record.trial_start = Some(now);
            record.trial_end = Some(now + Duration::days(*days));
            Ok((record, true))
        }

        Transition::Reactivate { period_end } => {
            let start = record.active_period_start.unwrap_or(now);
            let end = period_end.or(record.active_period_end);
            if let Some(end) = end
                && end <= start
            {
                return Err(AppError::InvalidInput(format!(
                    "period_end {} must be after period_start {}",
                    end, start
                )));
            }
            record.stored_status = StoredStatus::Active;
            record.active_period_start = Some(start);
            if let Some(end) = end {
                record.active_period_end = Some(end);
            }
            Ok((record, true))
        }

        Transition::Delete => Err(AppError::Internal(
            "delete is handled before the pure transition step".into(),
        )),
    }
}

/// Build a fresh record for a tenant that has none yet. Only transitions
/// that establish entitlement may create one.
fn new_record_for(
    tenant_id: Uuid,
    transition: &Transition,
    now: DateTime<Utc>,
) -> AppResult<NewSubscriptionRecord> {
    match transition {
        Transition::Activate {
            period_start,
            period_end,
        } => {
            let start = period_start.unwrap_or(now);
            if *period_end <= start {
                return Err(AppError::InvalidInput(format!(
                    "period_end {} must be after period_start {}",
                    period_end, start
                )));
            }
            Ok(NewSubscriptionRecord {
                tenant_id,
                stored_status: StoredStatus::Active,
                plan: DEFAULT_PLAN.to_string(),
                trial_start: None,
                trial_end: None,
                active_period_start: Some(start),
                active_period_end: Some(*period_end),
                provider_customer_ref: None,
                provider_subscription_ref: None,
            })
        }
        Transition::GrantTrial { days } => {
            if *days <= 0 {
                return Err(AppError::InvalidInput(
                    "trial length must be at least one day".into(),
                ));
            }
            Ok(NewSubscriptionRecord {
                tenant_id,
                stored_status: StoredStatus::Trial,
                plan: DEFAULT_PLAN.to_string(),
                trial_start: Some(now),
                trial_end: Some(now + Duration::days(*days)),
                active_period_start: None,
                active_period_end: None,
                provider_customer_ref: None,
                provider_subscription_ref: None,
            })
        }
        _ => Err(AppError::NotFound),
    }
}
