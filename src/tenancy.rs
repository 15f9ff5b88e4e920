use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::domain::subscription::derive_subscription_state;
use crate::error::{AppError, AppResult};
use crate::repository::users;
use crate::state::AppState;

/// Every row carries its owning landlord; cross-account access is a 403.
pub fn assert_owner(record_landlord_id: Uuid, user_id: Uuid) -> AppResult<()> {
    if record_landlord_id == user_id {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "Forbidden: this record belongs to another account.".to_string(),
    ))
}

/// Gate for mutating routes. Reads stay open so the dashboard can render the
/// paywall state instead of erroring.
pub async fn require_feature_access(state: &AppState, user_id: Uuid) -> AppResult<()> {
    if subscription_access(state, user_id).await? {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "Your trial or subscription does not grant access. Update billing to continue."
            .to_string(),
    ))
}

/// Derive the gating decision from the subscription replica, cached briefly.
/// The cache is invalidated whenever the replica changes, so a failed fetch
/// here is an error, never a silent grant.
pub async fn subscription_access(state: &AppState, user_id: Uuid) -> AppResult<bool> {
    if let Some(allowed) = state.access_cache.get(&user_id).await {
        return Ok(allowed);
    }

    let pool = state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })?;
    let trial_ends = Utc::now() + Duration::days(state.config.trial_days);
    let user = users::find_or_bootstrap(pool, user_id, trial_ends).await?;

    let status = derive_subscription_state(
        user.paystack_subscription_code.as_deref(),
        user.subscription_status.as_deref(),
        user.trial_ends_at,
        Utc::now(),
    );
    let allowed = status.grants_access();
    state.access_cache.insert(user_id, allowed).await;
    Ok(allowed)
}

pub async fn invalidate_access(state: &AppState, user_id: Uuid) {
    state.access_cache.invalidate(&user_id).await;
}
