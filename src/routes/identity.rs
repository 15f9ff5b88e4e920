use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::auth::require_auth;
use crate::domain::subscription::derive_subscription_state;
use crate::error::{AppError, AppResult};
use crate::repository::users;
use crate::state::AppState;

/// Upserts the landlord row on first sight, which also starts the trial
/// window, and returns the profile with the derived subscription state.
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let auth = require_auth(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let trial_ends = Utc::now() + Duration::days(state.config.trial_days);
    let user = users::upsert_landlord(
        pool,
        auth.id,
        auth.email.as_deref(),
        None,
        trial_ends,
    )
    .await?;

    let subscription = derive_subscription_state(
        user.paystack_subscription_code.as_deref(),
        user.subscription_status.as_deref(),
        user.trial_ends_at,
        Utc::now(),
    );

    Ok(Json(json!({
        "user": user,
        "subscription": {
            "state": subscription.as_str(),
            "days_left_in_trial": subscription.days_left_in_trial(),
            "has_access": subscription.grants_access(),
        }
    })))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}
