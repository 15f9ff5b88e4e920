use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::auth::require_user_id;
use crate::domain::subscription::derive_subscription_state;
use crate::error::{AppError, AppResult};
use crate::repository::users::{self, User};
use crate::services::{paystack, subscription_sync};
use crate::state::AppState;
use crate::tenancy::invalidate_access;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/billing/status", axum::routing::get(get_billing_status))
        .route("/billing/sync", axum::routing::post(sync_subscription))
        .route("/billing/cancel", axum::routing::post(cancel_subscription))
}

fn billing_payload(user: &User) -> Value {
    let subscription = derive_subscription_state(
        user.paystack_subscription_code.as_deref(),
        user.subscription_status.as_deref(),
        user.trial_ends_at,
        Utc::now(),
    );
    json!({
        "state": subscription.as_str(),
        "days_left_in_trial": subscription.days_left_in_trial(),
        "has_access": subscription.grants_access(),
        "provider_status": user.subscription_status,
        "plan_code": user.plan_code,
        "plan_amount": user.plan_amount,
        "plan_currency": user.plan_currency,
        "plan_interval": user.plan_interval,
        "next_payment_date": user.next_payment_date,
        "last_payment_failure": user.last_payment_failure,
        "payment_retry_count": user.payment_retry_count,
        "trial_ends_at": user.trial_ends_at,
    })
}

async fn get_billing_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let user = users::find(pool, user_id).await?;
    Ok(Json(billing_payload(&user)))
}

/// Re-pull the subscription object from Paystack into the local replica.
/// The provider stays the source of truth; this is the manual refresh the
/// dashboard offers next to the automatic webhook updates.
async fn sync_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let user = users::find(pool, user_id).await?;
    let code = user
        .paystack_subscription_code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| {
            AppError::BadRequest("No provider subscription to sync.".to_string())
        })?;

    let subscription = paystack::fetch_subscription(&state.http_client, &state.config, code).await?;
    let refreshed = subscription_sync::apply_subscription_object(pool, user_id, &subscription).await?;
    invalidate_access(&state, user_id).await;

    Ok(Json(billing_payload(&refreshed)))
}

/// Disable the subscription at the provider; the replica flips to
/// non-renewing and the webhook carries the terminal status later.
async fn cancel_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let user = users::find(pool, user_id).await?;
    let code = user
        .paystack_subscription_code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| {
            AppError::BadRequest("No provider subscription to cancel.".to_string())
        })?;
    let token = user
        .paystack_email_token
        .as_deref()
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            AppError::Conflict(
                "Subscription is missing its provider token. Run a sync first.".to_string(),
            )
        })?;

    paystack::disable_subscription(&state.http_client, &state.config, code, token).await?;
    let updated = users::set_subscription_status(pool, user_id, "non-renewing", false).await?;
    invalidate_access(&state, user_id).await;

    Ok(Json(billing_payload(&updated)))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}
