use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub paystack_customer_code: Option<String>,
    pub paystack_subscription_code: Option<String>,
    #[serde(skip_serializing)]
    pub paystack_email_token: Option<String>,
    pub subscription_status: Option<String>,
    pub plan_code: Option<String>,
    pub plan_amount: Option<i64>,
    pub plan_currency: Option<String>,
    pub plan_interval: Option<String>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub subscription_created_at: Option<DateTime<Utc>>,
    pub subscription_updated_at: Option<DateTime<Utc>>,
    pub last_payment_failure: Option<String>,
    pub payment_retry_count: i32,
    pub trial_started_at: Option<DateTime<Utc>>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields replicated from a Paystack subscription object. `None` leaves the
/// stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionPatch {
    pub subscription_code: Option<String>,
    pub email_token: Option<String>,
    pub status: Option<String>,
    pub plan_code: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub interval: Option<String>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub customer_code: Option<String>,
}

pub async fn find(pool: &PgPool, user_id: Uuid) -> AppResult<User> {
    find_optional(pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))
}

pub async fn find_optional(pool: &PgPool, user_id: Uuid) -> AppResult<Option<User>> {
    let row = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn find_by_customer_code(pool: &PgPool, code: &str) -> AppResult<Option<User>> {
    let row = sqlx::query_as::<_, User>("SELECT * FROM users WHERE paystack_customer_code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> AppResult<Option<User>> {
    let row = sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(email) = lower($1)")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn find_by_subscription_code(pool: &PgPool, code: &str) -> AppResult<Option<User>> {
    let row =
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE paystack_subscription_code = $1")
            .bind(code)
            .fetch_optional(pool)
            .await?;
    Ok(row)
}

/// First sight of a landlord starts the trial window; later sights only
/// refresh profile fields.
pub async fn upsert_landlord(
    pool: &PgPool,
    user_id: Uuid,
    email: Option<&str>,
    full_name: Option<&str>,
    trial_ends_at: DateTime<Utc>,
) -> AppResult<User> {
    let row = sqlx::query_as::<_, User>(
        "INSERT INTO users (id, email, full_name, trial_started_at, trial_ends_at)
         VALUES ($1, $2, $3, now(), $4)
         ON CONFLICT (id) DO UPDATE
         SET email = COALESCE(EXCLUDED.email, users.email),
             full_name = COALESCE(EXCLUDED.full_name, users.full_name),
             updated_at = now()
         RETURNING *",
    )
    .bind(user_id)
    .bind(email)
    .bind(full_name)
    .bind(trial_ends_at)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn find_or_bootstrap(
    pool: &PgPool,
    user_id: Uuid,
    trial_ends_at: DateTime<Utc>,
) -> AppResult<User> {
    if let Some(user) = find_optional(pool, user_id).await? {
        return Ok(user);
    }
    upsert_landlord(pool, user_id, None, None, trial_ends_at).await
}

pub async fn apply_subscription_patch(
    pool: &PgPool,
    user_id: Uuid,
    patch: &SubscriptionPatch,
) -> AppResult<User> {
    let row = sqlx::query_as::<_, User>(
        "UPDATE users
         SET paystack_subscription_code = COALESCE($2, paystack_subscription_code),
             paystack_email_token = COALESCE($3, paystack_email_token),
             subscription_status = COALESCE($4, subscription_status),
             plan_code = COALESCE($5, plan_code),
             plan_amount = COALESCE($6, plan_amount),
             plan_currency = COALESCE($7, plan_currency),
             plan_interval = COALESCE($8, plan_interval),
             next_payment_date = COALESCE($9, next_payment_date),
             paystack_customer_code = COALESCE($10, paystack_customer_code),
             subscription_created_at = COALESCE(subscription_created_at, now()),
             subscription_updated_at = now(),
             updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(user_id)
    .bind(patch.subscription_code.as_deref())
    .bind(patch.email_token.as_deref())
    .bind(patch.status.as_deref())
    .bind(patch.plan_code.as_deref())
    .bind(patch.amount)
    .bind(patch.currency.as_deref())
    .bind(patch.interval.as_deref())
    .bind(patch.next_payment_date)
    .bind(patch.customer_code.as_deref())
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Overwrite just the provider status, optionally dropping the scheduled
/// charge date (cancellation/completion keeps the terminal status visible).
pub async fn set_subscription_status(
    pool: &PgPool,
    user_id: Uuid,
    status: &str,
    clear_next_payment: bool,
) -> AppResult<User> {
    let row = sqlx::query_as::<_, User>(
        "UPDATE users
         SET subscription_status = $2,
             next_payment_date = CASE WHEN $3 THEN NULL ELSE next_payment_date END,
             subscription_updated_at = now(),
             updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(user_id)
    .bind(status)
    .bind(clear_next_payment)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn record_payment_failure(
    pool: &PgPool,
    user_id: Uuid,
    message: &str,
) -> AppResult<User> {
    let row = sqlx::query_as::<_, User>(
        "UPDATE users
         SET payment_retry_count = payment_retry_count + 1,
             last_payment_failure = $2,
             subscription_status = 'attention',
             subscription_updated_at = now(),
             updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(user_id)
    .bind(message)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn reset_payment_failures(pool: &PgPool, user_id: Uuid) -> AppResult<User> {
    let row = sqlx::query_as::<_, User>(
        "UPDATE users
         SET payment_retry_count = 0,
             last_payment_failure = NULL,
             subscription_status = 'active',
             subscription_updated_at = now(),
             updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(row)
}
