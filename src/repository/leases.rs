use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::lease::{LeaseStatus, LeaseType};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Lease {
    pub id: Uuid,
    pub landlord_id: Uuid,
    pub unit_id: Uuid,
    pub rent_amount: i64,
    pub deposit_amount: i64,
    pub currency: String,
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
    pub lease_type: LeaseType,
    pub status: LeaseStatus,
    pub billing_day: i16,
    pub automatic_invoice: bool,
    pub terminated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLease {
    pub landlord_id: Uuid,
    pub unit_id: Uuid,
    pub rent_amount: i64,
    pub deposit_amount: i64,
    pub currency: String,
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
    pub lease_type: LeaseType,
    pub status: LeaseStatus,
    pub billing_day: i16,
    pub automatic_invoice: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LeasePatch {
    pub rent_amount: Option<i64>,
    pub deposit_amount: Option<i64>,
    pub ends_on: Option<NaiveDate>,
    pub billing_day: Option<i16>,
    pub automatic_invoice: Option<bool>,
}

pub async fn insert(conn: &mut PgConnection, new: &NewLease) -> AppResult<Lease> {
    let row = sqlx::query_as::<_, Lease>(
        "INSERT INTO leases (id, landlord_id, unit_id, rent_amount, deposit_amount, currency,
                             starts_on, ends_on, lease_type, status, billing_day, automatic_invoice)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(new.landlord_id)
    .bind(new.unit_id)
    .bind(new.rent_amount)
    .bind(new.deposit_amount)
    .bind(&new.currency)
    .bind(new.starts_on)
    .bind(new.ends_on)
    .bind(new.lease_type)
    .bind(new.status)
    .bind(new.billing_day)
    .bind(new.automatic_invoice)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

pub async fn add_tenants(
    conn: &mut PgConnection,
    lease_id: Uuid,
    tenant_ids: &[Uuid],
) -> AppResult<()> {
    for tenant_id in tenant_ids {
        sqlx::query(
            "INSERT INTO lease_tenants (lease_id, tenant_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(lease_id)
        .bind(tenant_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn tenant_ids_for(pool: &PgPool, lease_id: Uuid) -> AppResult<Vec<Uuid>> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        "SELECT tenant_id FROM lease_tenants WHERE lease_id = $1",
    )
    .bind(lease_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

pub async fn find(pool: &PgPool, lease_id: Uuid) -> AppResult<Lease> {
    sqlx::query_as::<_, Lease>("SELECT * FROM leases WHERE id = $1")
        .bind(lease_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Lease not found.".to_string()))
}

pub async fn list(
    pool: &PgPool,
    landlord_id: Uuid,
    status: Option<LeaseStatus>,
    unit_id: Option<Uuid>,
    limit: i64,
) -> AppResult<Vec<Lease>> {
    let rows = sqlx::query_as::<_, Lease>(
        "SELECT * FROM leases
         WHERE landlord_id = $1
           AND ($2::lease_status IS NULL OR status = $2)
           AND ($3::uuid IS NULL OR unit_id = $3)
         ORDER BY created_at DESC
         LIMIT $4",
    )
    .bind(landlord_id)
    .bind(status)
    .bind(unit_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn update(pool: &PgPool, lease_id: Uuid, patch: &LeasePatch) -> AppResult<Lease> {
    let row = sqlx::query_as::<_, Lease>(
        "UPDATE leases
         SET rent_amount = COALESCE($2, rent_amount),
             deposit_amount = COALESCE($3, deposit_amount),
             ends_on = COALESCE($4, ends_on),
             billing_day = COALESCE($5, billing_day),
             automatic_invoice = COALESCE($6, automatic_invoice),
             updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(lease_id)
    .bind(patch.rent_amount)
    .bind(patch.deposit_amount)
    .bind(patch.ends_on)
    .bind(patch.billing_day)
    .bind(patch.automatic_invoice)
    .fetch_optional(pool)
    .await?;
    row.ok_or_else(|| AppError::NotFound("Lease not found.".to_string()))
}

pub async fn terminate(
    conn: &mut PgConnection,
    lease_id: Uuid,
    at: DateTime<Utc>,
) -> AppResult<Lease> {
    let row = sqlx::query_as::<_, Lease>(
        "UPDATE leases
         SET status = 'terminated', terminated_at = $2, updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(lease_id)
    .bind(at)
    .fetch_optional(conn)
    .await?;
    row.ok_or_else(|| AppError::NotFound("Lease not found.".to_string()))
}

pub async fn set_status(pool: &PgPool, lease_id: Uuid, status: LeaseStatus) -> AppResult<()> {
    sqlx::query("UPDATE leases SET status = $2, updated_at = now() WHERE id = $1")
        .bind(lease_id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}

/// Candidates for the monthly generator. The stored status is only a cache,
/// so pending leases whose start date has passed are included and resolved
/// by the caller.
pub async fn list_auto_invoice_candidates(pool: &PgPool) -> AppResult<Vec<Lease>> {
    let rows = sqlx::query_as::<_, Lease>(
        "SELECT * FROM leases
         WHERE automatic_invoice = true
           AND status IN ('pending', 'active')
         ORDER BY created_at ASC
         LIMIT 5000",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn list_unresolved(pool: &PgPool) -> AppResult<Vec<Lease>> {
    let rows = sqlx::query_as::<_, Lease>(
        "SELECT * FROM leases
         WHERE status IN ('pending', 'active')
         ORDER BY created_at ASC
         LIMIT 10000",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn list_fixed_term_ending_on(pool: &PgPool, date: NaiveDate) -> AppResult<Vec<Lease>> {
    let rows = sqlx::query_as::<_, Lease>(
        "SELECT * FROM leases
         WHERE lease_type = 'fixed_term'
           AND status = 'active'
           AND ends_on = $1
         ORDER BY created_at ASC
         LIMIT 5000",
    )
    .bind(date)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
