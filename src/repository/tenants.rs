use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub landlord_id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTenant {
    pub landlord_id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TenantPatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

pub async fn insert(pool: &PgPool, new: &NewTenant) -> AppResult<Tenant> {
    let row = sqlx::query_as::<_, Tenant>(
        "INSERT INTO tenants (id, landlord_id, full_name, email, phone, notes)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(new.landlord_id)
    .bind(&new.full_name)
    .bind(new.email.as_deref())
    .bind(new.phone.as_deref())
    .bind(new.notes.as_deref())
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn find(pool: &PgPool, tenant_id: Uuid) -> AppResult<Tenant> {
    sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Tenant not found.".to_string()))
}

pub async fn list(pool: &PgPool, landlord_id: Uuid, limit: i64) -> AppResult<Vec<Tenant>> {
    let rows = sqlx::query_as::<_, Tenant>(
        "SELECT * FROM tenants
         WHERE landlord_id = $1
         ORDER BY full_name ASC
         LIMIT $2",
    )
    .bind(landlord_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn update(pool: &PgPool, tenant_id: Uuid, patch: &TenantPatch) -> AppResult<Tenant> {
    let row = sqlx::query_as::<_, Tenant>(
        "UPDATE tenants
         SET full_name = COALESCE($2, full_name),
             email = COALESCE($3, email),
             phone = COALESCE($4, phone),
             notes = COALESCE($5, notes),
             updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(tenant_id)
    .bind(patch.full_name.as_deref())
    .bind(patch.email.as_deref())
    .bind(patch.phone.as_deref())
    .bind(patch.notes.as_deref())
    .fetch_optional(pool)
    .await?;
    row.ok_or_else(|| AppError::NotFound("Tenant not found.".to_string()))
}
