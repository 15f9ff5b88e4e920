use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Unit {
    pub id: Uuid,
    pub landlord_id: Uuid,
    pub property_id: Uuid,
    pub code: String,
    pub name: String,
    pub bedrooms: i16,
    pub bathrooms: i16,
    pub market_rent: Option<i64>,
    pub currency: String,
    pub current_lease_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUnit {
    pub landlord_id: Uuid,
    pub property_id: Uuid,
    pub code: String,
    pub name: String,
    pub bedrooms: i16,
    pub bathrooms: i16,
    pub market_rent: Option<i64>,
    pub currency: String,
}

#[derive(Debug, Clone, Default)]
pub struct UnitPatch {
    pub name: Option<String>,
    pub bedrooms: Option<i16>,
    pub bathrooms: Option<i16>,
    pub market_rent: Option<i64>,
    pub is_active: Option<bool>,
}

pub async fn insert(pool: &PgPool, new: &NewUnit) -> AppResult<Unit> {
    let row = sqlx::query_as::<_, Unit>(
        "INSERT INTO units (id, landlord_id, property_id, code, name, bedrooms, bathrooms, market_rent, currency)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(new.landlord_id)
    .bind(new.property_id)
    .bind(&new.code)
    .bind(&new.name)
    .bind(new.bedrooms)
    .bind(new.bathrooms)
    .bind(new.market_rent)
    .bind(&new.currency)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn find(pool: &PgPool, unit_id: Uuid) -> AppResult<Unit> {
    sqlx::query_as::<_, Unit>("SELECT * FROM units WHERE id = $1")
        .bind(unit_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Unit not found.".to_string()))
}

pub async fn list(
    pool: &PgPool,
    landlord_id: Uuid,
    property_id: Option<Uuid>,
    limit: i64,
) -> AppResult<Vec<Unit>> {
    let rows = sqlx::query_as::<_, Unit>(
        "SELECT * FROM units
         WHERE landlord_id = $1
           AND ($2::uuid IS NULL OR property_id = $2)
         ORDER BY created_at DESC
         LIMIT $3",
    )
    .bind(landlord_id)
    .bind(property_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn update(pool: &PgPool, unit_id: Uuid, patch: &UnitPatch) -> AppResult<Unit> {
    let row = sqlx::query_as::<_, Unit>(
        "UPDATE units
         SET name = COALESCE($2, name),
             bedrooms = COALESCE($3, bedrooms),
             bathrooms = COALESCE($4, bathrooms),
             market_rent = COALESCE($5, market_rent),
             is_active = COALESCE($6, is_active),
             updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(unit_id)
    .bind(patch.name.as_deref())
    .bind(patch.bedrooms)
    .bind(patch.bathrooms)
    .bind(patch.market_rent)
    .bind(patch.is_active)
    .fetch_optional(pool)
    .await?;
    row.ok_or_else(|| AppError::NotFound("Unit not found.".to_string()))
}

/// Occupancy pointer. Maintained in the same transaction as lease
/// creation/termination so `current_lease_id` is never stale mid-flight.
pub async fn set_current_lease(
    conn: &mut PgConnection,
    unit_id: Uuid,
    lease_id: Option<Uuid>,
) -> AppResult<()> {
    sqlx::query("UPDATE units SET current_lease_id = $2, updated_at = now() WHERE id = $1")
        .bind(unit_id)
        .bind(lease_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn clear_current_lease(conn: &mut PgConnection, lease_id: Uuid) -> AppResult<()> {
    sqlx::query(
        "UPDATE units SET current_lease_id = NULL, updated_at = now() WHERE current_lease_id = $1",
    )
    .bind(lease_id)
    .execute(conn)
    .await?;
    Ok(())
}
