use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Property {
    pub id: Uuid,
    pub landlord_id: Uuid,
    pub name: String,
    pub address_line1: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country_code: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProperty {
    pub landlord_id: Uuid,
    pub name: String,
    pub address_line1: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country_code: String,
}

#[derive(Debug, Clone, Default)]
pub struct PropertyPatch {
    pub name: Option<String>,
    pub address_line1: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country_code: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn insert(pool: &PgPool, new: &NewProperty) -> AppResult<Property> {
    let row = sqlx::query_as::<_, Property>(
        "INSERT INTO properties (id, landlord_id, name, address_line1, city, state, country_code)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(new.landlord_id)
    .bind(&new.name)
    .bind(new.address_line1.as_deref())
    .bind(new.city.as_deref())
    .bind(new.state.as_deref())
    .bind(&new.country_code)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn find(pool: &PgPool, property_id: Uuid) -> AppResult<Property> {
    sqlx::query_as::<_, Property>("SELECT * FROM properties WHERE id = $1")
        .bind(property_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Property not found.".to_string()))
}

pub async fn list(
    pool: &PgPool,
    landlord_id: Uuid,
    is_active: Option<bool>,
    limit: i64,
) -> AppResult<Vec<Property>> {
    let rows = sqlx::query_as::<_, Property>(
        "SELECT * FROM properties
         WHERE landlord_id = $1
           AND ($2::boolean IS NULL OR is_active = $2)
         ORDER BY created_at DESC
         LIMIT $3",
    )
    .bind(landlord_id)
    .bind(is_active)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn update(pool: &PgPool, property_id: Uuid, patch: &PropertyPatch) -> AppResult<Property> {
    let row = sqlx::query_as::<_, Property>(
        "UPDATE properties
         SET name = COALESCE($2, name),
             address_line1 = COALESCE($3, address_line1),
             city = COALESCE($4, city),
             state = COALESCE($5, state),
             country_code = COALESCE($6, country_code),
             is_active = COALESCE($7, is_active),
             updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(property_id)
    .bind(patch.name.as_deref())
    .bind(patch.address_line1.as_deref())
    .bind(patch.city.as_deref())
    .bind(patch.state.as_deref())
    .bind(patch.country_code.as_deref())
    .bind(patch.is_active)
    .fetch_optional(pool)
    .await?;
    row.ok_or_else(|| AppError::NotFound("Property not found.".to_string()))
}
