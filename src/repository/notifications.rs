use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct NotificationEvent {
    pub id: Uuid,
    pub landlord_id: Uuid,
    pub kind: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

pub async fn insert(
    pool: &PgPool,
    landlord_id: Uuid,
    kind: &str,
    payload: serde_json::Value,
) -> AppResult<NotificationEvent> {
    let row = sqlx::query_as::<_, NotificationEvent>(
        "INSERT INTO notification_events (id, landlord_id, kind, payload)
         VALUES ($1, $2, $3, $4)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(landlord_id)
    .bind(kind)
    .bind(payload)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn list(
    pool: &PgPool,
    landlord_id: Uuid,
    kind: Option<&str>,
    limit: i64,
) -> AppResult<Vec<NotificationEvent>> {
    let rows = sqlx::query_as::<_, NotificationEvent>(
        "SELECT * FROM notification_events
         WHERE landlord_id = $1
           AND ($2::text IS NULL OR kind = $2)
         ORDER BY created_at DESC
         LIMIT $3",
    )
    .bind(landlord_id)
    .bind(kind)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
