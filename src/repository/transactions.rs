use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub landlord_id: Uuid,
    pub invoice_id: Uuid,
    pub lease_id: Option<Uuid>,
    pub amount_paid: i64,
    pub currency: String,
    pub reference: String,
    pub channel: Option<String>,
    pub paid_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub landlord_id: Uuid,
    pub invoice_id: Uuid,
    pub lease_id: Option<Uuid>,
    pub amount_paid: i64,
    pub currency: String,
    pub reference: String,
    pub channel: Option<String>,
    pub paid_at: DateTime<Utc>,
}

/// Transactions are written exactly once per confirmed payment event.
/// Returns `None` when the reference was already recorded, so at-least-once
/// webhook delivery collapses into a no-op.
pub async fn insert_once(
    conn: &mut PgConnection,
    new: &NewTransaction,
) -> AppResult<Option<Transaction>> {
    let row = sqlx::query_as::<_, Transaction>(
        "INSERT INTO transactions (id, landlord_id, invoice_id, lease_id, amount_paid,
                                   currency, reference, channel, paid_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (reference) DO NOTHING
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(new.landlord_id)
    .bind(new.invoice_id)
    .bind(new.lease_id)
    .bind(new.amount_paid)
    .bind(&new.currency)
    .bind(&new.reference)
    .bind(new.channel.as_deref())
    .bind(new.paid_at)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn find(pool: &PgPool, transaction_id: Uuid) -> AppResult<Transaction> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(transaction_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction not found.".to_string()))
}

pub async fn find_by_reference(pool: &PgPool, reference: &str) -> AppResult<Option<Transaction>> {
    let row = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE reference = $1")
        .bind(reference)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn list(
    pool: &PgPool,
    landlord_id: Uuid,
    invoice_id: Option<Uuid>,
    lease_id: Option<Uuid>,
    limit: i64,
) -> AppResult<Vec<Transaction>> {
    let rows = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions
         WHERE landlord_id = $1
           AND ($2::uuid IS NULL OR invoice_id = $2)
           AND ($3::uuid IS NULL OR lease_id = $3)
         ORDER BY paid_at DESC
         LIMIT $4",
    )
    .bind(landlord_id)
    .bind(invoice_id)
    .bind(lease_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn list_for_invoice(pool: &PgPool, invoice_id: Uuid) -> AppResult<Vec<Transaction>> {
    let rows = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE invoice_id = $1 ORDER BY paid_at DESC",
    )
    .bind(invoice_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
