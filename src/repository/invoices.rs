use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::invoice::{InvoiceCategory, InvoiceStatus};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub landlord_id: Uuid,
    pub lease_id: Option<Uuid>,
    pub amount_due: i64,
    pub currency: String,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub category: InvoiceCategory,
    pub description: Option<String>,
    pub billing_period: Option<String>,
    pub provider_request_code: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn payment_recorded(&self) -> bool {
        self.paid_at.is_some() || self.status == InvoiceStatus::Paid
    }
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub landlord_id: Uuid,
    pub lease_id: Option<Uuid>,
    pub amount_due: i64,
    pub currency: String,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub category: InvoiceCategory,
    pub description: Option<String>,
    pub billing_period: Option<String>,
    pub provider_request_code: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

pub async fn insert(pool: &PgPool, new: &NewInvoice) -> AppResult<Invoice> {
    let row = sqlx::query_as::<_, Invoice>(
        "INSERT INTO invoices (id, landlord_id, lease_id, amount_due, currency, due_date,
                               status, category, description, billing_period,
                               provider_request_code, paid_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(new.landlord_id)
    .bind(new.lease_id)
    .bind(new.amount_due)
    .bind(&new.currency)
    .bind(new.due_date)
    .bind(new.status)
    .bind(new.category)
    .bind(new.description.as_deref())
    .bind(new.billing_period.as_deref())
    .bind(new.provider_request_code.as_deref())
    .bind(new.paid_at)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Insert one generated cycle invoice. Returns `None` when that
/// lease + billing period already exists: a concurrent run or an earlier
/// pass got there first, which is the expected idempotent outcome.
pub async fn insert_generated(pool: &PgPool, new: &NewInvoice) -> AppResult<Option<Invoice>> {
    let row = sqlx::query_as::<_, Invoice>(
        "INSERT INTO invoices (id, landlord_id, lease_id, amount_due, currency, due_date,
                               status, category, description, billing_period)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         ON CONFLICT (lease_id, billing_period)
            WHERE lease_id IS NOT NULL AND billing_period IS NOT NULL
            DO NOTHING
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(new.landlord_id)
    .bind(new.lease_id)
    .bind(new.amount_due)
    .bind(&new.currency)
    .bind(new.due_date)
    .bind(new.status)
    .bind(new.category)
    .bind(new.description.as_deref())
    .bind(new.billing_period.as_deref())
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn find(pool: &PgPool, invoice_id: Uuid) -> AppResult<Invoice> {
    sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1")
        .bind(invoice_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Invoice not found.".to_string()))
}

pub async fn find_by_request_code(pool: &PgPool, code: &str) -> AppResult<Option<Invoice>> {
    let row = sqlx::query_as::<_, Invoice>(
        "SELECT * FROM invoices WHERE provider_request_code = $1",
    )
    .bind(code)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn list(
    pool: &PgPool,
    landlord_id: Uuid,
    status: Option<InvoiceStatus>,
    lease_id: Option<Uuid>,
    category: Option<InvoiceCategory>,
    limit: i64,
) -> AppResult<Vec<Invoice>> {
    let rows = sqlx::query_as::<_, Invoice>(
        "SELECT * FROM invoices
         WHERE landlord_id = $1
           AND ($2::invoice_status IS NULL OR status = $2)
           AND ($3::uuid IS NULL OR lease_id = $3)
           AND ($4::invoice_category IS NULL OR category = $4)
         ORDER BY due_date DESC
         LIMIT $5",
    )
    .bind(landlord_id)
    .bind(status)
    .bind(lease_id)
    .bind(category)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn last_billing_period(pool: &PgPool, lease_id: Uuid) -> AppResult<Option<String>> {
    let period = sqlx::query_scalar::<_, Option<String>>(
        "SELECT MAX(billing_period) FROM invoices
         WHERE lease_id = $1 AND billing_period IS NOT NULL",
    )
    .bind(lease_id)
    .fetch_one(pool)
    .await?;
    Ok(period)
}

/// Paid is terminal; re-marking keeps the original payment timestamp.
pub async fn mark_paid(
    conn: &mut PgConnection,
    invoice_id: Uuid,
    paid_at: DateTime<Utc>,
) -> AppResult<Invoice> {
    let row = sqlx::query_as::<_, Invoice>(
        "UPDATE invoices
         SET status = 'paid', paid_at = COALESCE(paid_at, $2), updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(invoice_id)
    .bind(paid_at)
    .fetch_optional(conn)
    .await?;
    row.ok_or_else(|| AppError::NotFound("Invoice not found.".to_string()))
}

pub async fn mark_overdue_before(pool: &PgPool, today: NaiveDate) -> AppResult<Vec<Invoice>> {
    let rows = sqlx::query_as::<_, Invoice>(
        "UPDATE invoices
         SET status = 'overdue', updated_at = now()
         WHERE status = 'pending' AND paid_at IS NULL AND due_date < $1
         RETURNING *",
    )
    .bind(today)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
