use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::repository::notifications;

/// Named events handed to the surrounding application for rendering into
/// email / in-app templates. This service never formats messages itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    InvoiceBatchCreated,
    InvoiceOverdue,
    LeaseExpiringSoon,
    PaymentReceived,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvoiceBatchCreated => "invoice_batch_created",
            Self::InvoiceOverdue => "invoice_overdue",
            Self::LeaseExpiringSoon => "lease_expiring_soon",
            Self::PaymentReceived => "payment_received",
        }
    }
}

pub async fn emit(
    pool: &PgPool,
    landlord_id: Uuid,
    kind: NotificationKind,
    payload: Value,
) -> AppResult<()> {
    notifications::insert(pool, landlord_id, kind.as_str(), payload).await?;
    Ok(())
}
