use std::collections::HashMap;

use chrono::{Duration, Utc};
use chrono_tz::Tz;
use serde_json::json;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::lease::{
    days_until_end, resolve_lease_status, LeaseStatus, EXPIRY_WARNING_DAYS,
};
use crate::repository::{invoices, leases};
use crate::services::notifications::{self, NotificationKind};

/// Result of the daily status refresh pass.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StatusRefreshResult {
    pub leases_activated: u32,
    pub leases_expired: u32,
    pub invoices_marked_overdue: u32,
    pub expiry_notices: u32,
    pub errors: u32,
}

/// Refresh the cached lease/invoice status columns from the resolvers and
/// emit the time-driven notification events.
///
/// The stored columns are only a cache for listing queries; every read path
/// re-derives effective status. This pass keeps the cache from drifting and
/// is safe to run any number of times a day.
pub async fn run_status_refresh(pool: &PgPool, billing_tz: Tz) -> StatusRefreshResult {
    let mut result = StatusRefreshResult::default();
    let today = Utc::now().with_timezone(&billing_tz).date_naive();

    // Phase 1: lease status cache (pending -> active, active -> expired).
    match leases::list_unresolved(pool).await {
        Ok(rows) => {
            for lease in rows {
                let effective = resolve_lease_status(
                    lease.status,
                    lease.lease_type,
                    lease.starts_on,
                    lease.ends_on,
                    today,
                );
                if effective == lease.status {
                    continue;
                }
                if let Err(error) = leases::set_status(pool, lease.id, effective).await {
                    warn!(lease_id = %lease.id, error = %error, "Failed to refresh lease status");
                    result.errors += 1;
                    continue;
                }
                match effective {
                    LeaseStatus::Active => result.leases_activated += 1,
                    LeaseStatus::Expired => {
                        result.leases_expired += 1;
                        // Occupancy ends with the term.
                        if let Err(error) = clear_unit_pointer(pool, lease.id).await {
                            warn!(lease_id = %lease.id, error = %error, "Failed to clear unit occupancy");
                            result.errors += 1;
                        }
                    }
                    _ => {}
                }
            }
        }
        Err(error) => {
            warn!(error = %error, "Failed to fetch leases for status refresh");
            result.errors += 1;
        }
    }

    // Phase 2: pending invoices past due become overdue, one digest per
    // landlord rather than one event per invoice.
    match invoices::mark_overdue_before(pool, today).await {
        Ok(rows) => {
            result.invoices_marked_overdue = rows.len() as u32;
            let mut per_landlord: HashMap<Uuid, (u32, i64, Vec<Uuid>)> = HashMap::new();
            for invoice in &rows {
                let entry = per_landlord.entry(invoice.landlord_id).or_default();
                entry.0 += 1;
                entry.1 += invoice.amount_due;
                entry.2.push(invoice.id);
            }
            for (landlord_id, (count, total_amount, invoice_ids)) in per_landlord {
                let payload = json!({
                    "invoices_overdue": count,
                    "total_amount": total_amount,
                    "invoice_ids": invoice_ids,
                    "as_of": today.to_string(),
                });
                if let Err(error) =
                    notifications::emit(pool, landlord_id, NotificationKind::InvoiceOverdue, payload)
                        .await
                {
                    warn!(landlord_id = %landlord_id, error = %error, "Failed to emit overdue digest");
                    result.errors += 1;
                }
            }
        }
        Err(error) => {
            warn!(error = %error, "Failed to mark overdue invoices");
            result.errors += 1;
        }
    }

    // Phase 3: single-shot expiry warnings, exactly at the start of the
    // warning window so a daily cadence emits each at most once.
    let warning_date = today + Duration::days(EXPIRY_WARNING_DAYS);
    match leases::list_fixed_term_ending_on(pool, warning_date).await {
        Ok(rows) => {
            for lease in rows {
                let days_left = days_until_end(lease.ends_on, today).unwrap_or(0);
                let payload = json!({
                    "lease_id": lease.id,
                    "unit_id": lease.unit_id,
                    "ends_on": lease.ends_on.map(|date| date.to_string()),
                    "days_left": days_left,
                    "rent_amount": lease.rent_amount,
                    "currency": lease.currency,
                });
                if let Err(error) = notifications::emit(
                    pool,
                    lease.landlord_id,
                    NotificationKind::LeaseExpiringSoon,
                    payload,
                )
                .await
                {
                    warn!(lease_id = %lease.id, error = %error, "Failed to emit expiry notice");
                    result.errors += 1;
                    continue;
                }
                result.expiry_notices += 1;
            }
        }
        Err(error) => {
            warn!(error = %error, "Failed to scan for expiring leases");
            result.errors += 1;
        }
    }

    info!(
        activated = result.leases_activated,
        expired = result.leases_expired,
        overdue = result.invoices_marked_overdue,
        expiry_notices = result.expiry_notices,
        errors = result.errors,
        "Status refresh completed"
    );

    result
}

async fn clear_unit_pointer(pool: &PgPool, lease_id: Uuid) -> crate::error::AppResult<()> {
    let mut conn = pool.acquire().await?;
    crate::repository::units::clear_current_lease(&mut conn, lease_id).await
}
