use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::json;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::invoice::{plan_billing_periods, BillingPeriod, InvoiceCategory, InvoiceStatus};
use crate::domain::lease::{resolve_lease_status, LeaseStatus};
use crate::error::AppError;
use crate::repository::invoices::{self, NewInvoice};
use crate::repository::leases::{self, Lease};
use crate::services::notifications::{self, NotificationKind};

/// Session-level advisory lock key so overlapping generation runs (internal
/// scheduler racing an external cron trigger) cannot double-process.
const GENERATION_LOCK_KEY: i64 = 0x52454E_544F5241;

/// Result of one monthly generation run.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct InvoiceGenerationResult {
    pub leases_considered: u32,
    pub invoices_created: u32,
    pub cycles_already_covered: u32,
    pub failed_leases: Vec<Uuid>,
    pub errors: u32,
    pub locked_out: bool,
}

#[derive(Debug, Default)]
struct DigestEntry {
    count: u32,
    total_amount: i64,
    currency: String,
}

/// Generate the missed monthly rent invoices for every lease with automatic
/// invoicing whose resolved status is active.
///
/// One lease failing never aborts the batch; its id lands in
/// `failed_leases` and processing continues. A single per-landlord digest
/// event summarizes what was created, never one notification per invoice.
pub async fn run_monthly_generation(pool: &PgPool, billing_tz: Tz) -> InvoiceGenerationResult {
    let mut result = InvoiceGenerationResult::default();

    let mut lock_conn = match pool.acquire().await {
        Ok(conn) => conn,
        Err(error) => {
            warn!(error = %error, "Invoice generation could not acquire a connection");
            result.errors += 1;
            return result;
        }
    };

    let locked = sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
        .bind(GENERATION_LOCK_KEY)
        .fetch_one(&mut *lock_conn)
        .await
        .unwrap_or(false);
    if !locked {
        info!("Invoice generation is already running elsewhere, skipping this run");
        result.locked_out = true;
        return result;
    }

    // "Today" in the billing timezone decides which cycle is current.
    let today = Utc::now().with_timezone(&billing_tz).date_naive();

    let candidates = match leases::list_auto_invoice_candidates(pool).await {
        Ok(rows) => rows,
        Err(error) => {
            warn!(error = %error, "Failed to fetch leases for invoice generation");
            result.errors += 1;
            release_lock(&mut lock_conn).await;
            return result;
        }
    };

    let mut digests: HashMap<Uuid, DigestEntry> = HashMap::new();

    for lease in &candidates {
        let effective = resolve_lease_status(
            lease.status,
            lease.lease_type,
            lease.starts_on,
            lease.ends_on,
            today,
        );
        if effective != LeaseStatus::Active {
            continue;
        }
        result.leases_considered += 1;

        match generate_for_lease(pool, lease, today).await {
            Ok(outcome) => {
                result.cycles_already_covered += outcome.already_covered;
                if !outcome.created.is_empty() {
                    let entry = digests.entry(lease.landlord_id).or_default();
                    for invoice in &outcome.created {
                        entry.count += 1;
                        entry.total_amount += invoice.amount_due;
                        entry.currency = invoice.currency.clone();
                    }
                    result.invoices_created += outcome.created.len() as u32;
                }
            }
            Err(error) => {
                warn!(lease_id = %lease.id, error = %error, "Invoice generation failed for lease");
                result.failed_leases.push(lease.id);
                result.errors += 1;
            }
        }
    }

    for (landlord_id, entry) in &digests {
        let payload = json!({
            "invoices_created": entry.count,
            "total_amount": entry.total_amount,
            "currency": entry.currency,
            "generated_on": today.to_string(),
        });
        if let Err(error) = notifications::emit(
            pool,
            *landlord_id,
            NotificationKind::InvoiceBatchCreated,
            payload,
        )
        .await
        {
            warn!(landlord_id = %landlord_id, error = %error, "Failed to emit invoice batch digest");
            result.errors += 1;
        }
    }

    release_lock(&mut lock_conn).await;

    info!(
        considered = result.leases_considered,
        created = result.invoices_created,
        covered = result.cycles_already_covered,
        errors = result.errors,
        "Monthly invoice generation completed"
    );

    result
}

struct LeaseGenerationOutcome {
    created: Vec<crate::repository::invoices::Invoice>,
    already_covered: u32,
}

async fn generate_for_lease(
    pool: &PgPool,
    lease: &Lease,
    today: NaiveDate,
) -> Result<LeaseGenerationOutcome, AppError> {
    let last_generated = invoices::last_billing_period(pool, lease.id)
        .await?
        .and_then(|raw| BillingPeriod::parse(&raw));

    let periods = plan_billing_periods(lease.starts_on, last_generated, today);

    let billing_day = if lease.billing_day >= 1 {
        lease.billing_day as u32
    } else {
        1
    };

    let mut outcome = LeaseGenerationOutcome {
        created: Vec::new(),
        already_covered: 0,
    };

    for period in periods {
        let new_invoice = NewInvoice {
            landlord_id: lease.landlord_id,
            lease_id: Some(lease.id),
            amount_due: lease.rent_amount,
            currency: lease.currency.clone(),
            due_date: period.due_date(billing_day),
            status: InvoiceStatus::Pending,
            category: InvoiceCategory::Rent,
            description: Some(format!("Monthly rent ({period})")),
            billing_period: Some(period.to_string()),
            provider_request_code: None,
            paid_at: None,
        };

        match invoices::insert_generated(pool, &new_invoice).await? {
            Some(invoice) => outcome.created.push(invoice),
            // A concurrent run already wrote this lease + cycle.
            None => outcome.already_covered += 1,
        }
    }

    Ok(outcome)
}

async fn release_lock(conn: &mut sqlx::pool::PoolConnection<sqlx::Postgres>) {
    if let Err(error) = sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(GENERATION_LOCK_KEY)
        .execute(&mut **conn)
        .await
    {
        warn!(error = %error, "Failed to release invoice generation lock");
    }
}
