use std::time::Duration;

use chrono::{Datelike, Timelike, Utc};
use tokio::time::sleep;

use crate::state::AppState;

/// Spawn the background scheduler that runs the daily pass.
///
/// Each job runs in its own `tokio::spawn` so a failure in one job never
/// crashes the scheduler loop. External cron providers can drive the same
/// pass through `POST /cron/daily`; the generation advisory lock keeps the
/// two from overlapping.
pub async fn run_background_scheduler(state: AppState) {
    tracing::info!("Background scheduler started");

    let pool = match state.db_pool.as_ref() {
        Some(pool) => pool.clone(),
        None => {
            tracing::warn!("Scheduler: no database pool configured, exiting");
            return;
        }
    };

    let mut last_daily_run: Option<u32> = None;

    loop {
        sleep(Duration::from_secs(15)).await;

        let now_utc = Utc::now();
        let today = now_utc.date_naive();
        let today_ordinal = today.ordinal();

        if last_daily_run == Some(today_ordinal) {
            continue;
        }
        if now_utc.hour() < state.config.scheduler_daily_hour {
            continue;
        }

        last_daily_run = Some(today_ordinal);
        tracing::info!("Scheduler: running daily pass for {today}");

        // Monthly rent invoice generation.
        {
            let pool = pool.clone();
            let billing_tz = state.config.billing_timezone;
            tokio::spawn(async move {
                let result =
                    crate::services::invoice_generator::run_monthly_generation(&pool, billing_tz)
                        .await;
                tracing::info!(
                    created = result.invoices_created,
                    errors = result.errors,
                    locked_out = result.locked_out,
                    "Scheduler: invoice generation completed"
                );
            });
        }

        // Lease/invoice status cache refresh plus time-driven notices.
        {
            let pool = pool.clone();
            let billing_tz = state.config.billing_timezone;
            tokio::spawn(async move {
                let result =
                    crate::services::lease_watch::run_status_refresh(&pool, billing_tz).await;
                tracing::info!(
                    activated = result.leases_activated,
                    expired = result.leases_expired,
                    overdue = result.invoices_marked_overdue,
                    "Scheduler: status refresh completed"
                );
            });
        }
    }
}
