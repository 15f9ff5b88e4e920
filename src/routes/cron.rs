use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::services::{invoice_generator, lease_watch};
use crate::state::AppState;

const CRON_SECRET_HEADER: &str = "x-cron-secret";

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/cron/daily", axum::routing::post(run_daily))
}

/// External cron entry point for the daily pass. Authenticated by a shared
/// secret header. Per-item failures are reported inside the summary, never
/// as a request failure, so retrying the whole pass is always safe.
async fn run_daily(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let expected = state
        .config
        .cron_secret
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Dependency("CRON_SECRET is not configured.".to_string()))?;
    let provided = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if provided != expected {
        return Err(AppError::Unauthorized("Invalid cron secret.".to_string()));
    }

    let pool = db_pool(&state)?;
    let billing_tz = state.config.billing_timezone;

    let generation = invoice_generator::run_monthly_generation(pool, billing_tz).await;
    let refresh = lease_watch::run_status_refresh(pool, billing_tz).await;

    Ok(Json(json!({
        "invoice_generation": generation,
        "status_refresh": refresh,
    })))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}
