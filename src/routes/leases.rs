use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{Datelike, NaiveDate, Utc};
use serde_json::{json, Value};

use crate::auth::require_user_id;
use crate::domain::lease::{
    is_expiring_soon, resolve_lease_status, LeaseStatus, LeaseType,
};
use crate::error::{AppError, AppResult};
use crate::repository::{
    leases::{self, Lease, LeasePatch, NewLease},
    tenants, units,
};
use crate::schemas::{
    clamp_limit_in_range, validate_input, CreateLeaseInput, LeasePath, LeasesQuery,
    UpdateLeaseInput,
};
use crate::state::AppState;
use crate::tenancy::{assert_owner, require_feature_access};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/leases", axum::routing::get(list_leases).post(create_lease))
        .route(
            "/leases/{lease_id}",
            axum::routing::get(get_lease).patch(update_lease),
        )
        .route(
            "/leases/{lease_id}/terminate",
            axum::routing::post(terminate_lease),
        )
}

/// Lease as the dashboard sees it: the stored row plus the effective status
/// from the resolver. The stored status column is never trusted on reads.
#[derive(Debug, Clone, serde::Serialize)]
struct LeaseView {
    #[serde(flatten)]
    lease: Lease,
    effective_status: LeaseStatus,
    expiring_soon: bool,
}

fn build_view(lease: Lease, today: NaiveDate) -> LeaseView {
    let effective_status = resolve_lease_status(
        lease.status,
        lease.lease_type,
        lease.starts_on,
        lease.ends_on,
        today,
    );
    let expiring_soon = effective_status == LeaseStatus::Active
        && lease.lease_type == LeaseType::FixedTerm
        && is_expiring_soon(lease.ends_on, today);
    LeaseView {
        lease,
        effective_status,
        expiring_soon,
    }
}

fn validate_term(
    lease_type: LeaseType,
    starts_on: NaiveDate,
    ends_on: Option<NaiveDate>,
) -> AppResult<()> {
    if lease_type == LeaseType::FixedTerm && ends_on.is_none() {
        return Err(AppError::BadRequest(
            "A fixed-term lease requires an end date.".to_string(),
        ));
    }
    if let Some(ends) = ends_on {
        if ends < starts_on {
            return Err(AppError::BadRequest(
                "Lease end date must be on or after the start date.".to_string(),
            ));
        }
    }
    Ok(())
}

async fn list_leases(
    State(state): State<AppState>,
    Query(query): Query<LeasesQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(LeaseStatus::parse(raw).ok_or_else(|| {
            AppError::BadRequest(format!("Unknown lease status '{raw}'."))
        })?),
    };

    let rows = leases::list(
        pool,
        user_id,
        status,
        query.unit_id,
        clamp_limit_in_range(query.limit, 1, 1000),
    )
    .await?;

    let today = today_in_billing_tz(&state);
    let data = rows
        .into_iter()
        .map(|lease| build_view(lease, today))
        .collect::<Vec<_>>();
    Ok(Json(json!({ "data": data })))
}

async fn create_lease(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateLeaseInput>,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user_id(&state, &headers).await?;
    require_feature_access(&state, user_id).await?;
    validate_input(&payload)?;
    validate_term(payload.lease_type, payload.starts_on, payload.ends_on)?;
    let pool = db_pool(&state)?;

    let unit = units::find(pool, payload.unit_id).await?;
    assert_owner(unit.landlord_id, user_id)?;
    if unit.current_lease_id.is_some() {
        return Err(AppError::Conflict(
            "Unit already has a current lease. Terminate it first.".to_string(),
        ));
    }

    for tenant_id in &payload.tenant_ids {
        let tenant = tenants::find(pool, *tenant_id).await?;
        assert_owner(tenant.landlord_id, user_id)?;
    }

    let today = today_in_billing_tz(&state);
    let initial_status = resolve_lease_status(
        LeaseStatus::Pending,
        payload.lease_type,
        payload.starts_on,
        payload.ends_on,
        today,
    );
    let billing_day = payload
        .billing_day
        .unwrap_or(payload.starts_on.day() as i16);

    let new_lease = NewLease {
        landlord_id: user_id,
        unit_id: payload.unit_id,
        rent_amount: payload.rent_amount,
        deposit_amount: payload.deposit_amount,
        currency: payload
            .currency
            .unwrap_or_else(|| state.config.default_currency.clone()),
        starts_on: payload.starts_on,
        ends_on: payload.ends_on,
        lease_type: payload.lease_type,
        status: initial_status,
        billing_day,
        automatic_invoice: payload.automatic_invoice,
    };

    let mut tx = pool.begin().await?;
    let lease = leases::insert(&mut tx, &new_lease).await?;
    leases::add_tenants(&mut tx, lease.id, &payload.tenant_ids).await?;
    if initial_status != LeaseStatus::Expired {
        units::set_current_lease(&mut tx, unit.id, Some(lease.id)).await?;
    }
    tx.commit().await?;

    let view = build_view(lease, today);
    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({ "lease": view, "tenant_ids": payload.tenant_ids })),
    ))
}

async fn get_lease(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let lease = leases::find(pool, path.lease_id).await?;
    assert_owner(lease.landlord_id, user_id)?;

    let tenant_ids = leases::tenant_ids_for(pool, lease.id).await?;
    let view = build_view(lease, today_in_billing_tz(&state));
    Ok(Json(json!({ "lease": view, "tenant_ids": tenant_ids })))
}

async fn update_lease(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateLeaseInput>,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    require_feature_access(&state, user_id).await?;
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    let lease = leases::find(pool, path.lease_id).await?;
    assert_owner(lease.landlord_id, user_id)?;
    if lease.status == LeaseStatus::Terminated {
        return Err(AppError::Conflict(
            "A terminated lease cannot be changed.".to_string(),
        ));
    }
    if let Some(ends_on) = payload.ends_on {
        validate_term(lease.lease_type, lease.starts_on, Some(ends_on))?;
    }

    let updated = leases::update(
        pool,
        path.lease_id,
        &LeasePatch {
            rent_amount: payload.rent_amount,
            deposit_amount: payload.deposit_amount,
            ends_on: payload.ends_on,
            billing_day: payload.billing_day,
            automatic_invoice: payload.automatic_invoice,
        },
    )
    .await?;

    let view = build_view(updated, today_in_billing_tz(&state));
    Ok(Json(json!({ "lease": view })))
}

/// Termination is the only path into the terminal status. Clears the unit's
/// occupancy pointer in the same transaction.
async fn terminate_lease(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    require_feature_access(&state, user_id).await?;
    let pool = db_pool(&state)?;

    let lease = leases::find(pool, path.lease_id).await?;
    assert_owner(lease.landlord_id, user_id)?;
    if lease.status == LeaseStatus::Terminated {
        return Err(AppError::Conflict(
            "Lease is already terminated.".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    let terminated = leases::terminate(&mut tx, lease.id, Utc::now()).await?;
    units::clear_current_lease(&mut tx, lease.id).await?;
    tx.commit().await?;

    let view = build_view(terminated, today_in_billing_tz(&state));
    Ok(Json(json!({ "lease": view })))
}

fn today_in_billing_tz(state: &AppState) -> NaiveDate {
    Utc::now()
        .with_timezone(&state.config.billing_timezone)
        .date_naive()
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::validate_term;
    use crate::domain::lease::LeaseType;
    use chrono::NaiveDate;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn fixed_term_requires_an_end_date() {
        assert!(validate_term(LeaseType::FixedTerm, date(2026, 1, 1), None).is_err());
        assert!(
            validate_term(LeaseType::FixedTerm, date(2026, 1, 1), Some(date(2026, 12, 31)))
                .is_ok()
        );
    }

    #[test]
    fn monthly_leases_may_be_open_ended() {
        assert!(validate_term(LeaseType::Monthly, date(2026, 1, 1), None).is_ok());
    }

    #[test]
    fn end_date_cannot_precede_start() {
        assert!(
            validate_term(LeaseType::Monthly, date(2026, 6, 1), Some(date(2026, 5, 1))).is_err()
        );
    }
}
