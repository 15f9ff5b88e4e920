use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::require_user_id;
use crate::error::{AppError, AppResult};
use crate::repository::{
    properties,
    units::{self, NewUnit, UnitPatch},
};
use crate::schemas::{
    clamp_limit_in_range, validate_input, CreateUnitInput, UnitPath, UnitsQuery, UpdateUnitInput,
};
use crate::state::AppState;
use crate::tenancy::{assert_owner, require_feature_access};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/units", axum::routing::get(list_units).post(create_unit))
        .route(
            "/units/{unit_id}",
            axum::routing::get(get_unit).patch(update_unit),
        )
}

async fn list_units(
    State(state): State<AppState>,
    Query(query): Query<UnitsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let rows = units::list(
        pool,
        user_id,
        query.property_id,
        clamp_limit_in_range(query.limit, 1, 1000),
    )
    .await?;

    let data = rows
        .into_iter()
        .map(|unit| {
            let occupied = unit.current_lease_id.is_some();
            json!({ "unit": unit, "occupied": occupied })
        })
        .collect::<Vec<_>>();
    Ok(Json(json!({ "data": data })))
}

async fn create_unit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateUnitInput>,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user_id(&state, &headers).await?;
    require_feature_access(&state, user_id).await?;
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    let property = properties::find(pool, payload.property_id).await?;
    assert_owner(property.landlord_id, user_id)?;

    let created = units::insert(
        pool,
        &NewUnit {
            landlord_id: user_id,
            property_id: payload.property_id,
            code: payload.code,
            name: payload.name,
            bedrooms: payload.bedrooms,
            bathrooms: payload.bathrooms,
            market_rent: payload.market_rent,
            currency: payload
                .currency
                .unwrap_or_else(|| state.config.default_currency.clone()),
        },
    )
    .await?;

    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

async fn get_unit(
    State(state): State<AppState>,
    Path(path): Path<UnitPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let unit = units::find(pool, path.unit_id).await?;
    assert_owner(unit.landlord_id, user_id)?;
    let occupied = unit.current_lease_id.is_some();
    Ok(Json(json!({ "unit": unit, "occupied": occupied })))
}

async fn update_unit(
    State(state): State<AppState>,
    Path(path): Path<UnitPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateUnitInput>,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    require_feature_access(&state, user_id).await?;
    let pool = db_pool(&state)?;

    let unit = units::find(pool, path.unit_id).await?;
    assert_owner(unit.landlord_id, user_id)?;

    let updated = units::update(
        pool,
        path.unit_id,
        &UnitPatch {
            name: payload.name,
            bedrooms: payload.bedrooms,
            bathrooms: payload.bathrooms,
            market_rent: payload.market_rent,
            is_active: payload.is_active,
        },
    )
    .await?;
    Ok(Json(json!(updated)))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}
