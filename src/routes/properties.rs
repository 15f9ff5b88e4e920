use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::require_user_id;
use crate::error::{AppError, AppResult};
use crate::repository::properties::{self, NewProperty, PropertyPatch};
use crate::schemas::{
    clamp_limit_in_range, validate_input, CreatePropertyInput, PropertiesQuery, PropertyPath,
    UpdatePropertyInput,
};
use crate::state::AppState;
use crate::tenancy::{assert_owner, require_feature_access};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/properties",
            axum::routing::get(list_properties).post(create_property),
        )
        .route(
            "/properties/{property_id}",
            axum::routing::get(get_property).patch(update_property),
        )
}

async fn list_properties(
    State(state): State<AppState>,
    Query(query): Query<PropertiesQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let rows = properties::list(
        pool,
        user_id,
        query.is_active,
        clamp_limit_in_range(query.limit, 1, 500),
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

async fn create_property(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePropertyInput>,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user_id(&state, &headers).await?;
    require_feature_access(&state, user_id).await?;
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    let created = properties::insert(
        pool,
        &NewProperty {
            landlord_id: user_id,
            name: payload.name,
            address_line1: payload.address_line1,
            city: payload.city,
            state: payload.state,
            country_code: payload.country_code,
        },
    )
    .await?;

    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

async fn get_property(
    State(state): State<AppState>,
    Path(path): Path<PropertyPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let property = properties::find(pool, path.property_id).await?;
    assert_owner(property.landlord_id, user_id)?;
    Ok(Json(json!(property)))
}

async fn update_property(
    State(state): State<AppState>,
    Path(path): Path<PropertyPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdatePropertyInput>,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    require_feature_access(&state, user_id).await?;
    let pool = db_pool(&state)?;

    let property = properties::find(pool, path.property_id).await?;
    assert_owner(property.landlord_id, user_id)?;

    let updated = properties::update(
        pool,
        path.property_id,
        &PropertyPatch {
            name: payload.name,
            address_line1: payload.address_line1,
            city: payload.city,
            state: payload.state,
            country_code: payload.country_code,
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
