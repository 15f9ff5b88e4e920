use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::require_user_id;
use crate::error::{AppError, AppResult};
use crate::repository::tenants::{self, NewTenant, TenantPatch};
use crate::schemas::{
    clamp_limit_in_range, validate_input, CreateTenantInput, TenantPath, TenantsQuery,
    UpdateTenantInput,
};
use crate::state::AppState;
use crate::tenancy::{assert_owner, require_feature_access};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/tenants",
            axum::routing::get(list_tenants).post(create_tenant),
        )
        .route(
            "/tenants/{tenant_id}",
            axum::routing::get(get_tenant).patch(update_tenant),
        )
}

async fn list_tenants(
    State(state): State<AppState>,
    Query(query): Query<TenantsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let rows = tenants::list(pool, user_id, clamp_limit_in_range(query.limit, 1, 1000)).await?;
    Ok(Json(json!({ "data": rows })))
}

async fn create_tenant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateTenantInput>,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user_id(&state, &headers).await?;
    require_feature_access(&state, user_id).await?;
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    let created = tenants::insert(
        pool,
        &NewTenant {
            landlord_id: user_id,
            full_name: payload.full_name,
            email: payload.email,
            phone: payload.phone,
            notes: payload.notes,
        },
    )
    .await?;

    Ok((axum::http::StatusCode::CREATED, Json(created)))
}

async fn get_tenant(
    State(state): State<AppState>,
    Path(path): Path<TenantPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let tenant = tenants::find(pool, path.tenant_id).await?;
    assert_owner(tenant.landlord_id, user_id)?;
    Ok(Json(json!(tenant)))
}

async fn update_tenant(
    State(state): State<AppState>,
    Path(path): Path<TenantPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateTenantInput>,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    require_feature_access(&state, user_id).await?;
    let pool = db_pool(&state)?;

    let tenant = tenants::find(pool, path.tenant_id).await?;
    assert_owner(tenant.landlord_id, user_id)?;

    let updated = tenants::update(
        pool,
        path.tenant_id,
        &TenantPatch {
            full_name: payload.full_name,
            email: payload.email,
            phone: payload.phone,
            notes: payload.notes,
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
