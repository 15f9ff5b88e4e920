use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::require_user_id;
use crate::error::{AppError, AppResult};
use crate::repository::notifications;
use crate::schemas::{clamp_limit_in_range, NotificationsQuery};
use crate::state::AppState;

/// The named-event outbox, exposed so the dashboard can render in-app
/// notifications. Rows are written by the services, never by clients.
pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/notifications", axum::routing::get(list_notifications))
}

async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let rows = notifications::list(
        pool,
        user_id,
        query.kind.as_deref().map(str::trim).filter(|kind| !kind.is_empty()),
        clamp_limit_in_range(query.limit, 1, 500),
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}
