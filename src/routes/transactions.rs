use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::require_user_id;
use crate::error::{AppError, AppResult};
use crate::repository::transactions;
use crate::schemas::{clamp_limit_in_range, TransactionPath, TransactionsQuery};
use crate::state::AppState;
use crate::tenancy::assert_owner;

/// Read-only: transaction rows are only ever written by the webhook path,
/// exactly once per confirmed payment event.
pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/transactions", axum::routing::get(list_transactions))
        .route(
            "/transactions/{transaction_id}",
            axum::routing::get(get_transaction),
        )
}

async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let rows = transactions::list(
        pool,
        user_id,
        query.invoice_id,
        query.lease_id,
        clamp_limit_in_range(query.limit, 1, 1000),
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

async fn get_transaction(
    State(state): State<AppState>,
    Path(path): Path<TransactionPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let transaction = transactions::find(pool, path.transaction_id).await?;
    assert_owner(transaction.landlord_id, user_id)?;
    Ok(Json(json!(transaction)))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}
