use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};

use crate::auth::require_user_id;
use crate::domain::invoice::{resolve_invoice_status, InvoiceCategory, InvoiceStatus};
use crate::error::{AppError, AppResult};
use crate::repository::{
    invoices::{self, Invoice, NewInvoice},
    leases, transactions,
};
use crate::schemas::{
    clamp_limit_in_range, validate_input, CreateInvoiceInput, InvoicePath, InvoicesQuery,
};
use crate::state::AppState;
use crate::tenancy::{assert_owner, require_feature_access};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/invoices",
            axum::routing::get(list_invoices).post(create_invoice),
        )
        .route("/invoices/{invoice_id}", axum::routing::get(get_invoice))
}

/// Invoice plus the effective status from the resolver; the stored column
/// is a cache the overdue pass refreshes, never the read-path truth.
#[derive(Debug, Clone, serde::Serialize)]
struct InvoiceView {
    #[serde(flatten)]
    invoice: Invoice,
    effective_status: InvoiceStatus,
}

fn build_view(invoice: Invoice, today: NaiveDate) -> InvoiceView {
    let effective_status =
        resolve_invoice_status(invoice.due_date, invoice.payment_recorded(), today);
    InvoiceView {
        invoice,
        effective_status,
    }
}

async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<InvoicesQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(InvoiceStatus::parse(raw).ok_or_else(|| {
            AppError::BadRequest(format!("Unknown invoice status '{raw}'."))
        })?),
    };
    let category = match query.category.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(InvoiceCategory::parse(raw).ok_or_else(|| {
            AppError::BadRequest(format!("Unknown invoice category '{raw}'."))
        })?),
    };

    let rows = invoices::list(
        pool,
        user_id,
        status,
        query.lease_id,
        category,
        clamp_limit_in_range(query.limit, 1, 1000),
    )
    .await?;

    let today = today_in_billing_tz(&state);
    let data = rows
        .into_iter()
        .map(|invoice| build_view(invoice, today))
        .collect::<Vec<_>>();
    Ok(Json(json!({ "data": data })))
}

async fn create_invoice(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateInvoiceInput>,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user_id(&state, &headers).await?;
    require_feature_access(&state, user_id).await?;
    validate_input(&payload)?;
    let pool = db_pool(&state)?;

    let category = InvoiceCategory::parse(&payload.category).ok_or_else(|| {
        AppError::UnprocessableEntity(format!(
            "Unknown invoice category '{}'.",
            payload.category
        ))
    })?;

    if let Some(lease_id) = payload.lease_id {
        let lease = leases::find(pool, lease_id).await?;
        assert_owner(lease.landlord_id, user_id)?;
    }

    let today = today_in_billing_tz(&state);
    let (status, paid_at) = if payload.mark_as_paid {
        (InvoiceStatus::Paid, Some(Utc::now()))
    } else {
        (
            resolve_invoice_status(payload.due_date, false, today),
            None,
        )
    };

    let created = invoices::insert(
        pool,
        &NewInvoice {
            landlord_id: user_id,
            lease_id: payload.lease_id,
            amount_due: payload.amount_due,
            currency: payload
                .currency
                .unwrap_or_else(|| state.config.default_currency.clone()),
            due_date: payload.due_date,
            status,
            category,
            description: payload.description,
            billing_period: None,
            provider_request_code: payload.provider_request_code,
            paid_at,
        },
    )
    .await?;

    let view = build_view(created, today);
    Ok((axum::http::StatusCode::CREATED, Json(json!(view))))
}

async fn get_invoice(
    State(state): State<AppState>,
    Path(path): Path<InvoicePath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let invoice = invoices::find(pool, path.invoice_id).await?;
    assert_owner(invoice.landlord_id, user_id)?;

    let payments = transactions::list_for_invoice(pool, invoice.id).await?;
    let view = build_view(invoice, today_in_billing_tz(&state));
    Ok(Json(json!({ "invoice": view, "transactions": payments })))
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
