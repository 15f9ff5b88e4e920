use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::repository::invoices::{self, Invoice};
use crate::repository::transactions::{self, NewTransaction};
use crate::repository::users;
use crate::services::notifications::{self, NotificationKind};
use crate::services::{paystack, subscription_sync};
use crate::state::AppState;
use crate::tenancy::invalidate_access;

const SIGNATURE_HEADER: &str = "x-paystack-signature";

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/webhooks/paystack", axum::routing::post(paystack_webhook))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PaystackEvent {
    PaymentRequestSuccess,
    PaymentRequestPending,
    ChargeSuccess,
    InvoicePaymentFailed,
    SubscriptionCreate,
    SubscriptionNotRenew,
    SubscriptionDisable,
    Unknown,
}

fn classify_event(name: &str) -> PaystackEvent {
    match name.trim() {
        "paymentrequest.success" => PaystackEvent::PaymentRequestSuccess,
        "paymentrequest.pending" => PaystackEvent::PaymentRequestPending,
        "charge.success" => PaystackEvent::ChargeSuccess,
        "invoice.payment_failed" => PaystackEvent::InvoicePaymentFailed,
        "subscription.create" => PaystackEvent::SubscriptionCreate,
        "subscription.not_renew" => PaystackEvent::SubscriptionNotRenew,
        "subscription.disable" => PaystackEvent::SubscriptionDisable,
        _ => PaystackEvent::Unknown,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WebhookOutcome {
    Processed,
    Duplicate,
    Acknowledged,
    Ignored,
}

impl WebhookOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Duplicate => "duplicate",
            Self::Acknowledged => "acknowledged",
            Self::Ignored => "ignored",
        }
    }
}

/// Paystack webhook entry point.
///
/// Verification happens here, over the raw body, before anything is parsed
/// or written. Once past it, processing never fails the request for payload
/// oddities. Paystack retries a non-2xx with at-least-once delivery, so a
/// re-delivered event must land as a no-op, not an error.
async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let secret = state
        .config
        .paystack_secret_key
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            AppError::Dependency("PAYSTACK_SECRET_KEY is not configured.".to_string())
        })?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if signature.is_empty() || !paystack::verify_webhook_signature(&body, signature, secret) {
        return Err(AppError::Unauthorized(
            "Invalid webhook signature.".to_string(),
        ));
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest("Malformed webhook payload.".to_string()))?;
    let event_name = payload
        .get("event")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let data = payload.get("data").cloned().unwrap_or(Value::Null);

    let outcome = match classify_event(event_name) {
        PaystackEvent::PaymentRequestSuccess => handle_invoice_payment(pool, &data).await?,
        PaystackEvent::PaymentRequestPending => WebhookOutcome::Acknowledged,
        PaystackEvent::ChargeSuccess => handle_charge_success(&state, pool, &data).await?,
        PaystackEvent::SubscriptionCreate => handle_subscription_create(&state, pool, &data).await?,
        PaystackEvent::SubscriptionNotRenew => {
            handle_subscription_status(&state, pool, &data, "non-renewing", false).await?
        }
        PaystackEvent::SubscriptionDisable => handle_subscription_disable(&state, pool, &data).await?,
        PaystackEvent::InvoicePaymentFailed => handle_payment_failed(&state, pool, &data).await?,
        PaystackEvent::Unknown => {
            tracing::debug!(event = event_name, "Unhandled Paystack event");
            WebhookOutcome::Ignored
        }
    };

    Ok(Json(json!({ "status": outcome.as_str() })))
}

/// A confirmed payment against a rent/ad-hoc invoice: one immutable
/// transaction row keyed by the provider reference, then the invoice flips
/// to paid. Both writes share a transaction so a crash between them cannot
/// leave a paid invoice without its payment record.
async fn handle_invoice_payment(pool: &PgPool, data: &Value) -> AppResult<WebhookOutcome> {
    let Some(reference) = payment_reference(data) else {
        tracing::debug!("Payment event without a reference, ignoring");
        return Ok(WebhookOutcome::Ignored);
    };

    if transactions::find_by_reference(pool, &reference)
        .await?
        .is_some()
    {
        tracing::info!(reference, "Payment reference already recorded, skipping");
        return Ok(WebhookOutcome::Duplicate);
    }

    let Some(invoice) = locate_invoice(pool, data).await? else {
        tracing::warn!(reference, "Payment event does not match any invoice");
        return Ok(WebhookOutcome::Ignored);
    };

    let amount_paid = data
        .get("amount")
        .and_then(Value::as_i64)
        .unwrap_or(invoice.amount_due);
    let paid_at = data
        .get("paid_at")
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now);
    let channel = data
        .get("channel")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned);

    let mut tx = pool.begin().await?;
    let inserted = transactions::insert_once(
        &mut tx,
        &NewTransaction {
            landlord_id: invoice.landlord_id,
            invoice_id: invoice.id,
            lease_id: invoice.lease_id,
            amount_paid,
            currency: invoice.currency.clone(),
            reference: reference.clone(),
            channel,
            paid_at,
        },
    )
    .await?;
    if inserted.is_none() {
        // Lost a race with a concurrent delivery of the same event.
        tx.rollback().await?;
        return Ok(WebhookOutcome::Duplicate);
    }
    invoices::mark_paid(&mut tx, invoice.id, paid_at).await?;
    tx.commit().await?;

    let payload = json!({
        "invoice_id": invoice.id,
        "lease_id": invoice.lease_id,
        "amount_paid": amount_paid,
        "currency": invoice.currency,
        "reference": reference,
        "paid_at": paid_at,
    });
    if let Err(error) = notifications::emit(
        pool,
        invoice.landlord_id,
        NotificationKind::PaymentReceived,
        payload,
    )
    .await
    {
        tracing::warn!(invoice_id = %invoice.id, error = %error, "Failed to emit payment event");
    }

    Ok(WebhookOutcome::Processed)
}

/// `charge.success` is dual-purpose: subscription billing charges carry a
/// plan object, one-off invoice checkouts carry invoice correlation.
async fn handle_charge_success(
    state: &AppState,
    pool: &PgPool,
    data: &Value,
) -> AppResult<WebhookOutcome> {
    let has_plan = data
        .get("plan")
        .and_then(|plan| plan.get("plan_code"))
        .and_then(Value::as_str)
        .is_some();

    if has_plan {
        let Some(user) = locate_customer_user(pool, data).await? else {
            tracing::warn!("Subscription charge for unknown customer");
            return Ok(WebhookOutcome::Ignored);
        };
        subscription_sync::apply_subscription_object(pool, user.id, data).await?;
        users::reset_payment_failures(pool, user.id).await?;
        invalidate_access(state, user.id).await;
        return Ok(WebhookOutcome::Processed);
    }

    if payment_reference(data).is_some() && has_invoice_correlation(data) {
        return handle_invoice_payment(pool, data).await;
    }

    Ok(WebhookOutcome::Acknowledged)
}

async fn handle_subscription_create(
    state: &AppState,
    pool: &PgPool,
    data: &Value,
) -> AppResult<WebhookOutcome> {
    let Some(user) = locate_customer_user(pool, data).await? else {
        tracing::warn!("Subscription event for unknown customer");
        return Ok(WebhookOutcome::Ignored);
    };

    subscription_sync::apply_subscription_object(pool, user.id, data).await?;
    invalidate_access(state, user.id).await;
    Ok(WebhookOutcome::Processed)
}

async fn handle_subscription_status(
    state: &AppState,
    pool: &PgPool,
    data: &Value,
    status: &str,
    clear_next_payment: bool,
) -> AppResult<WebhookOutcome> {
    let Some(user) = locate_subscription_user(pool, data).await? else {
        tracing::warn!("Subscription status event for unknown subscription");
        return Ok(WebhookOutcome::Ignored);
    };

    users::set_subscription_status(pool, user.id, status, clear_next_payment).await?;
    invalidate_access(state, user.id).await;
    Ok(WebhookOutcome::Processed)
}

/// Disable carries the terminal provider status (`cancelled` on manual
/// cancellation, `completed` when the plan ran its course). The replica
/// keeps that status so the deriver can report it; only the scheduled
/// charge date is cleared.
async fn handle_subscription_disable(
    state: &AppState,
    pool: &PgPool,
    data: &Value,
) -> AppResult<WebhookOutcome> {
    let status = match data.get("status").and_then(Value::as_str).map(str::trim) {
        Some("completed") => "completed",
        _ => "cancelled",
    };
    handle_subscription_status(state, pool, data, status, true).await
}

async fn handle_payment_failed(
    state: &AppState,
    pool: &PgPool,
    data: &Value,
) -> AppResult<WebhookOutcome> {
    let Some(user) = locate_subscription_user(pool, data).await? else {
        tracing::warn!("Payment failure event for unknown subscription");
        return Ok(WebhookOutcome::Ignored);
    };

    let message = data
        .get("description")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .unwrap_or("Subscription charge failed.");
    users::record_payment_failure(pool, user.id, message).await?;
    invalidate_access(state, user.id).await;
    Ok(WebhookOutcome::Processed)
}

async fn locate_subscription_user(
    pool: &PgPool,
    data: &Value,
) -> AppResult<Option<users::User>> {
    if let Some(code) = subscription_code(data) {
        if let Some(user) = users::find_by_subscription_code(pool, &code).await? {
            return Ok(Some(user));
        }
    }
    locate_customer_user(pool, data).await
}

/// The first event for a fresh subscription arrives before the replica has
/// a customer code, so the lookup falls back to the checkout email.
async fn locate_customer_user(pool: &PgPool, data: &Value) -> AppResult<Option<users::User>> {
    if let Some(code) = customer_code(data) {
        if let Some(user) = users::find_by_customer_code(pool, &code).await? {
            return Ok(Some(user));
        }
    }
    if let Some(email) = customer_email(data) {
        return users::find_by_email(pool, &email).await;
    }
    Ok(None)
}

async fn locate_invoice(pool: &PgPool, data: &Value) -> AppResult<Option<Invoice>> {
    if let Some(code) = data
        .get("request_code")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|code| !code.is_empty())
    {
        if let Some(invoice) = invoices::find_by_request_code(pool, code).await? {
            return Ok(Some(invoice));
        }
    }
    if let Some(invoice_id) = metadata_invoice_id(data) {
        match invoices::find(pool, invoice_id).await {
            Ok(invoice) => return Ok(Some(invoice)),
            Err(AppError::NotFound(_)) => return Ok(None),
            Err(error) => return Err(error),
        }
    }
    Ok(None)
}

fn has_invoice_correlation(data: &Value) -> bool {
    data.get("request_code")
        .and_then(Value::as_str)
        .map(str::trim)
        .is_some_and(|code| !code.is_empty())
        || metadata_invoice_id(data).is_some()
}

fn metadata_invoice_id(data: &Value) -> Option<uuid::Uuid> {
    data.get("metadata")
        .and_then(|metadata| metadata.get("invoice_id"))
        .and_then(Value::as_str)
        .and_then(|raw| uuid::Uuid::parse_str(raw.trim()).ok())
}

fn payment_reference(data: &Value) -> Option<String> {
    for key in ["reference", "offline_reference"] {
        if let Some(reference) = data
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            return Some(reference.to_owned());
        }
    }
    None
}

fn customer_email(data: &Value) -> Option<String> {
    data.get("customer")
        .and_then(|customer| customer.get("email"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn customer_code(data: &Value) -> Option<String> {
    data.get("customer")
        .and_then(|customer| customer.get("customer_code"))
        .or_else(|| data.get("customer_code"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn subscription_code(data: &Value) -> Option<String> {
    data.get("subscription_code")
        .or_else(|| {
            data.get("subscription")
                .and_then(|subscription| subscription.get("subscription_code"))
        })
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|stamp| stamp.with_timezone(&Utc))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::{
        classify_event, customer_code, customer_email, has_invoice_correlation,
        metadata_invoice_id, payment_reference, subscription_code, PaystackEvent,
    };
    use serde_json::json;

    #[test]
    fn classifies_known_events() {
        assert_eq!(
            classify_event("paymentrequest.success"),
            PaystackEvent::PaymentRequestSuccess
        );
        assert_eq!(
            classify_event("paymentrequest.pending"),
            PaystackEvent::PaymentRequestPending
        );
        assert_eq!(classify_event("charge.success"), PaystackEvent::ChargeSuccess);
        assert_eq!(
            classify_event("subscription.not_renew"),
            PaystackEvent::SubscriptionNotRenew
        );
        assert_eq!(classify_event("transfer.success"), PaystackEvent::Unknown);
        assert_eq!(classify_event(""), PaystackEvent::Unknown);
    }

    #[test]
    fn prefers_reference_over_offline_reference() {
        let data = json!({ "reference": "TXN-ABC123", "offline_reference": "OFF-1" });
        assert_eq!(payment_reference(&data).as_deref(), Some("TXN-ABC123"));

        let data = json!({ "offline_reference": "OFF-1" });
        assert_eq!(payment_reference(&data).as_deref(), Some("OFF-1"));

        assert!(payment_reference(&json!({ "reference": "  " })).is_none());
    }

    #[test]
    fn reads_customer_and_subscription_codes_from_either_shape() {
        let nested = json!({
            "customer": { "customer_code": "CUS_1" },
            "subscription": { "subscription_code": "SUB_1" }
        });
        assert_eq!(customer_code(&nested).as_deref(), Some("CUS_1"));
        assert_eq!(subscription_code(&nested).as_deref(), Some("SUB_1"));

        let flat = json!({ "customer_code": "CUS_2", "subscription_code": "SUB_2" });
        assert_eq!(customer_code(&flat).as_deref(), Some("CUS_2"));
        assert_eq!(subscription_code(&flat).as_deref(), Some("SUB_2"));
    }

    #[test]
    fn reads_the_checkout_email() {
        let data = json!({ "customer": { "email": "  landlord@example.com " } });
        assert_eq!(
            customer_email(&data).as_deref(),
            Some("landlord@example.com")
        );
        assert!(customer_email(&json!({})).is_none());
    }

    #[test]
    fn correlates_invoices_by_request_code_or_metadata() {
        assert!(has_invoice_correlation(&json!({ "request_code": "PRQ_1" })));
        let by_metadata = json!({
            "metadata": { "invoice_id": "8f7f3c9e-52cd-4fd4-8a9c-2ba18b7dc2f1" }
        });
        assert!(has_invoice_correlation(&by_metadata));
        assert!(metadata_invoice_id(&by_metadata).is_some());
        assert!(!has_invoice_correlation(&json!({ "reference": "TXN-1" })));
        assert!(metadata_invoice_id(&json!({ "metadata": { "invoice_id": "nope" } })).is_none());
    }
}
