use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::repository::users::{self, SubscriptionPatch, User};

/// Map a Paystack subscription object into the replica columns.
///
/// The object shape (flattened): `subscription_code`, `status`,
/// `email_token`, `amount`, `next_payment_date`, `plan.{plan_code, interval,
/// currency, amount}`, `customer.customer_code`. Absent fields stay `None`
/// so an apply never erases data the event did not carry.
pub fn parse_subscription_object(data: &Value) -> SubscriptionPatch {
    let plan = data.get("plan");
    SubscriptionPatch {
        subscription_code: string_field(data, "subscription_code"),
        email_token: string_field(data, "email_token"),
        status: string_field(data, "status"),
        plan_code: plan.and_then(|p| string_field(p, "plan_code")),
        amount: data
            .get("amount")
            .and_then(Value::as_i64)
            .or_else(|| plan.and_then(|p| p.get("amount")).and_then(Value::as_i64)),
        currency: plan.and_then(|p| string_field(p, "currency")),
        interval: plan.and_then(|p| string_field(p, "interval")),
        next_payment_date: data
            .get("next_payment_date")
            .and_then(Value::as_str)
            .and_then(parse_timestamp),
        customer_code: data
            .get("customer")
            .and_then(|c| string_field(c, "customer_code")),
    }
}

pub async fn apply_subscription_object(
    pool: &PgPool,
    user_id: Uuid,
    data: &Value,
) -> AppResult<User> {
    let patch = parse_subscription_object(data);
    users::apply_subscription_patch(pool, user_id, &patch).await
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|stamp| stamp.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::parse_subscription_object;
    use serde_json::json;

    #[test]
    fn parses_a_full_subscription_object() {
        let data = json!({
            "subscription_code": "SUB_vsyqdmlzble3uii",
            "status": "active",
            "email_token": "d7gofp6yppn3qz7",
            "amount": 5_000_000,
            "next_payment_date": "2026-09-01T00:00:00.000Z",
            "plan": {
                "plan_code": "PLN_gx2wn530m0i3w3m",
                "interval": "monthly",
                "currency": "NGN",
                "amount": 5_000_000
            },
            "customer": { "customer_code": "CUS_xnxdt6s1zg1f4nx" }
        });

        let patch = parse_subscription_object(&data);
        assert_eq!(
            patch.subscription_code.as_deref(),
            Some("SUB_vsyqdmlzble3uii")
        );
        assert_eq!(patch.status.as_deref(), Some("active"));
        assert_eq!(patch.plan_code.as_deref(), Some("PLN_gx2wn530m0i3w3m"));
        assert_eq!(patch.amount, Some(5_000_000));
        assert_eq!(patch.interval.as_deref(), Some("monthly"));
        assert_eq!(patch.currency.as_deref(), Some("NGN"));
        assert_eq!(
            patch.customer_code.as_deref(),
            Some("CUS_xnxdt6s1zg1f4nx")
        );
        assert!(patch.next_payment_date.is_some());
    }

    #[test]
    fn missing_fields_stay_none() {
        let patch = parse_subscription_object(&json!({ "status": "non-renewing" }));
        assert_eq!(patch.status.as_deref(), Some("non-renewing"));
        assert!(patch.subscription_code.is_none());
        assert!(patch.amount.is_none());
        assert!(patch.next_payment_date.is_none());
    }

    #[test]
    fn ignores_malformed_timestamps() {
        let patch = parse_subscription_object(&json!({ "next_payment_date": "soon" }));
        assert!(patch.next_payment_date.is_none());
    }
}
