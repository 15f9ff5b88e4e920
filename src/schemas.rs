use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::domain::lease::LeaseType;
use crate::error::AppError;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

pub fn clamp_limit_in_range(limit: i64, min: i64, max: i64) -> i64 {
    limit.clamp(min, max)
}

fn default_limit() -> i64 {
    100
}
fn default_false() -> bool {
    false
}
fn default_true() -> bool {
    true
}
fn default_zero() -> i64 {
    0
}
fn default_country_ng() -> String {
    "NG".to_string()
}
fn default_one() -> i16 {
    1
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreatePropertyInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub address_line1: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    #[serde(default = "default_country_ng")]
    pub country_code: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct UpdatePropertyInput {
    pub name: Option<String>,
    pub address_line1: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country_code: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PropertiesQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateUnitInput {
    pub property_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default = "default_one")]
    pub bedrooms: i16,
    #[serde(default = "default_one")]
    pub bathrooms: i16,
    #[validate(range(min = 0))]
    pub market_rent: Option<i64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct UpdateUnitInput {
    pub name: Option<String>,
    pub bedrooms: Option<i16>,
    pub bathrooms: Option<i16>,
    pub market_rent: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UnitsQuery {
    pub property_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateTenantInput {
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct UpdateTenantInput {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TenantsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateLeaseInput {
    pub unit_id: Uuid,
    #[validate(length(min = 1))]
    pub tenant_ids: Vec<Uuid>,
    #[validate(range(min = 1))]
    pub rent_amount: i64,
    #[serde(default = "default_zero")]
    #[validate(range(min = 0))]
    pub deposit_amount: i64,
    pub currency: Option<String>,
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
    pub lease_type: LeaseType,
    #[validate(range(min = 1, max = 31))]
    pub billing_day: Option<i16>,
    #[serde(default = "default_true")]
    pub automatic_invoice: bool,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct UpdateLeaseInput {
    #[validate(range(min = 1))]
    pub rent_amount: Option<i64>,
    #[validate(range(min = 0))]
    pub deposit_amount: Option<i64>,
    pub ends_on: Option<NaiveDate>,
    #[validate(range(min = 1, max = 31))]
    pub billing_day: Option<i16>,
    pub automatic_invoice: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct LeasesQuery {
    pub status: Option<String>,
    pub unit_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateInvoiceInput {
    pub lease_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub amount_due: i64,
    pub currency: Option<String>,
    pub due_date: NaiveDate,
    pub category: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    /// Paystack payment request code, when the surrounding app raised one.
    pub provider_request_code: Option<String>,
    /// Creation-time override only; there is no path that un-pays later.
    #[serde(default = "default_false")]
    pub mark_as_paid: bool,
}

#[derive(Debug, Deserialize)]
pub struct InvoicesQuery {
    pub status: Option<String>,
    pub lease_id: Option<Uuid>,
    pub category: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    pub invoice_id: Option<Uuid>,
    pub lease_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct NotificationsQuery {
    pub kind: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyPath {
    pub property_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitPath {
    pub unit_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TenantPath {
    pub tenant_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeasePath {
    pub lease_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicePath {
    pub invoice_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionPath {
    pub transaction_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::clamp_limit_in_range;

    #[test]
    fn clamps_limits() {
        assert_eq!(clamp_limit_in_range(0, 1, 500), 1);
        assert_eq!(clamp_limit_in_range(100, 1, 500), 100);
        assert_eq!(clamp_limit_in_range(9999, 1, 500), 500);
    }
}
