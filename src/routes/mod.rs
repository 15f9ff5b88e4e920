use axum::{routing::get, Router};

use crate::state::AppState;

pub mod billing;
pub mod cron;
pub mod health;
pub mod identity;
pub mod invoices;
pub mod leases;
pub mod notifications;
pub mod properties;
pub mod tenants;
pub mod transactions;
pub mod units;
pub mod webhooks;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/me", get(identity::me))
        .merge(properties::router())
        .merge(units::router())
        .merge(tenants::router())
        .merge(leases::router())
        .merge(invoices::router())
        .merge(transactions::router())
        .merge(notifications::router())
        .merge(billing::router())
        .merge(webhooks::router())
        .merge(cron::router())
}
