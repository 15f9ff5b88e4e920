pub mod invoices;
pub mod leases;
pub mod notifications;
pub mod properties;
pub mod tenants;
pub mod transactions;
pub mod units;
pub mod users;
