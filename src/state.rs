use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::Client;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Option<PgPool>,
    pub http_client: Client,
    /// Subscription gating decisions per landlord, short-lived. Invalidated
    /// whenever the subscription replica changes.
    pub access_cache: Cache<Uuid, bool>,
}

impl AppState {
    pub fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db_pool = crate::db::connect_lazy(&config)?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        let access_cache = Cache::builder()
            .time_to_live(Duration::from_secs(config.gating_cache_ttl_seconds.max(1)))
            .max_capacity(config.gating_cache_max_entries)
            .build();

        Ok(Self {
            config: Arc::new(config),
            db_pool,
            http_client,
            access_cache,
        })
    }
}
