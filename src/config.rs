use std::env;

use chrono_tz::Tz;

const DEFAULT_BILLING_TIMEZONE: &str = "Africa/Lagos";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub environment: String,
    pub api_prefix: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub trusted_hosts: Vec<String>,
    pub dev_auth_overrides_enabled: bool,
    pub rate_limit_enabled: bool,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst_size: u32,
    pub database_url: Option<String>,
    pub db_pool_max_connections: u32,
    pub db_pool_min_connections: u32,
    pub db_pool_acquire_timeout_seconds: u64,
    pub db_pool_idle_timeout_seconds: u64,
    pub jwt_secret: Option<String>,
    pub paystack_secret_key: Option<String>,
    pub cron_secret: Option<String>,
    pub trial_days: i64,
    pub default_currency: String,
    pub billing_timezone: Tz,
    pub scheduler_enabled: bool,
    pub scheduler_daily_hour: u32,
    pub gating_cache_ttl_seconds: u64,
    pub gating_cache_max_entries: u64,
    pub app_public_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            app_name: env_or("APP_NAME", "Rentora API"),
            environment: env_or("ENVIRONMENT", "development"),
            api_prefix: normalize_prefix(&env_or("API_PREFIX", "/v1")),
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse_or("PORT", 8000),
            cors_origins: parse_csv(&env_or("CORS_ORIGINS", "http://localhost:3000")),
            trusted_hosts: parse_csv(&env_or("TRUSTED_HOSTS", "localhost,127.0.0.1")),
            dev_auth_overrides_enabled: env_parse_bool_or("DEV_AUTH_OVERRIDES_ENABLED", false),
            rate_limit_enabled: env_parse_bool_or("RATE_LIMIT_ENABLED", true),
            rate_limit_per_second: env_parse_or("RATE_LIMIT_PER_SECOND", 10),
            rate_limit_burst_size: env_parse_or("RATE_LIMIT_BURST_SIZE", 100),
            database_url: env_opt("DATABASE_URL"),
            db_pool_max_connections: env_parse_or("DB_POOL_MAX_CONNECTIONS", 5),
            db_pool_min_connections: env_parse_or("DB_POOL_MIN_CONNECTIONS", 1),
            db_pool_acquire_timeout_seconds: env_parse_or("DB_POOL_ACQUIRE_TIMEOUT_SECONDS", 5),
            db_pool_idle_timeout_seconds: env_parse_or("DB_POOL_IDLE_TIMEOUT_SECONDS", 600),
            jwt_secret: env_opt("JWT_SECRET"),
            paystack_secret_key: env_opt("PAYSTACK_SECRET_KEY"),
            cron_secret: env_opt("CRON_SECRET"),
            trial_days: env_parse_or("TRIAL_DAYS", 14),
            default_currency: env_or("DEFAULT_CURRENCY", "NGN"),
            billing_timezone: parse_timezone(&env_or("BILLING_TIMEZONE", DEFAULT_BILLING_TIMEZONE)),
            scheduler_enabled: env_parse_bool_or("SCHEDULER_ENABLED", true),
            scheduler_daily_hour: env_parse_or("SCHEDULER_DAILY_HOUR", 5),
            gating_cache_ttl_seconds: env_parse_or("GATING_CACHE_TTL_SECONDS", 30),
            gating_cache_max_entries: env_parse_or("GATING_CACHE_MAX_ENTRIES", 10000),
            app_public_url: env_or("APP_PUBLIC_URL", "http://localhost:3000"),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.trim().eq_ignore_ascii_case("production")
    }

    pub fn auth_dev_overrides_enabled(&self) -> bool {
        if self.is_production() {
            return false;
        }
        self.dev_auth_overrides_enabled
    }

    /// Every secret the service cannot run without. Production refuses to
    /// start when any are missing; development warns and degrades per-route.
    pub fn check_required_secrets(&self) -> Result<(), String> {
        let mut missing = Vec::new();
        if self.database_url.is_none() {
            missing.push("DATABASE_URL");
        }
        if self.jwt_secret.is_none() {
            missing.push("JWT_SECRET");
        }
        if self.paystack_secret_key.is_none() {
            missing.push("PAYSTACK_SECRET_KEY");
        }
        if self.cron_secret.is_none() {
            missing.push("CRON_SECRET");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "Missing required configuration: {}",
                missing.join(", ")
            ))
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    env_opt(key)
        .and_then(|raw| raw.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_parse_bool_or(key: &str, default: bool) -> bool {
    match env_opt(key).as_deref().map(str::to_ascii_lowercase) {
        Some(value) if value == "1" || value == "true" || value == "yes" || value == "on" => true,
        Some(value) if value == "0" || value == "false" || value == "no" || value == "off" => false,
        Some(_) => default,
        None => default,
    }
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn parse_timezone(raw: &str) -> Tz {
    match raw.trim().parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!(
                timezone = raw,
                "Unrecognized BILLING_TIMEZONE, falling back to {DEFAULT_BILLING_TIMEZONE}"
            );
            chrono_tz::Africa::Lagos
        }
    }
}

fn normalize_prefix(raw: &str) -> String {
    let mut prefix = raw.trim().to_string();
    if prefix.is_empty() {
        return "/v1".to_string();
    }
    if !prefix.starts_with('/') {
        prefix.insert(0, '/');
    }
    while prefix.ends_with('/') && prefix.len() > 1 {
        prefix.pop();
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::{normalize_prefix, parse_timezone};

    #[test]
    fn normalizes_prefix() {
        assert_eq!(normalize_prefix("v1"), "/v1");
        assert_eq!(normalize_prefix("/v1/"), "/v1");
        assert_eq!(normalize_prefix(""), "/v1");
    }

    #[test]
    fn falls_back_to_default_timezone() {
        assert_eq!(parse_timezone("Africa/Lagos"), chrono_tz::Africa::Lagos);
        assert_eq!(parse_timezone("not-a-zone"), chrono_tz::Africa::Lagos);
    }
}
