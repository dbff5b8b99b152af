//! Startup configuration, loaded once into an immutable record and handed
//! into [`crate::state::AppState`]. No config lookup on the request path.

use std::env;

use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentProvider {
    Mock,
    Robokassa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Standard,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,

    pub bot_token: String,

    pub payment_provider: PaymentProvider,
    pub robokassa_merchant_login: String,
    pub robokassa_password_1: String,
    pub robokassa_password_2: String,
    pub robokassa_is_test: bool,
    pub mock_payment_base_url: String,
    pub webhook_base_url: String,

    pub invoice_ttl_hours: i64,
    pub api_secret: String,

    pub log_level: String,
    pub log_format: LogFormat,

    pub subscription_notify_days: Vec<i32>,
    pub balance_notify_thresholds: Vec<i64>,
    pub balance_floor: Decimal,

    /// Global fallback renewal term/price used by the auto-renewal sweep.
    /// The data model has no per-user "current tariff" reference (§3), so
    /// — mirroring `original_source`'s `settings.subscription_renewal_*` —
    /// renewal falls back to this configured term rather than a tariff
    /// lookup. See DESIGN.md.
    pub subscription_renewal_days: i32,
    pub subscription_renewal_price: i64,
    /// Accepted as configuration surface per spec.md §6; no distinct
    /// behavior is defined for it beyond the subscription read model.
    pub subscription_grace_period_days: i32,

    pub compute_service_base_url: String,
    pub compute_service_api_key: String,
    pub cost_multiplier: Decimal,

    pub scheduler_interval_secs: u64,

    /// Edge rate limiting is an out-of-scope collaborator (spec.md §1); the
    /// knob is still parsed so the full configuration surface of §6 loads,
    /// but no limiter middleware consumes it.
    pub rate_limit_calls: u32,
    pub rate_limit_period_secs: u64,

    pub bind_addr: String,
}

fn env_var(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_int_list(key: &str, default: &[i32]) -> Vec<i32> {
    match env::var(key) {
        Ok(raw) => raw.split(',').filter_map(|part| part.trim().parse().ok()).collect(),
        Err(_) => default.to_vec(),
    }
}

fn env_i64_list(key: &str, default: &[i64]) -> Vec<i64> {
    match env::var(key) {
        Ok(raw) => raw.split(',').filter_map(|part| part.trim().parse().ok()).collect(),
        Err(_) => default.to_vec(),
    }
}

impl Config {
    /// Reads every key named in the external-interfaces section, falling
    /// back to sane development defaults so `cargo run` works against a
    /// freshly migrated local database with no `.env` at all.
    pub fn from_env() -> anyhow::Result<Self> {
        let payment_provider = match env_var("PAYMENT_PROVIDER", "mock").as_str() {
            "robokassa" => PaymentProvider::Robokassa,
            _ => PaymentProvider::Mock,
        };
        let log_format = match env_var("LOG_FORMAT", "standard").as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Standard,
        };

        Ok(Self {
            database_url: env_var("DATABASE_URL", "postgres://localhost/creditcore"),
            database_max_connections: env_var("DATABASE_MAX_CONNECTIONS", "10").parse().unwrap_or(10),

            bot_token: env_var("BOT_TOKEN", ""),

            payment_provider,
            robokassa_merchant_login: env_var("ROBOKASSA_MERCHANT_LOGIN", ""),
            robokassa_password_1: env_var("ROBOKASSA_PASSWORD_1", ""),
            robokassa_password_2: env_var("ROBOKASSA_PASSWORD_2", ""),
            robokassa_is_test: env_var("ROBOKASSA_IS_TEST", "false").parse().unwrap_or(false),
            mock_payment_base_url: env_var("MOCK_PAYMENT_BASE_URL", "http://localhost:8080"),
            webhook_base_url: env_var("WEBHOOK_BASE_URL", "http://localhost:8080"),

            invoice_ttl_hours: env_var("INVOICE_TTL_HOURS", "24").parse().unwrap_or(24),
            api_secret: env_var("API_SECRET", "dev-secret"),

            log_level: env_var("LOG_LEVEL", "info"),
            log_format,

            subscription_notify_days: env_int_list("SUBSCRIPTION_NOTIFY_DAYS", &[3, 1, 0]),
            balance_notify_thresholds: env_i64_list("BALANCE_NOTIFY_THRESHOLDS", &[50, 20, 10, 5]),
            balance_floor: env_var("BALANCE_FLOOR", "1000").parse().unwrap_or(Decimal::new(1000, 0)),

            subscription_renewal_days: env_var("SUBSCRIPTION_RENEWAL_DAYS", "30").parse().unwrap_or(30),
            subscription_renewal_price: env_var("SUBSCRIPTION_RENEWAL_PRICE", "100").parse().unwrap_or(100),
            subscription_grace_period_days: env_var("SUBSCRIPTION_GRACE_PERIOD_DAYS", "0").parse().unwrap_or(0),

            compute_service_base_url: env_var("COMPUTE_SERVICE_BASE_URL", "http://localhost:9000"),
            compute_service_api_key: env_var("COMPUTE_SERVICE_API_KEY", ""),
            cost_multiplier: env_var("COST_MULTIPLIER", "3.14").parse().unwrap_or(Decimal::new(314, 2)),

            scheduler_interval_secs: env_var("SCHEDULER_INTERVAL_SECS", "60").parse().unwrap_or(60),

            rate_limit_calls: env_var("RATE_LIMIT_CALLS", "60").parse().unwrap_or(60),
            rate_limit_period_secs: env_var("RATE_LIMIT_PERIOD_SECS", "60").parse().unwrap_or(60),

            bind_addr: env_var("BIND_ADDR", "0.0.0.0:8080"),
        })
    }
}
