use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

// Top-level configuration, one section per collaborator
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub identity: IdentityConfig,
    pub payment: PaymentConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Without a URL the server runs on the in-memory store.
    pub url: Option<String>,
    pub pool_size: u32,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Caching is disabled without a URL.
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Base64-encoded service-account JSON.
    pub service_key: String,
    pub jwks_url: String,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub secret_key: String,
    pub api_url: String,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

pub const GOOGLE_SECURETOKEN_JWKS: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required_var(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("{} must be set", name))
}

fn parsed_var<T>(name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var_or(name, default)
        .parse()
        .with_context(|| format!("{} must be a valid number", name))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            app: AppConfig {
                host: var_or("HOST", "0.0.0.0"),
                port: parsed_var("PORT", "5000")?,
                rust_log: var_or("RUST_LOG", "court_booking=debug,tower_http=debug"),
            },
            database: DatabaseConfig {
                url: optional_var("DATABASE_URL"),
                pool_size: parsed_var("DB_POOL_SIZE", "10")?,
            },
            redis: RedisConfig {
                url: optional_var("REDIS_URL"),
            },
            identity: IdentityConfig {
                service_key: required_var("FB_SERVICE_KEY")?,
                jwks_url: var_or("IDENTITY_JWKS_URL", GOOGLE_SECURETOKEN_JWKS),
            },
            payment: PaymentConfig {
                secret_key: required_var("STRIPE_SECRET_KEY")?,
                api_url: var_or("PAYMENT_API_URL", "https://api.stripe.com"),
                currency: var_or("PAYMENT_CURRENCY", "usd"),
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: parsed_var("CIRCUIT_BREAKER_FAILURE_THRESHOLD", "5")?,
                timeout_seconds: parsed_var("CIRCUIT_BREAKER_TIMEOUT_SECONDS", "60")?,
            },
        })
    }
}
