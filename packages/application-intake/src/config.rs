use anyhow::{Context, Result};
use chrono::Duration;
use secret_cache::CacheSettings;
use std::env;
use std::str::FromStr;

use crate::engine::EngineSettings;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub app_public_url: String,
    pub event_deadline_secs: u64,
    pub secret_ttl_secs: i64,
    pub secret_retry_base_ms: i64,
    pub secret_max_error_count: u32,
    pub notify_api_key_secret: String,
    pub case_store_secret: String,
    pub conditional_writes: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Ok(Self {
            app_public_url: env::var("APP_PUBLIC_URL").context("APP_PUBLIC_URL must be set")?,
            event_deadline_secs: parse_or("EVENT_DEADLINE_SECS", 30)?,
            secret_ttl_secs: parse_or("SECRET_TTL_SECS", 3600)?,
            secret_retry_base_ms: parse_or("SECRET_RETRY_BASE_MS", 1000)?,
            secret_max_error_count: parse_or("SECRET_MAX_ERROR_COUNT", 10)?,
            notify_api_key_secret: env::var("NOTIFY_API_KEY_SECRET")
                .unwrap_or_else(|_| "gov-uk-notify-api-key".to_string()),
            case_store_secret: env::var("CASE_STORE_SECRET")
                .unwrap_or_else(|_| "lpa-store-jwt-secret-key".to_string()),
            conditional_writes: parse_or("CONDITIONAL_WRITES", false)?,
        })
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: Duration::seconds(self.secret_ttl_secs),
            retry_base: Duration::milliseconds(self.secret_retry_base_ms),
            max_error_count: self.secret_max_error_count,
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            deadline: std::time::Duration::from_secs(self.event_deadline_secs),
            app_public_url: self.app_public_url.trim_end_matches('/').to_string(),
            notify_api_key_secret: self.notify_api_key_secret.clone(),
            case_store_secret: self.case_store_secret.clone(),
            conditional_writes: self.conditional_writes,
        }
    }
}

fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid value, got {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}
