use std::env::var;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;

use crate::infrastructure::resilience::{breaker::BreakerConfig, retry::RetryPolicy};

pub struct Config {
    pub port: u16,
    pub scheme: String,
    pub host: String,
    pub database_url: String,
    /// 32-byte AES key, hex encoded.
    pub encryption_key: String,
    pub intercom_base_url: String,
    pub retry_max_retries: u32,
    pub retry_backoff_factor: f64,
    pub retry_min_timeout_ms: u64,
    pub retry_max_timeout_ms: u64,
    pub retry_jitter: bool,
    pub breaker_failure_threshold: u32,
    pub breaker_call_timeout_ms: u64,
    pub breaker_reset_timeout_ms: u64,
    pub dispatch_interval_hours: u64,
    pub heartbeat_url: Option<String>,
}

impl Config {
    pub fn try_parse() -> Result<Config, String> {
        let _ = dotenv();

        Ok(Config {
            port: parsed_or("PORT", 8080)?,
            scheme: var("SCHEME").unwrap_or_else(|_| "http".to_string()),
            host: var("HOST").unwrap_or_else(|_| "localhost".to_string()),
            database_url: required("DATABASE_URL")?,
            encryption_key: required("ENCRYPTION_KEY")?,
            intercom_base_url: var("INTERCOM_BASE_URL")
                .unwrap_or_else(|_| "https://api.intercom.io".to_string()),
            retry_max_retries: parsed_or("RETRY_MAX_RETRIES", 3)?,
            retry_backoff_factor: parsed_or("RETRY_BACKOFF_FACTOR", 2.0)?,
            retry_min_timeout_ms: parsed_or("RETRY_MIN_TIMEOUT_MS", 1_000)?,
            retry_max_timeout_ms: parsed_or("RETRY_MAX_TIMEOUT_MS", 60_000)?,
            retry_jitter: parsed_or("RETRY_JITTER", true)?,
            breaker_failure_threshold: parsed_or("BREAKER_FAILURE_THRESHOLD", 5)?,
            breaker_call_timeout_ms: parsed_or("BREAKER_CALL_TIMEOUT_MS", 60_000)?,
            breaker_reset_timeout_ms: parsed_or("BREAKER_RESET_TIMEOUT_MS", 30_000)?,
            dispatch_interval_hours: parsed_or("DISPATCH_INTERVAL_HOURS", 6)?,
            heartbeat_url: var("HEARTBEAT_URL").ok(),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry_max_retries,
            backoff_factor: self.retry_backoff_factor,
            min_timeout: Duration::from_millis(self.retry_min_timeout_ms),
            max_timeout: Duration::from_millis(self.retry_max_timeout_ms),
            randomize: self.retry_jitter,
        }
    }

    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.breaker_failure_threshold,
            call_timeout: Duration::from_millis(self.breaker_call_timeout_ms),
            open_reset_timeout: Duration::from_millis(self.breaker_reset_timeout_ms),
        }
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_secs(self.dispatch_interval_hours * 60 * 60)
    }
}

fn required(name: &str) -> Result<String, String> {
    var(name).map_err(|_| format!("An error occured while getting {name} env param"))
}

fn parsed_or<T: FromStr>(name: &str, default: T) -> Result<T, String> {
    match var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| format!("An error occured while parsing {name} env param")),
        Err(_) => Ok(default),
    }
}
