use std::{env, fmt::Display, str::FromStr, time::Duration as StdDuration};

use chrono::Duration;
use log::*;
use settlement_common::{parse_boolean_flag, DEFAULT_CURRENCY_CODE};

use crate::settlement_api::RetryPolicy;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/settlement.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_INVOICE_TTL_MINUTES: i64 = 24 * 60;
const DEFAULT_MAX_INVOICE_ATTEMPTS: i64 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

/// Settlement engine configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// The single settlement currency. Every `Amount` is in minor units of this currency.
    pub currency: String,
    /// The lifetime requested for gateway invoices.
    pub invoice_ttl: Duration,
    /// Applied to new checkout sessions that do not carry their own expiry. `None` means sessions only expire with
    /// their invoice.
    pub session_ttl: Option<Duration>,
    /// The ceiling on the persisted invoice attempt counter of a session.
    pub max_invoice_attempts: i64,
    /// The first retry delay. Later delays double, up to 30 times this value.
    pub retry_backoff: StdDuration,
    /// When true, reading an overdue `Pending` session persists its `Expired` status.
    pub expire_on_read: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            invoice_ttl: Duration::minutes(DEFAULT_INVOICE_TTL_MINUTES),
            session_ttl: None,
            max_invoice_attempts: DEFAULT_MAX_INVOICE_ATTEMPTS,
            retry_backoff: StdDuration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            expire_on_read: true,
        }
    }
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {key}. {e} Using the default, {default}, instead.");
            default
        }),
    }
}

impl EngineConfig {
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key-value source. Missing or invalid values fall back to the defaults.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let defaults = Self::default();
        let database_url = lookup("SPE_DATABASE_URL").unwrap_or_else(|| {
            warn!("🪛️ SPE_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}");
            defaults.database_url.clone()
        });
        let max_connections = parse_or_default(&lookup, "SPE_DB_MAX_CONNECTIONS", defaults.max_connections);
        let currency = lookup("SPE_CURRENCY")
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.currency);
        let invoice_ttl = parse_or_default(&lookup, "SPE_INVOICE_TTL_MINUTES", DEFAULT_INVOICE_TTL_MINUTES);
        let invoice_ttl = if invoice_ttl > 0 {
            Duration::minutes(invoice_ttl)
        } else {
            error!("🪛️ SPE_INVOICE_TTL_MINUTES must be positive. Using the default, {DEFAULT_INVOICE_TTL_MINUTES}.");
            defaults.invoice_ttl
        };
        let session_ttl = match parse_or_default(&lookup, "SPE_SESSION_TTL_MINUTES", 0i64) {
            m if m > 0 => Some(Duration::minutes(m)),
            _ => None,
        };
        let max_invoice_attempts =
            parse_or_default(&lookup, "SPE_MAX_INVOICE_ATTEMPTS", DEFAULT_MAX_INVOICE_ATTEMPTS).max(1);
        let retry_backoff =
            StdDuration::from_millis(parse_or_default(&lookup, "SPE_RETRY_BACKOFF_MS", DEFAULT_RETRY_BACKOFF_MS));
        let expire_on_read = parse_boolean_flag(lookup("SPE_EXPIRE_ON_READ"), defaults.expire_on_read);
        Self {
            database_url,
            max_connections,
            currency,
            invoice_ttl,
            session_ttl,
            max_invoice_attempts,
            retry_backoff,
            expire_on_read,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_invoice_attempts, self.retry_backoff, self.retry_backoff * 30)
    }
}
