//! Configuration loading from environment variables.

use std::collections::HashMap;
use std::net::SocketAddr;

use chrono::Duration;
use rust_decimal::Decimal;
use thiserror::Error;

use goldline_observability::LogFormat;
use goldline_pricing::{Currency, PricingConfig};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_SESSION_MAX_AGE_SECS: i64 = 24 * 60 * 60;
pub const DEFAULT_SESSION_DEBOUNCE_MS: i64 = 500;
pub const DEFAULT_RATE_MAX_AGE_SECS: i64 = 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Postgres connection string; `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Redis connection string; `None` selects in-memory session storage.
    pub redis_url: Option<String>,
    pub pricing: PricingConfig,
    pub session_max_age: Duration,
    pub session_debounce: Duration,
    pub rate_max_age: Duration,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            redis_url: None,
            pricing: PricingConfig::default(),
            session_max_age: Duration::seconds(DEFAULT_SESSION_MAX_AGE_SECS),
            session_debounce: Duration::milliseconds(DEFAULT_SESSION_DEBOUNCE_MS),
            rate_max_age: Duration::seconds(DEFAULT_RATE_MAX_AGE_SECS),
            log_format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Read configuration from an explicit variable map.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let bind_addr = match get("GOLDLINE_BIND_ADDR") {
            Some(raw) => raw
                .parse::<SocketAddr>()
                .map_err(|e| invalid("GOLDLINE_BIND_ADDR", &raw, e.to_string()))?,
            None => {
                tracing::warn!("GOLDLINE_BIND_ADDR not set, using {DEFAULT_BIND_ADDR}");
                defaults.bind_addr
            }
        };

        let database_url = get("DATABASE_URL");
        if database_url.is_none() {
            tracing::warn!("DATABASE_URL not set, sales are kept in memory only");
        }
        let redis_url = get("REDIS_URL");

        let reference_purity = match get("GOLDLINE_REFERENCE_PURITY") {
            Some(raw) => {
                let value = raw
                    .parse::<Decimal>()
                    .map_err(|e| invalid("GOLDLINE_REFERENCE_PURITY", &raw, e.to_string()))?;
                if value <= Decimal::ZERO || value > Decimal::from(goldline_inventory::MAX_KARAT) {
                    return Err(invalid(
                        "GOLDLINE_REFERENCE_PURITY",
                        &raw,
                        "must be within (0, 24]",
                    ));
                }
                value
            }
            None => defaults.pricing.reference_purity,
        };

        let base_currency = match get("GOLDLINE_BASE_CURRENCY") {
            Some(raw) => raw
                .parse::<Currency>()
                .map_err(|e| invalid("GOLDLINE_BASE_CURRENCY", &raw, e.to_string()))?,
            None => defaults.pricing.base_currency,
        };

        let supported_currencies = match get("GOLDLINE_SUPPORTED_CURRENCIES") {
            Some(raw) => {
                let mut list = Vec::new();
                for code in raw.split(',').map(str::trim).filter(|c| !c.is_empty()) {
                    let currency = code.parse::<Currency>().map_err(|e| {
                        invalid("GOLDLINE_SUPPORTED_CURRENCIES", &raw, e.to_string())
                    })?;
                    if !list.contains(&currency) {
                        list.push(currency);
                    }
                }
                list
            }
            None => defaults.pricing.supported_currencies.clone(),
        };
        if !supported_currencies.contains(&base_currency) {
            return Err(invalid(
                "GOLDLINE_BASE_CURRENCY",
                base_currency.code(),
                "base currency must be one of the supported currencies",
            ));
        }

        let session_max_age =
            duration_var(&get, "GOLDLINE_SESSION_MAX_AGE_SECS", Duration::try_seconds)?
                .unwrap_or(defaults.session_max_age);
        let session_debounce =
            duration_var(&get, "GOLDLINE_SESSION_DEBOUNCE_MS", Duration::try_milliseconds)?
                .unwrap_or(defaults.session_debounce);
        let rate_max_age = duration_var(&get, "GOLDLINE_RATE_MAX_AGE_SECS", Duration::try_seconds)?
            .unwrap_or(defaults.rate_max_age);

        let log_format = match get("GOLDLINE_LOG_FORMAT") {
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(|e| invalid("GOLDLINE_LOG_FORMAT", &raw, e))?,
            None => LogFormat::Json,
        };

        Ok(Self {
            bind_addr,
            database_url,
            redis_url,
            pricing: PricingConfig {
                reference_purity,
                base_currency,
                supported_currencies,
            },
            session_max_age,
            session_debounce,
            rate_max_age,
            log_format,
        })
    }
}

/// Positive integer variable converted with `unit` (e.g. `Duration::try_seconds`).
fn duration_var(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = get(var) else {
        return Ok(None);
    };
    let value = raw
        .parse::<i64>()
        .map_err(|e| invalid(var, &raw, e.to_string()))?;
    if value <= 0 {
        return Err(invalid(var, &raw, "must be positive"));
    }
    unit(value)
        .map(Some)
        .ok_or_else(|| invalid(var, &raw, "out of range"))
}
