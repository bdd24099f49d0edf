//! Start-up configuration from environment variables.

use crate::state::DEFAULT_SESSION_TTL;
use bazaar_core::{ApiEndpoints, PollPolicy};
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is not a valid number: {value}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },

    #[error("{key} is not a valid URL: {reason}")]
    InvalidUrl { key: &'static str, reason: String },
}

/// Landing service settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LandingConfig {
    pub port: u16,
    pub backend_url: Url,
    pub endpoints: ApiEndpoints,
    pub poll: PollPolicy,
    /// How long finished sessions stay readable
    pub session_ttl: Duration,
}

impl LandingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ApiEndpoints::default();
        let policy = PollPolicy::default();

        let backend_url = lookup("BAZAAR_BACKEND_URL")
            .unwrap_or_else(|| "http://localhost:8000".to_string());
        let backend_url = Url::parse(&backend_url).map_err(|e| ConfigError::InvalidUrl {
            key: "BAZAAR_BACKEND_URL",
            reason: e.to_string(),
        })?;

        let max_attempts: u32 = number(&lookup, "BAZAAR_POLL_ATTEMPTS", policy.max_attempts)?;
        if max_attempts == 0 {
            return Err(ConfigError::Zero {
                key: "BAZAAR_POLL_ATTEMPTS",
            });
        }
        let interval_ms: u64 = number(
            &lookup,
            "BAZAAR_POLL_INTERVAL_MS",
            u64::try_from(policy.interval.as_millis()).unwrap_or(u64::MAX),
        )?;
        let session_ttl_secs: u64 = number(
            &lookup,
            "BAZAAR_SESSION_TTL_SECS",
            DEFAULT_SESSION_TTL.as_secs(),
        )?;
        if session_ttl_secs == 0 {
            return Err(ConfigError::Zero {
                key: "BAZAAR_SESSION_TTL_SECS",
            });
        }

        Ok(Self {
            port: number(&lookup, "PORT", 3000)?,
            backend_url,
            endpoints: ApiEndpoints {
                ecommerce_confirm: lookup("BAZAAR_ECOMMERCE_CONFIRM_PATH")
                    .unwrap_or(defaults.ecommerce_confirm),
                service_confirm: lookup("BAZAAR_SERVICE_CONFIRM_PATH")
                    .unwrap_or(defaults.service_confirm),
                orders: lookup("BAZAAR_ORDER_PATH").unwrap_or(defaults.orders),
            },
            poll: PollPolicy {
                max_attempts,
                interval: Duration::from_millis(interval_ms),
            },
            session_ttl: Duration::from_secs(session_ttl_secs),
        })
    }
}

fn number<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        None => Ok(default),
    }
}
