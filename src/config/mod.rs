//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast on malformed values. The bearer
//! token is wrapped in `secrecy::SecretString` so it never reaches a log.

pub mod secrets;

use std::time::Duration;

use crate::error::{Error, Result};
use secrecy::SecretString;

/// Default request timeout for the HTTP transport.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug)]
pub struct Config {
    /// Per-exchange timeout applied by the HTTP transport.
    pub timeout: Duration,
    pub user_agent: String,
    /// Sent as `Authorization: Bearer ...` on every exchange when set.
    pub bearer_token: Option<SecretString>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: default_user_agent(),
            bearer_token: None,
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let timeout = match optional_var("FETCHQ_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|e| {
                Error::Config(format!("FETCHQ_TIMEOUT_SECS must be a whole number of seconds: {e}"))
            })?),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            timeout,
            user_agent: optional_var("FETCHQ_USER_AGENT").unwrap_or_else(default_user_agent),
            bearer_token: optional_var("FETCHQ_BEARER_TOKEN").map(SecretString::from),
            otel_endpoint: optional_var("OTEL_ENDPOINT"),
            log_level: optional_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }
}

/// Read a variable, treating an empty value as unset.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn default_user_agent() -> String {
    format!("fetchq/{}", env!("CARGO_PKG_VERSION"))
}
