//! Call service configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default interval between repeated incoming-call pushes.
pub const DEFAULT_RING_RETRY_INTERVAL_SECONDS: u64 = 2;

/// Default maximum ring duration before a call ends as unanswered.
pub const DEFAULT_RING_TIMEOUT_SECONDS: u64 = 45;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Call service configuration.
///
/// Loaded from environment variables with sensible defaults.
/// Database URL and provider token are redacted in Debug output to prevent
/// credential leakage.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Base URL of the push gateway that delivers incoming-call signals.
    pub push_gateway_url: String,

    /// Base URL of the telephony bridge provider API.
    pub bridge_provider_url: String,

    /// Service token for authenticating to the bridge provider.
    pub bridge_provider_token: String,

    /// Interval between repeated pushes while a call is ringing.
    pub ring_retry_interval: Duration,

    /// Maximum ring duration; on expiry the call ends with reason no-answer.
    pub ring_timeout: Duration,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("push_gateway_url", &self.push_gateway_url)
            .field("bridge_provider_url", &self.bridge_provider_url)
            .field("bridge_provider_token", &"[REDACTED]")
            .field("ring_retry_interval", &self.ring_retry_interval)
            .field("ring_timeout", &self.ring_timeout)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid ring retry interval configuration: {0}")]
    InvalidRingRetryInterval(String),

    #[error("Invalid ring timeout configuration: {0}")]
    InvalidRingTimeout(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let push_gateway_url = vars
            .get("PUSH_GATEWAY_URL")
            .cloned()
            .unwrap_or_else(|| "http://localhost:8090".to_string());

        let bridge_provider_url = vars
            .get("BRIDGE_PROVIDER_URL")
            .cloned()
            .unwrap_or_else(|| "http://localhost:8091".to_string());

        let bridge_provider_token = vars
            .get("BRIDGE_PROVIDER_TOKEN")
            .cloned()
            .unwrap_or_default();

        // Parse ring retry interval with validation
        let ring_retry_interval_seconds =
            if let Some(value_str) = vars.get("RING_RETRY_INTERVAL_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidRingRetryInterval(format!(
                        "RING_RETRY_INTERVAL_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidRingRetryInterval(
                        "RING_RETRY_INTERVAL_SECONDS must be greater than 0".to_string(),
                    ));
                }

                value
            } else {
                DEFAULT_RING_RETRY_INTERVAL_SECONDS
            };

        // Parse ring timeout with validation
        let ring_timeout_seconds = if let Some(value_str) = vars.get("RING_TIMEOUT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidRingTimeout(format!(
                    "RING_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidRingTimeout(
                    "RING_TIMEOUT_SECONDS must be greater than 0".to_string(),
                ));
            }

            if value <= ring_retry_interval_seconds {
                return Err(ConfigError::InvalidRingTimeout(format!(
                    "RING_TIMEOUT_SECONDS must exceed the retry interval ({} seconds), got {}",
                    ring_retry_interval_seconds, value
                )));
            }

            value
        } else {
            DEFAULT_RING_TIMEOUT_SECONDS
        };

        Ok(Config {
            database_url,
            bind_address,
            push_gateway_url,
            bridge_provider_url,
            bridge_provider_token,
            ring_retry_interval: Duration::from_secs(ring_retry_interval_seconds),
            ring_timeout: Duration::from_secs(ring_timeout_seconds),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([(
            "DATABASE_URL".to_string(),
            "postgresql://localhost/interfone".to_string(),
        )])
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(&base_vars()).unwrap();
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.ring_retry_interval, Duration::from_secs(2));
        assert_eq!(config.ring_timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_missing_database_url() {
        let result = Config::from_vars(&HashMap::new());
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn test_ring_timeout_must_exceed_interval() {
        let mut vars = base_vars();
        vars.insert("RING_RETRY_INTERVAL_SECONDS".to_string(), "5".to_string());
        vars.insert("RING_TIMEOUT_SECONDS".to_string(), "5".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidRingTimeout(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut vars = base_vars();
        vars.insert("RING_RETRY_INTERVAL_SECONDS".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidRingRetryInterval(_))
        ));
    }

    #[test]
    fn test_debug_redacts_database_url() {
        let config = Config::from_vars(&base_vars()).unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("postgresql://"));
    }
}
