//! Signaling relay configuration.
//!
//! Loaded from environment variables with sensible defaults; the relay has
//! no required variables and no secrets.

use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Default WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:5000";

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Signaling relay configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// WebSocket server bind address (default: "0.0.0.0:5000").
    pub bind_address: String,

    /// Health endpoint bind address (default: "0.0.0.0:8081").
    pub health_bind_address: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a bind address fails to parse as `host:port`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if a bind address fails to parse as `host:port`.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("SR_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let health_bind_address = vars
            .get("SR_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        for addr in [&bind_address, &health_bind_address] {
            if addr.parse::<std::net::SocketAddr>().is_err() {
                return Err(ConfigError::InvalidValue(format!(
                    "not a valid socket address: {addr}"
                )));
            }
        }

        Ok(Config {
            bind_address,
            health_bind_address,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_vars(&HashMap::new()).expect("Config should load");
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.health_bind_address, DEFAULT_HEALTH_BIND_ADDRESS);
    }

    #[test]
    fn custom_values_override_defaults() {
        let vars = HashMap::from([
            ("SR_BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string()),
            (
                "SR_HEALTH_BIND_ADDRESS".to_string(),
                "127.0.0.1:9001".to_string(),
            ),
        ]);

        let config = Config::from_vars(&vars).expect("Config should load");
        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.health_bind_address, "127.0.0.1:9001");
    }

    #[test]
    fn malformed_address_is_rejected() {
        let vars = HashMap::from([("SR_BIND_ADDRESS".to_string(), "not-an-addr".to_string())]);
        assert!(Config::from_vars(&vars).is_err());
    }
}
