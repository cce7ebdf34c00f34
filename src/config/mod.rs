//! Application configuration loading.
//!
//! Configuration is read from a TOML file, then environment overrides are
//! applied (`RESOCKET_URL` replaces `client.url`). A `.env` file is honoured
//! when the binary calls [`dotenvy::dotenv`] before loading.
//!
//! ```toml
//! [client]
//! url = "ws://localhost:8000/ws/{client_id}"
//! base_delay_ms = 5000
//! max_reconnect_attempts = 10
//!
//! [client.circuit_breaker]
//! failure_threshold = 5
//! reset_after_ms = 60000
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

pub mod client;
pub mod logging;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use client::{CircuitBreakerConfig, ClientConfig};
pub use logging::LoggingConfig;

use crate::error::{ConfigError, Result};

/// Environment variable overriding `client.url`.
pub const URL_ENV: &str = "RESOCKET_URL";

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse configuration from TOML text and apply environment overrides.
    ///
    /// Validation is left to [`Config::validate`] so callers can layer
    /// command-line overrides first.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Load the file when it exists, otherwise start from defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            let mut config = Self::default();
            config.apply_env();
            Ok(config)
        }
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(URL_ENV) {
            if !url.trim().is_empty() {
                self.client.url = url;
            }
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns the first invalid client setting.
    pub fn validate(&self) -> Result<()> {
        self.client.validate()?;
        Ok(())
    }

    /// Initialize logging from the `[logging]` table.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn parses_full_config() {
        let toml = r#"
            [client]
            url = "ws://localhost:8000/ws/{client_id}"
            base_delay_ms = 250
            max_reconnect_attempts = 3
            ping_interval_ms = 0

            [client.circuit_breaker]
            failure_threshold = 2
            reset_after_ms = 1000

            [logging]
            level = "debug"
            format = "json"
        "#;
        let config = Config::parse_toml(toml).unwrap();
        assert_eq!(config.client.base_delay_ms, 250);
        assert_eq!(config.client.max_reconnect_attempts, 3);
        assert_eq!(config.client.ping_interval(), None);
        assert_eq!(config.client.circuit_breaker.failure_threshold, 2);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn missing_tables_use_defaults() {
        let config = Config::parse_toml("").unwrap();
        assert_eq!(config.client, ClientConfig {
            url: config.client.url.clone(),
            ..ClientConfig::default()
        });
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = Config::parse_toml("[client\nurl = 1").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn wrong_field_type_is_parse_error() {
        let err = Config::parse_toml("[client]\nbase_delay_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::ReadFile(_))));
    }

    #[test]
    fn validate_surfaces_client_errors() {
        let mut config = Config::default();
        config.client.url = "ftp://example.com".into();
        assert!(matches!(
            config.validate(),
            Err(Error::Config(ConfigError::InvalidValue { .. }))
        ));
    }
}
