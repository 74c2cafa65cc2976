//! Configuration for the catalog service.

use std::env;
use thiserror::Error;

/// Invalid configuration value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {key}: '{value}'")]
    Invalid {
        /// Environment variable name
        key: &'static str,
        /// Offending value
        value: String,
    },
}

/// Catalog service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Config {
    /// Load configuration from `CATALOG_HOST` and `CATALOG_PORT`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `CATALOG_PORT` is not a port number.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `CATALOG_PORT` is not a port number.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let port = match lookup("CATALOG_PORT") {
            None => defaults.port,
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key: "CATALOG_PORT", value })?,
        };

        Ok(Self {
            host: lookup("CATALOG_HOST").unwrap_or(defaults.host),
            port,
        })
    }

    /// Address the HTTP server binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(Config::from_lookup(|_| None).unwrap().bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn overrides() {
        let config = Config::from_lookup(|key| match key {
            "CATALOG_HOST" => Some("127.0.0.1".to_string()),
            "CATALOG_PORT" => Some("9090".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:9090");
    }

    #[test]
    fn bad_port() {
        let err = Config::from_lookup(|key| (key == "CATALOG_PORT").then(|| "http".to_string())).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "CATALOG_PORT",
                value: "http".to_string()
            }
        );
    }
}
