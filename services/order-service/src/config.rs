//! Configuration management for the order service.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Values that are present but unparseable are errors rather than silently
//! replaced by defaults.

use bookbazaar_core::topics;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Invalid configuration value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        /// Environment variable name
        key: &'static str,
        /// Offending value
        value: String,
        /// What was expected
        reason: String,
    },
}

/// Which event log implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLogBackend {
    /// In-process log; records are lost on restart. For local runs and demos.
    Memory,
    /// Redpanda/Kafka via rdkafka.
    Redpanda,
}

impl FromStr for EventLogBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redpanda" | "kafka" => Ok(Self::Redpanda),
            other => Err(format!("expected 'memory' or 'redpanda', got '{other}'")),
        }
    }
}

impl fmt::Display for EventLogBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Redpanda => "redpanda",
        })
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Event log configuration
    pub event_log: EventLogConfig,
    /// Order topic and consumer configuration
    pub orders: OrdersConfig,
    /// Expose Prometheus metrics on `GET /metrics`
    pub metrics_enabled: bool,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// How long to wait for consumers to stop on shutdown
    pub shutdown_timeout: Duration,
}

/// Event log configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLogConfig {
    /// Backend implementation
    pub backend: EventLogBackend,
    /// Broker addresses (comma-separated), for the Redpanda backend
    pub brokers: String,
    /// How long a publish waits for the broker's acknowledgement
    pub publish_timeout: Duration,
}

/// Order topic and consumer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrdersConfig {
    /// Topic carrying `OrderPlaced` envelopes
    pub topic: String,
    /// Consumer group of the order consumer
    pub consumer_group: String,
    /// Dead-letter topic; `None` when disabled
    pub dead_letter_topic: Option<String>,
    /// Local retries of a failing handler before dead-lettering
    pub max_retries: usize,
    /// Delay before the first local retry
    pub retry_delay: Duration,
    /// Delay before resubscribing after a broker failure
    pub reconnect_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8081,
                shutdown_timeout: Duration::from_secs(10),
            },
            event_log: EventLogConfig {
                backend: EventLogBackend::Memory,
                brokers: "localhost:9092".to_string(),
                publish_timeout: Duration::from_millis(5000),
            },
            orders: OrdersConfig {
                topic: topics::ORDER_PLACED.to_string(),
                consumer_group: topics::ORDER_SERVICE_GROUP.to_string(),
                dead_letter_topic: Some(topics::ORDER_PLACED_DLQ.to_string()),
                max_retries: 3,
                retry_delay: Duration::from_millis(100),
                reconnect_delay: Duration::from_millis(5000),
            },
            metrics_enabled: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set to an unparseable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let vars = Vars(&lookup);

        let topic = vars.string("ORDER_TOPIC", &defaults.orders.topic);
        // An explicitly empty dead-letter topic disables dead-lettering.
        let dead_letter_topic = match lookup("ORDER_DLQ_TOPIC") {
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(value),
            None => Some(format!("{topic}.dlq")),
        };

        Ok(Self {
            server: ServerConfig {
                host: vars.string("SERVER_HOST", &defaults.server.host),
                port: vars.parse("SERVER_PORT", defaults.server.port)?,
                shutdown_timeout: Duration::from_secs(vars.parse("SHUTDOWN_TIMEOUT_SECS", 10)?),
            },
            event_log: EventLogConfig {
                backend: vars.parse("EVENT_LOG_BACKEND", defaults.event_log.backend)?,
                brokers: vars.string("REDPANDA_BROKERS", &defaults.event_log.brokers),
                publish_timeout: Duration::from_millis(vars.parse("PUBLISH_TIMEOUT_MS", 5000)?),
            },
            orders: OrdersConfig {
                consumer_group: vars.string("ORDER_CONSUMER_GROUP", &defaults.orders.consumer_group),
                topic,
                dead_letter_topic,
                max_retries: vars.parse("CONSUMER_MAX_RETRIES", defaults.orders.max_retries)?,
                retry_delay: Duration::from_millis(vars.parse("CONSUMER_RETRY_DELAY_MS", 100)?),
                reconnect_delay: Duration::from_millis(vars.parse("CONSUMER_RECONNECT_DELAY_MS", 5000)?),
            },
            metrics_enabled: vars.parse("METRICS_ENABLED", defaults.metrics_enabled)?,
        })
    }

    /// Address the HTTP server binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

struct Vars<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn string(&self, key: &str, default: &str) -> String {
        (self.0)(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match (self.0)(key) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(load(&[]).unwrap(), Config::default());
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "0.0.0.0:8081");
        assert_eq!(config.orders.topic, "order.placed");
        assert_eq!(config.orders.consumer_group, "order-service");
        assert_eq!(config.orders.dead_letter_topic.as_deref(), Some("order.placed.dlq"));
        assert_eq!(config.event_log.publish_timeout, Duration::from_secs(5));
    }

    #[test]
    fn variables_override_defaults() {
        let config = load(&[
            ("SERVER_PORT", "9000"),
            ("EVENT_LOG_BACKEND", "redpanda"),
            ("REDPANDA_BROKERS", "broker-1:9092,broker-2:9092"),
            ("ORDER_TOPIC", "orders.v2"),
            ("PUBLISH_TIMEOUT_MS", "250"),
            ("CONSUMER_MAX_RETRIES", "7"),
            ("METRICS_ENABLED", "false"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.event_log.backend, EventLogBackend::Redpanda);
        assert_eq!(config.event_log.brokers, "broker-1:9092,broker-2:9092");
        assert_eq!(config.orders.topic, "orders.v2");
        assert_eq!(config.orders.dead_letter_topic.as_deref(), Some("orders.v2.dlq"));
        assert_eq!(config.event_log.publish_timeout, Duration::from_millis(250));
        assert_eq!(config.orders.max_retries, 7);
        assert!(!config.metrics_enabled);
    }

    #[test]
    fn empty_dead_letter_topic_disables_it() {
        let config = load(&[("ORDER_DLQ_TOPIC", "")]).unwrap();
        assert_eq!(config.orders.dead_letter_topic, None);
    }

    #[test]
    fn unknown_backend_is_an_error() {
        let err = load(&[("EVENT_LOG_BACKEND", "carrier-pigeon")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "EVENT_LOG_BACKEND", .. }));
    }

    #[test]
    fn unparseable_number_is_an_error() {
        let err = load(&[("SERVER_PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SERVER_PORT", .. }));
    }
}
