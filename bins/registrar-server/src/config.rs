use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use registrar_api::RetryPolicy;
use registrar_broker_kafka::{DEFAULT_BROKERS, DEFAULT_TOPIC};

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "registrar-server", about = "Tournament registration service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP gateway and the broker connection manager
    Serve(ServeArgs),
}

/// Flags override environment variables, which override the TOML file.
#[derive(Args, Clone, Debug, Default)]
pub struct ServeArgs {
    /// Path to an optional TOML config file
    #[arg(long, env = "REGISTRAR_CONFIG")]
    pub config: Option<String>,

    /// HTTP listen port
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Comma-separated Kafka bootstrap brokers
    #[arg(long, env = "KAFKA_BROKERS")]
    pub brokers: Option<String>,

    /// Announcement topic
    #[arg(long, env = "TOPIC")]
    pub topic: Option<String>,

    /// Record store backend
    #[arg(long, env = "STORE", value_enum)]
    pub store: Option<StoreKind>,

    /// Connection string for the postgres store
    #[arg(long, env = "STORE_URI")]
    pub store_uri: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Postgres,
    Memory,
}

// ---- TOML Config ----

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub port: u16,
    pub brokers: String,
    pub topic: String,
    pub store: StoreKind,
    pub store_uri: String,
    pub publisher: PublisherConfig,
}

/// `[publisher]`: connection retry schedule and per-attempt timeout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublisherConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            brokers: DEFAULT_BROKERS.to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            store: StoreKind::Postgres,
            store_uri: "postgres://localhost:5432/tournament_designer".to_string(),
            publisher: PublisherConfig::default(),
        }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            connect_timeout_ms: 10_000,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|e| ServerError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// File (if any) first, then every flag or variable that was set.
    pub fn resolve(args: &ServeArgs) -> Result<Self, ServerError> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(args);
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, args: &ServeArgs) {
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(brokers) = &args.brokers {
            self.brokers = brokers.clone();
        }
        if let Some(topic) = &args.topic {
            self.topic = topic.clone();
        }
        if let Some(store) = args.store {
            self.store = store;
        }
        if let Some(uri) = &args.store_uri {
            self.store_uri = uri.clone();
        }
    }

    fn validate(&self) -> Result<(), ServerError> {
        let invalid = |detail: &str| ServerError::Config { context: "validate", detail: detail.to_string() };
        if self.topic.trim().is_empty() {
            return Err(invalid("topic must not be empty"));
        }
        if registrar_broker_kafka::parse_brokers(&self.brokers).is_empty() {
            return Err(invalid("at least one broker is required"));
        }
        if self.store == StoreKind::Postgres && self.store_uri.trim().is_empty() {
            return Err(invalid("store_uri is required for the postgres store"));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.publisher.max_attempts,
            Duration::from_millis(self.publisher.base_delay_ms),
            Duration::from_millis(self.publisher.max_delay_ms),
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.publisher.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn empty_file_means_defaults() {
        let config = ServerConfig::parse("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port, 3000);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn file_values_and_partial_publisher_section() {
        let config = ServerConfig::parse(
            r#"
            port = 8080
            brokers = "k1:9092, k2:9092"
            store = "memory"

            [publisher]
            max_attempts = 3
            base_delay_ms = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.topic, "torneo");
        assert_eq!(
            config.retry_policy(),
            RetryPolicy::new(3, Duration::from_millis(100), Duration::from_millis(5000))
        );
    }

    #[test]
    fn unknown_keys_and_store_kinds_are_rejected() {
        assert!(ServerConfig::parse("prot = 1").is_err());
        assert!(ServerConfig::parse("store = \"mongo\"").is_err());
    }

    #[test]
    fn flags_override_the_file() {
        let mut config = ServerConfig::parse("port = 8080\ntopic = \"cups\"").unwrap();
        config.apply(&ServeArgs {
            port: Some(9000),
            store: Some(StoreKind::Memory),
            ..ServeArgs::default()
        });
        assert_eq!(config.port, 9000);
        assert_eq!(config.topic, "cups");
        assert_eq!(config.store, StoreKind::Memory);
    }

    #[test]
    fn resolve_rejects_blank_topic_and_brokers() {
        let blank_topic = ServeArgs { topic: Some(" ".into()), ..ServeArgs::default() };
        assert!(matches!(
            ServerConfig::resolve(&blank_topic),
            Err(ServerError::Config { context: "validate", .. })
        ));

        let no_brokers = ServeArgs { brokers: Some(" , ".into()), ..ServeArgs::default() };
        assert!(ServerConfig::resolve(&no_brokers).is_err());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let args = ServeArgs { config: Some("/nonexistent/registrar.toml".into()), ..ServeArgs::default() };
        assert!(matches!(
            ServerConfig::resolve(&args),
            Err(ServerError::Config { context: "read", .. })
        ));
    }
}
