//! Apache Kafka integration over the pure-Rust `rskafka` client.
//!
//! - [`KafkaBroker`]: the producer side, implements `BrokerClient`.
//! - [`KafkaConsumer`]: reads one topic partition and hands payloads to a callback.
//!
//! Messages go to partition 0 of the topic, unkeyed and uncompressed.

mod consumer;
mod producer;

use std::time::Duration;

pub use consumer::KafkaConsumer;
pub use producer::KafkaBroker;

pub const DEFAULT_BROKERS: &str = "kafka:9092";
pub const DEFAULT_TOPIC: &str = "torneo";

/// Connection settings shared by producer and consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    /// Upper bound for one connect attempt (client build + topic metadata).
    pub connect_timeout: Duration,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: parse_brokers(DEFAULT_BROKERS),
            topic: DEFAULT_TOPIC.to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl KafkaConfig {
    pub fn new(brokers: &str, topic: impl Into<String>) -> Self {
        Self {
            brokers: parse_brokers(brokers),
            topic: topic.into(),
            ..Self::default()
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Split a comma-separated broker list, dropping blanks.
pub fn parse_brokers(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_list_is_trimmed() {
        assert_eq!(
            parse_brokers(" kafka-1:9092, kafka-2:9092 ,,"),
            vec!["kafka-1:9092".to_string(), "kafka-2:9092".to_string()]
        );
    }

    #[test]
    fn default_brokers_and_topic() {
        let cfg = KafkaConfig::default();
        assert_eq!(cfg.brokers, vec!["kafka:9092".to_string()]);
        assert_eq!(cfg.topic, "torneo");
    }
}
