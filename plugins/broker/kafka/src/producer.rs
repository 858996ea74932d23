use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use rskafka::client::partition::{Compression, PartitionClient, UnknownTopicHandling};
use rskafka::client::{Client, ClientBuilder};
use rskafka::record::Record;
use tokio::sync::{Mutex, RwLock};

use registrar_api::{BrokerClient, ClientError};

use crate::KafkaConfig;

/// Kafka producer behind the `BrokerClient` seam.
///
/// `connect` builds the client and resolves the configured topic; until it
/// has succeeded every `publish` fails fast with `NotConnected`. Partition
/// clients are cached per topic.
pub struct KafkaBroker {
    config: KafkaConfig,
    client: RwLock<Option<Arc<Client>>>,
    partitions: Mutex<HashMap<String, Arc<PartitionClient>>>,
}

impl KafkaBroker {
    pub fn new(config: KafkaConfig) -> Self {
        Self {
            config,
            client: RwLock::new(None),
            partitions: Mutex::new(HashMap::new()),
        }
    }

    async fn partition(&self, client: &Client, topic: &str) -> Result<Arc<PartitionClient>, ClientError> {
        let mut partitions = self.partitions.lock().await;
        if let Some(pc) = partitions.get(topic) {
            return Ok(pc.clone());
        }

        let pc = tokio::time::timeout(
            self.config.connect_timeout,
            client.partition_client(topic, 0, UnknownTopicHandling::Retry),
        )
        .await
        .map_err(|_| ClientError::io(format!("topic '{topic}': metadata timed out")))?
        .map_err(|e| ClientError::io(format!("topic '{topic}': {e}")))?;

        let pc = Arc::new(pc);
        partitions.insert(topic.to_string(), pc.clone());
        Ok(pc)
    }
}

impl BrokerClient for KafkaBroker {
    fn connect(&self) -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>> {
        Box::pin(async move {
            if self.client.read().await.is_some() {
                return Ok(());
            }

            let client = tokio::time::timeout(
                self.config.connect_timeout,
                ClientBuilder::new(self.config.brokers.clone()).build(),
            )
            .await
            .map_err(|_| ClientError::io("kafka connect timed out"))?
            .map_err(|e| ClientError::io(format!("kafka connect: {e}")))?;

            // Resolve the topic now so the first publish doesn't pay for it.
            self.partition(&client, &self.config.topic).await?;

            *self.client.write().await = Some(Arc::new(client));
            tracing::debug!(brokers = ?self.config.brokers, topic = %self.config.topic, "kafka client ready");
            Ok(())
        })
    }

    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>> {
        let topic = topic.to_string();
        Box::pin(async move {
            let client = self
                .client
                .read()
                .await
                .clone()
                .ok_or_else(|| ClientError::not_connected("kafka producer is not connected"))?;

            let pc = self.partition(&client, &topic).await?;
            let record = Record {
                key: None,
                value: Some(payload),
                headers: BTreeMap::new(),
                timestamp: Utc::now(),
            };

            let offsets = pc
                .produce(vec![record], Compression::NoCompression)
                .await
                .map_err(|e| ClientError::io(format!("produce to '{topic}': {e}")))?;
            tracing::trace!(topic = %topic, offsets = ?offsets, "produced");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registrar_api::ErrorKind;

    #[tokio::test]
    async fn publish_before_connect_fails_fast() {
        let broker = KafkaBroker::new(KafkaConfig::new("localhost:1", "torneo"));
        let err = broker.publish("torneo", b"{}".to_vec()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotConnected);
    }
}
