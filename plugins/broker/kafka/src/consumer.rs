use std::time::Duration;

use rskafka::client::ClientBuilder;
use rskafka::client::error::{Error as KafkaError, ProtocolError};
use rskafka::client::partition::{OffsetAt, PartitionClient, UnknownTopicHandling};
use rskafka::record::RecordAndOffset;
use tokio_util::sync::CancellationToken;

use registrar_api::{ClientError, RetryPolicy};

use crate::KafkaConfig;

/// Bytes range requested per fetch.
const FETCH_BYTES: std::ops::Range<i32> = 1..1_048_576;
/// How long the broker may hold a fetch open waiting for data.
const FETCH_MAX_WAIT_MS: i32 = 500;

/// Reads partition 0 of one topic from the earliest retained offset.
pub struct KafkaConsumer {
    topic: String,
    partition: PartitionClient,
}

impl KafkaConsumer {
    /// Build the client and resolve the topic, each bounded by
    /// `config.connect_timeout`.
    pub async fn connect(config: &KafkaConfig) -> Result<Self, ClientError> {
        let client = tokio::time::timeout(
            config.connect_timeout,
            ClientBuilder::new(config.brokers.clone()).build(),
        )
        .await
        .map_err(|_| ClientError::io("kafka connect timed out"))?
        .map_err(|e| ClientError::io(format!("kafka connect: {e}")))?;

        let partition = tokio::time::timeout(
            config.connect_timeout,
            client.partition_client(config.topic.clone(), 0, UnknownTopicHandling::Retry),
        )
        .await
        .map_err(|_| ClientError::io(format!("topic '{}': metadata timed out", config.topic)))?
        .map_err(|e| ClientError::io(format!("topic '{}': {e}", config.topic)))?;

        Ok(Self {
            topic: config.topic.clone(),
            partition,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Fetch until `shutdown` fires, calling `on_payload(offset, bytes)` for
    /// every record in broker-delivered order.
    ///
    /// Fetch errors are retried forever; consecutive failures back off per
    /// `backoff` (its `max_attempts` is ignored). An offset that is no longer
    /// retained (segment deleted, topic recreated) is re-resolved to the
    /// earliest offset. Records without a value are skipped.
    pub async fn run<F>(
        &self,
        backoff: RetryPolicy,
        shutdown: CancellationToken,
        mut on_payload: F,
    ) -> Result<(), ClientError>
    where
        F: FnMut(i64, &[u8]),
    {
        let mut offset = self.earliest().await?;
        tracing::info!(topic = %self.topic, offset, "consuming from earliest offset");

        let mut failures: u32 = 0;
        loop {
            let fetched = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                r = self.partition.fetch_records(offset, FETCH_BYTES, FETCH_MAX_WAIT_MS) => r,
            };

            let err = match fetched {
                Ok((records, _high_watermark)) => {
                    failures = 0;
                    offset = deliver(&records, offset, &mut on_payload);
                    continue;
                }
                Err(e) => e,
            };

            failures = failures.saturating_add(1);
            match recovery(is_offset_out_of_range(&err), failures, &backoff) {
                Recovery::Rewind { after } => {
                    if sleep_or_cancel(after, &shutdown).await {
                        return Ok(());
                    }
                    match self.earliest().await {
                        Ok(earliest) => {
                            tracing::warn!(topic = %self.topic, from = offset, to = earliest, "offset out of range, rewinding");
                            offset = earliest;
                        }
                        Err(e) => tracing::warn!(topic = %self.topic, error = %e, "rewind failed"),
                    }
                }
                Recovery::Retry { after } => {
                    tracing::warn!(
                        topic = %self.topic,
                        error = %err,
                        retry_in_ms = after.as_millis() as u64,
                        "fetch failed"
                    );
                    if sleep_or_cancel(after, &shutdown).await {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn earliest(&self) -> Result<i64, ClientError> {
        self.partition
            .get_offset(OffsetAt::Earliest)
            .await
            .map_err(|e| ClientError::io(format!("earliest offset: {e}")))
    }
}

/// Next step after a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    /// Re-resolve the earliest offset after waiting `after`.
    Rewind { after: Duration },
    /// Fetch the same offset again after waiting `after`.
    Retry { after: Duration },
}

/// `failures` counts consecutive failed fetches, including this one.
///
/// A first out-of-range error rewinds at once; repeated ones are paced like
/// any other error so a misbehaving broker cannot cause a hot loop.
fn recovery(out_of_range: bool, failures: u32, backoff: &RetryPolicy) -> Recovery {
    if out_of_range {
        let after = match failures {
            0 | 1 => Duration::ZERO,
            n => backoff.delay_for(n - 1),
        };
        Recovery::Rewind { after }
    } else {
        Recovery::Retry { after: backoff.delay_for(failures) }
    }
}

fn is_offset_out_of_range(err: &KafkaError) -> bool {
    matches!(
        err,
        KafkaError::ServerError { protocol_error: ProtocolError::OffsetOutOfRange, .. }
    )
}

/// Hand every valued record at or past `offset` to `on_payload` and return
/// the offset to fetch next.
fn deliver<F>(records: &[RecordAndOffset], mut offset: i64, on_payload: &mut F) -> i64
where
    F: FnMut(i64, &[u8]),
{
    for r in records {
        if r.offset < offset {
            continue;
        }
        if let Some(value) = &r.record.value {
            on_payload(r.offset, value);
        }
        offset = r.offset + 1;
    }
    offset
}

/// Returns true when cancelled before `wait` elapsed.
async fn sleep_or_cancel(wait: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => true,
        _ = tokio::time::sleep(wait) => false,
    }
}
