use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use registrar_api::{ConnectionState, RecordStore, Registration, StoredRecord};

use crate::error::{EngineError, PublishFailure};
use crate::publisher::ConnectionManager;

/// Result of a successful `register`.
///
/// `announced` is informational: the registration succeeded either way.
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    pub stored: StoredRecord,
    pub announced: bool,
}

/// Out-of-band hook for announcements that were dropped.
pub trait AnnouncementObserver: Send + Sync {
    fn announcement_failed(&self, record: &StoredRecord, failure: &PublishFailure);
}

/// Counters since process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorStats {
    pub stored: u64,
    pub announced: u64,
    pub announce_failures: u64,
}

#[derive(Default)]
struct Counters {
    stored: AtomicU64,
    announced: AtomicU64,
    announce_failures: AtomicU64,
}

// ═══════════════════════════════════════════════════════════════
//  Coordinator
// ═══════════════════════════════════════════════════════════════

/// Sequences the durable write and the best-effort announcement of each
/// registration.
///
/// The store is the authority: a record that was not stored is never
/// announced, and an announcement that fails never undoes or fails the
/// write. Announcements are attempted at most once and are not retried,
/// so a stored record may go unannounced.
///
/// Publish policy: the announcement is attempted only while the connection
/// manager reports `Connected`; in any other state it is dropped as
/// `PublishFailure::NotConnected` without touching the broker client.
pub struct Coordinator {
    store: Arc<dyn RecordStore>,
    publisher: Arc<ConnectionManager>,
    topic: String,
    counters: Counters,
    observer: Option<Arc<dyn AnnouncementObserver>>,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        publisher: Arc<ConnectionManager>,
        topic: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(EngineError::Config("announcement topic must not be empty".into()));
        }
        Ok(Self {
            store,
            publisher,
            topic,
            counters: Counters::default(),
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn AnnouncementObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn broker_state(&self) -> ConnectionState {
        self.publisher.state()
    }

    /// Store `registration`, then offer it for announcement exactly once.
    ///
    /// Not idempotent: identical input yields distinct records. Fails only
    /// with `EngineError::Store`, in which case nothing was published.
    pub async fn register(&self, registration: Registration) -> Result<RegistrationOutcome, EngineError> {
        let stored = self
            .store
            .insert(registration)
            .await
            .map_err(EngineError::Store)?;
        self.counters.stored.fetch_add(1, Ordering::Relaxed);
        tracing::info!(id = %stored.id, name = %stored.registration.name, "registration stored");

        let announced = match self.announce(&stored).await {
            Ok(()) => {
                self.counters.announced.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(id = %stored.id, topic = %self.topic, "registration announced");
                true
            }
            Err(failure) => {
                self.counters.announce_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    id = %stored.id,
                    topic = %self.topic,
                    error = %failure,
                    "announcement dropped, registration remains stored"
                );
                if let Some(observer) = &self.observer {
                    observer.announcement_failed(&stored, &failure);
                }
                false
            }
        };

        Ok(RegistrationOutcome { stored, announced })
    }

    /// Every stored record, verbatim and in store order.
    pub async fn list(&self) -> Result<Vec<StoredRecord>, EngineError> {
        self.store.query_all().await.map_err(EngineError::Store)
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            stored: self.counters.stored.load(Ordering::Relaxed),
            announced: self.counters.announced.load(Ordering::Relaxed),
            announce_failures: self.counters.announce_failures.load(Ordering::Relaxed),
        }
    }

    async fn announce(&self, record: &StoredRecord) -> Result<(), PublishFailure> {
        let state = self.publisher.state();
        if state != ConnectionState::Connected {
            return Err(PublishFailure::NotConnected(state));
        }
        let payload = record
            .to_payload()
            .map_err(|e| PublishFailure::Serialize(e.to_string()))?;
        self.publisher
            .client()
            .publish(&self.topic, payload)
            .await
            .map_err(PublishFailure::Broker)
    }
}
