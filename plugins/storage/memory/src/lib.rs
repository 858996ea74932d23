use std::future::Future;
use std::pin::Pin;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use registrar_api::{ClientError, RecordStore, Registration, StoredRecord};

// ═══════════════════════════════════════════════════════════════
//  MemoryStore
// ═══════════════════════════════════════════════════════════════

/// In-process record store. Nothing survives a restart; used for
/// development (`store = "memory"`) and tests.
///
/// Records are kept in insertion order, which is the order `query_all`
/// returns them in.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<StoredRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn init(&self) -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>> {
        Box::pin(async {
            tracing::warn!("using in-memory record store, registrations are not durable");
            Ok(())
        })
    }

    fn insert(
        &self,
        registration: Registration,
    ) -> Pin<Box<dyn Future<Output = Result<StoredRecord, ClientError>> + Send + '_>> {
        Box::pin(async move {
            let now = Utc::now();
            let record = StoredRecord {
                id: Uuid::new_v4(),
                registration,
                created_at: now,
                updated_at: now,
            };
            self.records.write().await.push(record.clone());
            Ok(record)
        })
    }

    fn query_all(&self) -> Pin<Box<dyn Future<Output = Result<Vec<StoredRecord>, ClientError>> + Send + '_>> {
        Box::pin(async move { Ok(self.records.read().await.clone()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_assigns_identity_and_timestamps() {
        let store = MemoryStore::new();
        let stored = store
            .insert(Registration::new("Summer Cup").with_year(2024))
            .await
            .unwrap();

        assert_eq!(stored.registration.name, "Summer Cup");
        assert_eq!(stored.created_at, stored.updated_at);
        assert_eq!(store.query_all().await.unwrap(), vec![stored.clone()]);
    }

    #[tokio::test]
    async fn identical_inserts_create_distinct_records() {
        let store = MemoryStore::new();
        let reg = Registration::new("Winter Open").with_kind("judo");
        let a = store.insert(reg.clone()).await.unwrap();
        let b = store.insert(reg).await.unwrap();

        assert_ne!(a.id, b.id);
        let all = store.query_all().await.unwrap();
        assert_eq!(all, vec![a, b]);
    }
}
