use std::future::Future;
use std::pin::Pin;

use crate::error::ClientError;
use crate::record::{Registration, StoredRecord};

/// Durable store of record for registrations.
///
/// The engine doesn't know concrete implementations; for the engine a
/// store is just this trait. Implementations must tolerate concurrent
/// calls from a single event loop.
pub trait RecordStore: Send + Sync {
    /// Prepare the store (schema, connectivity). Called once at startup.
    fn init(&self) -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>;

    /// Persist a registration and return it with identity and timestamps.
    fn insert(
        &self,
        registration: Registration,
    ) -> Pin<Box<dyn Future<Output = Result<StoredRecord, ClientError>> + Send + '_>>;

    /// All stored records in store-native order.
    fn query_all(&self) -> Pin<Box<dyn Future<Output = Result<Vec<StoredRecord>, ClientError>> + Send + '_>>;
}
