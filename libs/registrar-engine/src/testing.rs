//! Substitutable collaborators for exercising the engine without a broker
//! or a database.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::time::Instant;

use registrar_api::{BrokerClient, ClientError, RecordStore, Registration, StoredRecord};
use registrar_storage_memory::MemoryStore;

// ═══════════════════════════════════════════════════════════════
//  ScriptedBroker
// ═══════════════════════════════════════════════════════════════

/// Broker client whose behaviour is scripted by the test.
///
/// Fails the first `n` connects, then succeeds. Publishes succeed once
/// connected unless `fail_publishes(true)`. Every call is recorded.
pub struct ScriptedBroker {
    connect_failures_left: AtomicU32,
    connected: AtomicBool,
    fail_publish: AtomicBool,
    connect_instants: Mutex<Vec<Instant>>,
    publish_attempts: AtomicUsize,
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

impl Default for ScriptedBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBroker {
    /// Connects on the first attempt.
    pub fn new() -> Self {
        Self::failing_connects(0)
    }

    pub fn failing_connects(n: u32) -> Self {
        Self {
            connect_failures_left: AtomicU32::new(n),
            connected: AtomicBool::new(false),
            fail_publish: AtomicBool::new(false),
            connect_instants: Mutex::new(Vec::new()),
            publish_attempts: AtomicUsize::new(0),
            published: Mutex::new(Vec::new()),
        }
    }

    /// Never connects.
    pub fn unreachable() -> Self {
        Self::failing_connects(u32::MAX)
    }

    pub fn fail_publishes(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> usize {
        lock(&self.connect_instants).len()
    }

    /// Runtime clock reading at each `connect()` call.
    pub fn connect_instants(&self) -> Vec<Instant> {
        lock(&self.connect_instants).clone()
    }

    pub fn publish_attempts(&self) -> usize {
        self.publish_attempts.load(Ordering::SeqCst)
    }

    /// Successfully published `(topic, payload)` pairs, in publish order.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        lock(&self.published).clone()
    }
}

impl BrokerClient for ScriptedBroker {
    fn connect(&self) -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>> {
        Box::pin(async move {
            lock(&self.connect_instants).push(Instant::now());
            let left = self.connect_failures_left.load(Ordering::SeqCst);
            if left > 0 {
                if left != u32::MAX {
                    self.connect_failures_left.store(left - 1, Ordering::SeqCst);
                }
                return Err(ClientError::io("connection refused"));
            }
            self.connected.store(true, Ordering::SeqCst);
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
            self.publish_attempts.fetch_add(1, Ordering::SeqCst);
            if !self.connected.load(Ordering::SeqCst) {
                return Err(ClientError::not_connected("scripted broker is not connected"));
            }
            if self.fail_publish.load(Ordering::SeqCst) {
                return Err(ClientError::io("leader not available"));
            }
            lock(&self.published).push((topic, payload));
            Ok(())
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  FlakyStore
// ═══════════════════════════════════════════════════════════════

/// In-memory store whose inserts and reads can be switched to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_inserts: AtomicBool,
    fail_reads: AtomicBool,
    insert_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }
}

impl RecordStore for FlakyStore {
    fn init(&self) -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }

    fn insert(
        &self,
        registration: Registration,
    ) -> Pin<Box<dyn Future<Output = Result<StoredRecord, ClientError>> + Send + '_>> {
        Box::pin(async move {
            self.insert_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_inserts.load(Ordering::SeqCst) {
                return Err(ClientError::io("store unavailable"));
            }
            self.inner.insert(registration).await
        })
    }

    fn query_all(&self) -> Pin<Box<dyn Future<Output = Result<Vec<StoredRecord>, ClientError>> + Send + '_>> {
        Box::pin(async move {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(ClientError::io("store unavailable"));
            }
            self.inner.query_all().await
        })
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}
