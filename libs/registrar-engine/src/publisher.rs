use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use registrar_api::{BrokerClient, ConnectionState, RetryPolicy};

use crate::error::EngineError;

/// Owns the lifecycle of the one outbound broker connection.
///
/// The retry loop runs as a background task; nothing on the request path
/// waits for it. Callers read the current state through [`state`] and decide
/// for themselves whether to publish.
///
/// State machine:
/// - `Disconnected` → `Connecting` when the loop starts.
/// - `Connecting` → `Connected` on the first successful `connect()`.
/// - `Connecting` → `Disconnected` once `max_attempts` attempts have failed.
///   This is terminal: the manager never retries on its own again.
///
/// [`state`]: ConnectionManager::state
pub struct ConnectionManager {
    client: Arc<dyn BrokerClient>,
    state_tx: watch::Sender<ConnectionState>,
    attempts: AtomicU32,
    started: AtomicBool,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("attempts", &self.attempts())
            .finish()
    }
}

impl ConnectionManager {
    pub fn new(client: Arc<dyn BrokerClient>) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Arc::new(Self {
            client,
            state_tx,
            attempts: AtomicU32::new(0),
            started: AtomicBool::new(false),
        })
    }

    /// Spawn the connect/retry loop on the current runtime.
    ///
    /// May be called once per manager. The loop also ends, leaving the state
    /// `Disconnected`, when `shutdown` is cancelled before it connects.
    pub fn start(
        self: &Arc<Self>,
        policy: RetryPolicy,
        shutdown: CancellationToken,
    ) -> Result<JoinHandle<()>, EngineError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyStarted);
        }
        let this = self.clone();
        Ok(tokio::spawn(async move { this.run(policy, shutdown).await }))
    }

    /// Current connection state. Never blocks.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Number of `connect()` attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn client(&self) -> &Arc<dyn BrokerClient> {
        &self.client
    }

    fn set_state(&self, state: ConnectionState) {
        let prev = self.state_tx.send_replace(state);
        if prev != state {
            tracing::debug!(from = %prev, to = %state, "broker connection state changed");
        }
    }

    async fn run(&self, policy: RetryPolicy, shutdown: CancellationToken) {
        if policy.max_attempts == 0 {
            tracing::warn!("broker connection disabled (max_attempts = 0)");
            return;
        }

        self.set_state(ConnectionState::Connecting);

        for attempt in 1..=policy.max_attempts {
            self.attempts.store(attempt, Ordering::SeqCst);

            let result = tokio::select! {
                _ = shutdown.cancelled() => {
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
                r = self.client.connect() => r,
            };

            let err = match result {
                Ok(()) => {
                    self.set_state(ConnectionState::Connected);
                    tracing::info!(attempt, "broker producer connected");
                    return;
                }
                Err(e) => e,
            };

            if attempt == policy.max_attempts {
                tracing::warn!(attempt, max_attempts = policy.max_attempts, error = %err, "broker connect failed");
                break;
            }

            let wait = policy.delay_for(attempt);
            tracing::warn!(
                attempt,
                max_attempts = policy.max_attempts,
                retry_in_ms = wait.as_millis() as u64,
                error = %err,
                "broker connect failed, retrying"
            );

            tokio::select! {
                _ = shutdown.cancelled() => {
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }

        self.set_state(ConnectionState::Disconnected);
        tracing::warn!(
            attempts = policy.max_attempts,
            "giving up on the broker; registrations will be stored but not announced"
        );
    }
}
