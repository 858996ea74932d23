use registrar_api::{ClientError, ConnectionState};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The durable write did not happen. The only failure `register` reports.
    #[error("{0}")]
    Store(ClientError),

    #[error("connection manager already started")]
    AlreadyStarted,

    #[error("config error: {0}")]
    Config(String),
}

/// Why an announcement did not reach the broker.
///
/// Produced by the coordinator's publish step and discarded there after
/// logging; it never reaches a caller of `register`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PublishFailure {
    #[error("broker is {0}, announcement skipped")]
    NotConnected(ConnectionState),

    #[error("serialize record: {0}")]
    Serialize(String),

    #[error("publish: {0}")]
    Broker(ClientError),
}
