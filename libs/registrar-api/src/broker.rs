use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Lifecycle of the outbound broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected => f.write_str("connected"),
        }
    }
}

/// Producer side of a message broker.
///
/// `connect` may be called repeatedly until it succeeds. `publish` before a
/// successful `connect` returns an error of kind `NotConnected`.
pub trait BrokerClient: Send + Sync {
    fn connect(&self) -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>;

    /// Send one message, unkeyed, to `topic`.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>;
}
