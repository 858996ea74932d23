pub mod broker;
pub mod error;
pub mod record;
pub mod retry;
pub mod store;

pub use broker::{BrokerClient, ConnectionState};
pub use error::{ClientError, ErrorKind};
pub use record::{Entrant, Registration, StoredRecord};
pub use retry::RetryPolicy;
pub use store::RecordStore;
