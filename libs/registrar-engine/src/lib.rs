pub mod coordinator;
pub mod error;
pub mod publisher;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use coordinator::{AnnouncementObserver, Coordinator, CoordinatorStats, RegistrationOutcome};
pub use error::{EngineError, PublishFailure};
pub use publisher::ConnectionManager;
