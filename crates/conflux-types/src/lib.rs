//! Shared types for the Conflux execution engine.

pub mod result;
pub mod task;

pub use result::{ExecutionRequest, ExecutionResult, ResultMetadata, ResultStatus};
pub use task::{Task, TaskStatus};

/// Identifier type used throughout the system.
pub type Id = uuid::Uuid;

/// Timestamp type used throughout the system.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a new random identifier.
pub fn new_id() -> Id {
    uuid::Uuid::new_v4()
}

/// Current UTC time.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}
