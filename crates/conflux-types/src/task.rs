//! Task bookkeeping for long-running executions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{new_id, now, Id, Timestamp};

/// A tracked unit of work submitted to the engine.
///
/// Status transitions are strictly monotonic:
/// `Pending → Processing → {Completed | Failed}`. There is no way back to
/// `Pending`, and a finished task cannot be restarted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Id,
    /// What the caller asked for, in their own words.
    pub objective: String,
    /// Free-form parameters attached to the request.
    #[serde(default)]
    pub parameters: serde_json::Map<String, Value>,
    pub status: TaskStatus,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    /// Create a new pending task.
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            objective: objective.into(),
            parameters: serde_json::Map::new(),
            status: TaskStatus::Pending,
            created_at: now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// Attach a parameter to a pending task.
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Mark the task as processing. No-op unless the task is pending.
    pub fn start(&mut self) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::Processing;
            self.started_at = Some(now());
        }
    }

    /// Mark the task as completed with a result. No-op if already finished.
    pub fn complete(&mut self, result: Value) {
        if !self.status.is_terminal() {
            self.status = TaskStatus::Completed;
            self.completed_at = Some(now());
            self.result = Some(result);
        }
    }

    /// Mark the task as failed with an error. No-op if already finished.
    pub fn fail(&mut self, error: impl Into<String>) {
        if !self.status.is_terminal() {
            self.status = TaskStatus::Failed;
            self.completed_at = Some(now());
            self.error = Some(error.into());
        }
    }
}

/// Status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Whether this status is terminal (no further transitions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}
