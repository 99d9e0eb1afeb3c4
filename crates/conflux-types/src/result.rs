//! Request and result envelopes exchanged with external collaborators.
//!
//! The CLI or API layer in front of the engine speaks these two types and
//! nothing else: it submits an [`ExecutionRequest`] and gets back an
//! [`ExecutionResult`] whose `status` maps 1:1 to its own exit codes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request submitted by an external collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Task selector (e.g. "ask", "process", "create", "analyze").
    pub task: String,
    /// Primary input payload.
    pub input: Value,
    /// Optional per-request options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Map<String, Value>>,
    /// Optional provider/pipeline configuration overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Map<String, Value>>,
}

impl ExecutionRequest {
    /// Create a request with just a task selector and input.
    pub fn new(task: impl Into<String>, input: Value) -> Self {
        Self {
            task: task.into(),
            input,
            options: None,
            config: None,
        }
    }
}

/// Outcome status of an execution, as seen by the external boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Error,
}

/// Execution metadata attached to every result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Wall-clock execution time in milliseconds.
    pub execution_time_ms: u64,
    /// Number of stages that ran (successfully or not).
    pub stages_run: usize,
    /// Whether the result was served from the orchestrator cache.
    pub cache_hit: bool,
}

/// The structured result returned to external collaborators.
///
/// Errors never escape the engine as raw panics or error types; they are
/// converted into an `Error`-status result here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: ResultMetadata,
}

impl ExecutionResult {
    /// Build a success result.
    pub fn success(result: Value, metadata: ResultMetadata) -> Self {
        Self {
            status: ResultStatus::Success,
            result: Some(result),
            error: None,
            metadata,
        }
    }

    /// Build an error result.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Error,
            result: None,
            error: Some(message.into()),
            metadata: ResultMetadata::default(),
        }
    }

    /// Whether the execution succeeded.
    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_result() {
        let meta = ResultMetadata {
            execution_time_ms: 12,
            stages_run: 3,
            cache_hit: false,
        };
        let result = ExecutionResult::success(json!("11"), meta);
        assert!(result.is_success());
        assert_eq!(result.result, Some(json!("11")));
        assert!(result.error.is_none());
        assert_eq!(result.metadata.stages_run, 3);
    }

    #[test]
    fn test_error_result() {
        let result = ExecutionResult::error("Unsupported task: frobnicate");
        assert!(!result.is_success());
        assert_eq!(
            result.error.as_deref(),
            Some("Unsupported task: frobnicate")
        );
        assert!(result.result.is_none());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let result = ExecutionResult::error("boom");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], json!("error"));
    }

    #[test]
    fn test_request_roundtrip() {
        let request = ExecutionRequest::new("ask", json!("what is conflux?"));
        let serialized = serde_json::to_string(&request).unwrap();
        let parsed: ExecutionRequest = serde_json::from_str(&serialized).unwrap();
        assert_eq!(parsed.task, "ask");
        assert_eq!(parsed.input, json!("what is conflux?"));
        assert!(parsed.options.is_none());
    }
}
