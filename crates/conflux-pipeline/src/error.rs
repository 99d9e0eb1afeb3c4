//! Error types for the pipeline engine.

use thiserror::Error;

use conflux_registry::RegistryError;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur during pipeline and workflow execution.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A workflow definition failed validation.
    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    /// A single stage failed.
    #[error("Stage '{stage}' failed: {message}")]
    Stage { stage: String, message: String },

    /// A pipeline run failed at a specific stage. The caller retains the
    /// partial context for diagnosis.
    #[error("Pipeline '{pipeline}' failed at stage '{stage}': {message}")]
    Execution {
        pipeline: String,
        stage: String,
        message: String,
    },

    /// A template expression in step parameters could not be resolved.
    #[error("Template error: {0}")]
    Template(String),

    /// The run exceeded its deadline.
    #[error("Execution timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The run was cancelled.
    #[error("Execution cancelled")]
    Cancelled,

    /// An error from the provider/registry layer.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl PipelineError {
    /// Create a stage failure.
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Whether this error should stop a run even under a
    /// continue-on-error policy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Cancelled)
    }
}
