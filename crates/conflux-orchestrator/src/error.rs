//! Error types for the orchestrator.

use thiserror::Error;

use conflux_pipeline::PipelineError;
use conflux_registry::RegistryError;

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors surfaced by the orchestrator's typed API.
///
/// The [`crate::Orchestrator::handle`] boundary converts all of these
/// into `Error`-status results; they only escape through the direct
/// `ask`/`process`/`create`/`analyze` methods.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Intent confidence fell below the configured threshold.
    #[error("Ambiguous intent: confidence {confidence:.2} below threshold {threshold:.2}")]
    AmbiguousIntent { confidence: f64, threshold: f64 },

    /// No route is registered for the inferred intent.
    #[error("No route for intent '{0}'")]
    NoRoute(String),

    /// The request named a task the orchestrator does not expose.
    #[error("Unsupported task: {0}")]
    UnsupportedTask(String),

    /// The routed pipeline failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The provider/registry layer failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
