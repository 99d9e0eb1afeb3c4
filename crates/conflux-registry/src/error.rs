//! Error types for the registry and provider factory.

use thiserror::Error;

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur in the registry, plugin, and factory layers.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A key is already registered and overwrite was not requested.
    #[error("Duplicate key '{key}' in registry '{scope}'")]
    Duplicate { scope: String, key: String },

    /// Lookup failed.
    #[error("Not found: '{key}' in registry '{scope}'")]
    NotFound { scope: String, key: String },

    /// A plugin manifest could not be parsed.
    #[error("Manifest parse error: {0}")]
    ManifestParse(String),

    /// A manifest field failed validation.
    #[error("Invalid manifest field '{field}': {message}")]
    Validation { field: String, message: String },

    /// A runtime configuration failed schema validation.
    #[error("Config validation failed: {0}")]
    ConfigValidation(String),

    /// A provider failed to initialize. The instance is never cached.
    #[error("Provider '{provider}' failed to initialize: {message}")]
    ProviderInit { provider: String, message: String },

    /// A provider failed during execution.
    #[error("Provider '{provider}' execution failed: {message}")]
    ProviderExecution { provider: String, message: String },

    /// A provider call exceeded its deadline.
    #[error("Provider '{provider}' timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RegistryError {
    /// Create an execution error for a provider.
    pub fn execution(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderExecution {
            provider: provider.into(),
            message: message.into(),
        }
    }
}
