//! Plugin manifest parsing and validation.
//!
//! A manifest is the declarative descriptor of a provider plugin: one JSON
//! document per provider, conventionally kept in a manifest directory that
//! [`crate::plugins::PluginRegistry::discover`] scans at startup.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RegistryError, Result};
use crate::metadata::ComponentMetadata;
use crate::schema::ConfigSchema;
use crate::validation;

/// An input/expected-output pair used for provider contract testing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestExample {
    pub name: String,
    pub input: Value,
    pub expected_output: Value,
}

/// Declarative descriptor of a provider plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin name (kebab-case, unique within its domain).
    pub name: String,

    /// Semantic version.
    pub version: String,

    /// The domain this provider belongs to (e.g. "llm", "rag", "workflow").
    pub plugin_type: String,

    /// The key the provider is registered under within its domain.
    pub provider_name: String,

    /// Symbolic entry point, resolved against the host's binding table.
    pub entry_point: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Capability tags advertised for discovery and routing.
    #[serde(default)]
    pub capability_tags: Vec<String>,

    /// Typed configuration schema.
    #[serde(default)]
    pub config_schema: ConfigSchema,

    /// Optional contract-test examples.
    #[serde(default)]
    pub examples: Vec<ManifestExample>,
}

impl PluginManifest {
    /// Parse and validate a manifest from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(json_str)
            .map_err(|e| RegistryError::ManifestParse(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse and validate a manifest from a file on disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Validate required fields and formats.
    pub fn validate(&self) -> Result<()> {
        validation::validate_name("name", &self.name)?;
        validation::validate_name("plugin_type", &self.plugin_type)?;
        validation::validate_name("provider_name", &self.provider_name)?;
        validation::validate_version(&self.version)?;

        if self.entry_point.trim().is_empty() {
            return Err(RegistryError::Validation {
                field: "entry_point".into(),
                message: "must not be empty".into(),
            });
        }

        Ok(())
    }

    /// Build the immutable component metadata described by this manifest.
    pub fn metadata(&self) -> ComponentMetadata {
        let mut meta = ComponentMetadata::new(&self.provider_name, &self.version)
            .with_schema(self.config_schema.clone())
            .with_description(self.description.clone().unwrap_or_default());
        for tag in &self.capability_tags {
            meta = meta.with_tag(tag);
        }
        meta
    }
}
