//! Component metadata attached to every registrable component.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::schema::ConfigSchema;

/// Immutable descriptor for a registrable component.
///
/// Created when a plugin descriptor is loaded (or when a component is
/// registered in code) and never mutated afterwards. The `name` must be
/// unique within its registry scope; the registry enforces this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentMetadata {
    pub name: String,
    pub version: String,
    /// Capability tags used for discovery and intent routing.
    #[serde(default)]
    pub capability_tags: BTreeSet<String>,
    /// Schema for the configuration this component accepts.
    #[serde(default)]
    pub config_schema: ConfigSchema,
    #[serde(default)]
    pub description: String,
}

impl ComponentMetadata {
    /// Create metadata with an empty schema and no tags.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            capability_tags: BTreeSet::new(),
            config_schema: ConfigSchema::empty(),
            description: String::new(),
        }
    }

    /// Add a capability tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.capability_tags.insert(tag.into());
        self
    }

    /// Attach a configuration schema.
    pub fn with_schema(mut self, schema: ConfigSchema) -> Self {
        self.config_schema = schema;
        self
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether this component advertises the given capability.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.capability_tags.contains(tag)
    }
}
