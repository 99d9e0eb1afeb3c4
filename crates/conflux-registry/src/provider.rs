//! The provider capability contract.
//!
//! A provider is an opaque component implementing a domain capability. The
//! engine only ever talks to it through this trait: `initialize` once before
//! first use, `execute` any number of times, `cleanup` exactly once when the
//! factory releases it. Callers never invoke `cleanup` directly — only
//! [`crate::factory::ProviderFactory::release`] may, which is what prevents
//! use-after-cleanup races.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::metadata::ComponentMetadata;
use crate::registry::Registry;

/// A live provider instance.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The provider's registered name.
    fn name(&self) -> &str;

    /// Prepare the provider for use (open connections, warm caches).
    ///
    /// Called exactly once by the factory before the instance is shared.
    /// A failure here means the instance is discarded, never cached.
    async fn initialize(&mut self) -> Result<()>;

    /// Execute the provider's domain operation.
    async fn execute(&self, input: Value) -> Result<Value>;

    /// Tear the provider down.
    ///
    /// Must not fail and must be safe to call once. The factory guarantees
    /// it is not called while other pipeline runs still hold the instance
    /// for new work.
    async fn cleanup(&self);
}

impl std::fmt::Debug for dyn Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider").field("name", &self.name()).finish()
    }
}

/// A provider instance shared between pipeline runs.
pub type SharedProvider = Arc<dyn Provider>;

/// Explicit constructor for a provider type.
///
/// Registration stores a closure rather than a type: resolution is always
/// lookup-by-key, never reflection. The closure receives the normalized
/// configuration and returns an uninitialized instance.
pub type ProviderConstructor = Arc<dyn Fn(Value) -> Result<Box<dyn Provider>> + Send + Sync>;

/// A constructible provider type plus its metadata, as stored in a
/// domain-scoped registry.
pub struct ProviderRegistration {
    pub metadata: ComponentMetadata,
    pub constructor: ProviderConstructor,
    /// Contract-test examples carried over from the plugin manifest.
    pub examples: Vec<crate::manifest::ManifestExample>,
}

impl ProviderRegistration {
    /// Create a registration with no manifest examples.
    pub fn new(metadata: ComponentMetadata, constructor: ProviderConstructor) -> Self {
        Self {
            metadata,
            constructor,
            examples: Vec::new(),
        }
    }
}

impl std::fmt::Debug for ProviderRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistration")
            .field("metadata", &self.metadata)
            .field("examples", &self.examples.len())
            .finish()
    }
}

impl Registry<ProviderRegistration> {
    /// Instantiate a registered provider type with a configuration.
    ///
    /// Fails with `NotFound` if the key is absent. The returned instance is
    /// not yet initialized; the factory owns that step.
    pub fn create(&self, key: &str, config: Value) -> Result<Box<dyn Provider>> {
        let registration = self.get(key)?;
        (registration.constructor)(config)
    }
}
