//! Component registry, plugin manifests, and provider factory for Conflux.
//!
//! This crate owns the plugin side of the engine:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  PluginRegistry                                          │
//! │  - one Registry<ProviderRegistration> per domain         │
//! │  - manifest discovery (JSON dir scan, non-fatal skips)   │
//! ├──────────────────────────────────────────────────────────┤
//! │  ProviderFactory                                         │
//! │  - (domain, name, config) → shared initialized instance  │
//! │  - normalized-config cache, release/shutdown lifecycle   │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod factory;
pub mod manifest;
pub mod metadata;
pub mod plugins;
pub mod provider;
pub mod registry;
pub mod schema;
pub mod validation;

pub use error::{RegistryError, Result};
pub use factory::{ExampleOutcome, FactoryConfig, ProviderFactory};
pub use manifest::{ManifestExample, PluginManifest};
pub use metadata::ComponentMetadata;
pub use plugins::{
    DiscoveryReport, LoadedPlugin, PluginRegistry, ProviderBindings, SkippedPlugin,
};
pub use provider::{Provider, ProviderConstructor, ProviderRegistration, SharedProvider};
pub use registry::Registry;
pub use schema::{canonical_config, config_fingerprint, ConfigSchema, PropertyKind, PropertySpec};
