//! Provider factory: instance resolution, caching, and lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::{RegistryError, Result};
use crate::manifest::ManifestExample;
use crate::plugins::PluginRegistry;
use crate::provider::SharedProvider;
use crate::schema::config_fingerprint;

/// Factory configuration.
#[derive(Debug, Clone, Default)]
pub struct FactoryConfig {
    /// Default deadline applied by [`ProviderFactory::execute_with_timeout`]
    /// when the caller passes none.
    pub default_execute_timeout: Option<Duration>,
}

/// Cache key: domain, provider name, normalized-config fingerprint.
type InstanceKey = (String, String, String);

/// Outcome of running one manifest example against a live provider.
#[derive(Debug, Clone)]
pub struct ExampleOutcome {
    pub example: String,
    pub passed: bool,
    pub actual: Option<Value>,
    pub error: Option<String>,
}

/// Resolves `(domain, name, config)` triples to live, initialized provider
/// instances.
///
/// Identical normalized configs share one instance: the cache lock is held
/// across construction and `initialize`, so at most one live instance per
/// key ever exists, and exactly one `initialize` call happens per cache
/// entry. Failed initialization never populates the cache.
///
/// The factory is the single owner of provider lifetimes. `cleanup` is only
/// ever invoked from [`ProviderFactory::release`] and
/// [`ProviderFactory::shutdown`].
pub struct ProviderFactory {
    plugins: Arc<RwLock<PluginRegistry>>,
    instances: Mutex<HashMap<InstanceKey, SharedProvider>>,
    config: FactoryConfig,
}

impl ProviderFactory {
    /// Create a factory over a shared plugin registry.
    pub fn new(plugins: Arc<RwLock<PluginRegistry>>) -> Self {
        Self::with_config(plugins, FactoryConfig::default())
    }

    /// Create a factory with explicit configuration.
    pub fn with_config(plugins: Arc<RwLock<PluginRegistry>>, config: FactoryConfig) -> Self {
        Self {
            plugins,
            instances: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// The plugin registry this factory resolves against.
    pub fn plugins(&self) -> Arc<RwLock<PluginRegistry>> {
        self.plugins.clone()
    }

    /// Normalize a config against the registration's schema and derive the
    /// cache key. Fails fast on schema violations, before any instantiation.
    async fn normalized_key(
        &self,
        domain: &str,
        name: &str,
        config: &Value,
    ) -> Result<(Map<String, Value>, InstanceKey)> {
        let registration = self.plugins.read().await.registration(domain, name)?;

        let config_map = match config {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                return Err(RegistryError::ConfigValidation(format!(
                    "config must be an object, got {other}"
                )))
            }
        };

        let normalized = registration.metadata.config_schema.normalize(&config_map)?;
        let fingerprint = config_fingerprint(&normalized);
        let key = (domain.to_string(), name.to_string(), fingerprint);
        Ok((normalized, key))
    }

    /// Resolve a provider instance for `(domain, name, config)`.
    ///
    /// Returns the cached instance when one exists for the normalized
    /// config; otherwise constructs, initializes, and caches a new one.
    pub async fn resolve(&self, domain: &str, name: &str, config: &Value) -> Result<SharedProvider> {
        let (normalized, key) = self.normalized_key(domain, name, config).await?;

        let mut instances = self.instances.lock().await;
        if let Some(provider) = instances.get(&key) {
            debug!(domain, provider = name, "Provider cache hit");
            return Ok(provider.clone());
        }

        let mut instance = {
            let plugins = self.plugins.read().await;
            let registry = plugins.domain(domain).ok_or_else(|| RegistryError::NotFound {
                scope: domain.to_string(),
                key: name.to_string(),
            })?;
            registry.create(name, Value::Object(normalized))?
        };

        instance
            .initialize()
            .await
            .map_err(|e| RegistryError::ProviderInit {
                provider: format!("{domain}/{name}"),
                message: e.to_string(),
            })?;

        let shared: SharedProvider = Arc::from(instance);
        instances.insert(key, shared.clone());
        info!(domain, provider = name, "Provider initialized and cached");
        Ok(shared)
    }

    /// Release the instance for `(domain, name, config)`: evict it from the
    /// cache and run its `cleanup`.
    ///
    /// Idempotent — releasing a key with no live instance is a no-op. The
    /// config is still schema-validated so a typo fails loudly instead of
    /// silently releasing nothing.
    pub async fn release(&self, domain: &str, name: &str, config: &Value) -> Result<()> {
        let (_, key) = self.normalized_key(domain, name, config).await?;

        let evicted = self.instances.lock().await.remove(&key);
        if let Some(provider) = evicted {
            provider.cleanup().await;
            info!(domain, provider = name, "Provider released");
        } else {
            debug!(domain, provider = name, "Release of non-resident provider (no-op)");
        }
        Ok(())
    }

    /// Release every cached instance.
    pub async fn shutdown(&self) {
        let drained: Vec<(InstanceKey, SharedProvider)> =
            self.instances.lock().await.drain().collect();
        let count = drained.len();
        for (_, provider) in drained {
            provider.cleanup().await;
        }
        info!(released = count, "Provider factory shut down");
    }

    /// Number of live cached instances.
    pub async fn cached_count(&self) -> usize {
        self.instances.lock().await.len()
    }

    /// Execute a provider call under a deadline.
    ///
    /// Uses the explicit `deadline` if given, otherwise the factory's
    /// configured default; with neither, the call runs unbounded.
    pub async fn execute_with_timeout(
        &self,
        provider: &SharedProvider,
        input: Value,
        deadline: Option<Duration>,
    ) -> Result<Value> {
        let deadline = deadline.or(self.config.default_execute_timeout);
        match deadline {
            Some(limit) => tokio::time::timeout(limit, provider.execute(input))
                .await
                .map_err(|_| RegistryError::Timeout {
                    provider: provider.name().to_string(),
                    timeout_ms: limit.as_millis() as u64,
                })?,
            None => provider.execute(input).await,
        }
    }

    /// Run a registration's manifest examples against a resolved instance.
    ///
    /// Used as a contract test: each example's input is executed and the
    /// output compared against `expected_output`.
    pub async fn check_examples(
        &self,
        domain: &str,
        name: &str,
        config: &Value,
    ) -> Result<Vec<ExampleOutcome>> {
        let registration = self.plugins.read().await.registration(domain, name)?;
        let examples: Vec<ManifestExample> = registration.examples.clone();
        let provider = self.resolve(domain, name, config).await?;

        let mut outcomes = Vec::with_capacity(examples.len());
        for example in examples {
            match provider.execute(example.input.clone()).await {
                Ok(actual) => {
                    let passed = actual == example.expected_output;
                    outcomes.push(ExampleOutcome {
                        example: example.name,
                        passed,
                        actual: Some(actual),
                        error: None,
                    });
                }
                Err(e) => outcomes.push(ExampleOutcome {
                    example: example.name,
                    passed: false,
                    actual: None,
                    error: Some(e.to_string()),
                }),
            }
        }
        Ok(outcomes)
    }
}
