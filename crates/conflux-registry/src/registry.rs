//! Generic keyed component store.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{RegistryError, Result};

/// A keyed store of components within a named scope.
///
/// Entries are shared (`Arc`) so lookups are cheap and instances can be
/// handed out to concurrent consumers. Duplicate registration is an error
/// unless the caller goes through the explicit replace path.
#[derive(Debug)]
pub struct Registry<T> {
    scope: String,
    entries: HashMap<String, Arc<T>>,
}

impl<T> Registry<T> {
    /// Create an empty registry for a scope (e.g. a provider domain).
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            entries: HashMap::new(),
        }
    }

    /// The scope this registry covers.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Register a component under a key.
    ///
    /// Fails with [`RegistryError::Duplicate`] if the key is taken; use
    /// [`Registry::register_or_replace`] to overwrite deliberately.
    pub fn register(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(RegistryError::Duplicate {
                scope: self.scope.clone(),
                key,
            });
        }
        debug!(scope = %self.scope, key = %key, "Component registered");
        self.entries.insert(key, Arc::new(value));
        Ok(())
    }

    /// Register a component, replacing any existing entry.
    ///
    /// Returns the replaced entry, if there was one.
    pub fn register_or_replace(&mut self, key: impl Into<String>, value: T) -> Option<Arc<T>> {
        let key = key.into();
        debug!(scope = %self.scope, key = %key, "Component registered (replace allowed)");
        self.entries.insert(key, Arc::new(value))
    }

    /// Look up a component by key.
    pub fn get(&self, key: &str) -> Result<Arc<T>> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                scope: self.scope.clone(),
                key: key.to_string(),
            })
    }

    /// Whether a key is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove a component, returning it if present.
    pub fn remove(&mut self, key: &str) -> Option<Arc<T>> {
        self.entries.remove(key)
    }

    /// All registered keys, sorted for stable introspection output.
    pub fn list(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
