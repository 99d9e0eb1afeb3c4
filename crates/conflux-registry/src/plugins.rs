//! Domain-scoped plugin registry and manifest discovery.
//!
//! The [`PluginRegistry`] holds one [`Registry`] of provider registrations
//! per domain ("llm", "rag", "workflow", ...). Providers get in one of two
//! ways: direct registration in code, or [`PluginRegistry::discover`], which
//! scans a directory of JSON manifests and resolves each manifest's
//! `entry_point` against an explicit [`ProviderBindings`] table. A manifest
//! that fails to parse, validate, or bind is recorded and skipped — a bad
//! plugin never takes discovery down with it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{RegistryError, Result};
use crate::manifest::PluginManifest;
use crate::metadata::ComponentMetadata;
use crate::provider::{ProviderConstructor, ProviderRegistration};
use crate::registry::Registry;

/// Explicit table mapping manifest `entry_point` strings to constructors.
///
/// Rust cannot load code named by a manifest at runtime, so the host binds
/// the entry points it ships with before running discovery. An unbound
/// entry point is a non-fatal discovery error.
#[derive(Default)]
pub struct ProviderBindings {
    bindings: HashMap<String, ProviderConstructor>,
}

impl ProviderBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an entry point to a constructor.
    pub fn bind(mut self, entry_point: impl Into<String>, constructor: ProviderConstructor) -> Self {
        self.bindings.insert(entry_point.into(), constructor);
        self
    }

    fn get(&self, entry_point: &str) -> Option<&ProviderConstructor> {
        self.bindings.get(entry_point)
    }
}

/// A manifest that discovery registered successfully.
#[derive(Debug, Clone)]
pub struct LoadedPlugin {
    pub domain: String,
    pub provider_name: String,
    pub path: PathBuf,
}

/// A manifest that discovery skipped, and why.
#[derive(Debug, Clone)]
pub struct SkippedPlugin {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a discovery scan.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    pub loaded: Vec<LoadedPlugin>,
    pub skipped: Vec<SkippedPlugin>,
}

impl DiscoveryReport {
    fn record_skip(&mut self, path: &Path, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(path = %path.display(), %reason, "Plugin manifest skipped");
        self.skipped.push(SkippedPlugin {
            path: path.to_path_buf(),
            reason,
        });
    }
}

/// Registry of provider types, scoped by domain.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    domains: HashMap<String, Registry<ProviderRegistration>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider type under a domain.
    ///
    /// Fails with `Duplicate` if the provider name is already taken in that
    /// domain.
    pub fn register_provider(
        &mut self,
        domain: &str,
        metadata: ComponentMetadata,
        constructor: ProviderConstructor,
    ) -> Result<()> {
        let name = metadata.name.clone();
        self.domains
            .entry(domain.to_string())
            .or_insert_with(|| Registry::new(domain))
            .register(name, ProviderRegistration::new(metadata, constructor))
    }

    /// Register a provider type, replacing any existing registration.
    pub fn register_provider_or_replace(
        &mut self,
        domain: &str,
        metadata: ComponentMetadata,
        constructor: ProviderConstructor,
    ) {
        let name = metadata.name.clone();
        self.domains
            .entry(domain.to_string())
            .or_insert_with(|| Registry::new(domain))
            .register_or_replace(name, ProviderRegistration::new(metadata, constructor));
    }

    /// The registry for a domain, if any provider was registered there.
    pub fn domain(&self, name: &str) -> Option<&Registry<ProviderRegistration>> {
        self.domains.get(name)
    }

    /// Look up a provider registration by domain and name.
    pub fn registration(&self, domain: &str, name: &str) -> Result<Arc<ProviderRegistration>> {
        match self.domains.get(domain) {
            Some(registry) => registry.get(name),
            None => Err(RegistryError::NotFound {
                scope: domain.to_string(),
                key: name.to_string(),
            }),
        }
    }

    /// All domains with at least one registration, sorted.
    pub fn domains(&self) -> Vec<String> {
        let mut names: Vec<String> = self.domains.keys().cloned().collect();
        names.sort();
        names
    }

    /// Scan a directory of `*.json` plugin manifests and register every
    /// valid one whose entry point is bound.
    ///
    /// Returns a report of what was loaded and what was skipped. Skips are
    /// logged but never abort the scan; duplicate provider names within a
    /// domain are skips too (first manifest wins).
    pub fn discover(&mut self, dir: &Path, bindings: &ProviderBindings) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to read manifest directory");
                return report;
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        // Stable scan order regardless of directory iteration order
        paths.sort();

        for path in paths {
            let manifest = match PluginManifest::from_file(&path) {
                Ok(m) => m,
                Err(e) => {
                    report.record_skip(&path, e.to_string());
                    continue;
                }
            };

            let constructor = match bindings.get(&manifest.entry_point) {
                Some(c) => c.clone(),
                None => {
                    report.record_skip(
                        &path,
                        format!("no binding for entry point '{}'", manifest.entry_point),
                    );
                    continue;
                }
            };

            let domain = manifest.plugin_type.clone();
            let provider_name = manifest.provider_name.clone();
            let mut registration = ProviderRegistration::new(manifest.metadata(), constructor);
            registration.examples = manifest.examples.clone();

            let registry = self
                .domains
                .entry(domain.clone())
                .or_insert_with(|| Registry::new(&domain));

            match registry.register(provider_name.clone(), registration) {
                Ok(()) => {
                    info!(
                        domain = %domain,
                        provider = %provider_name,
                        path = %path.display(),
                        "Plugin registered"
                    );
                    report.loaded.push(LoadedPlugin {
                        domain,
                        provider_name,
                        path,
                    });
                }
                Err(e) => report.record_skip(&path, e.to_string()),
            }
        }

        info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            dir = %dir.display(),
            "Plugin discovery complete"
        );

        report
    }
}
