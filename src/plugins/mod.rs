//! Provider registry
//!
//! Holds provider descriptors in registration order and resolves URLs to a provider
//! by host. Matching rules:
//! - `*.example.com` matches any host ending in `.example.com` (not `example.com` itself)
//! - any other pattern matches only that exact host
//! - comparison is ASCII case-insensitive; the first registered match wins

mod descriptor;
mod external;
mod http;
mod loader;
mod provider;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use descriptor::{
    ACTION_DOWNLOAD, DEFAULT_CATEGORY, PluginFunction, ProviderDescriptor, ProviderType,
    ScriptLanguage,
};
pub use external::{CommandProvider, ScriptProvider};
pub use http::{DIRECT_PROVIDER_ID, HttpProvider};
pub use loader::LoadReport;
pub use provider::{ByteSource, FetchOutcome, FetchRequest, Provider};

use crate::config::PluginConfig;
use crate::error::{Error, Result};
use crate::utils::host_of;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// Check a host pattern: a lowercase hostname, optionally prefixed with `*.`
pub fn is_valid_host_pattern(pattern: &str) -> bool {
    let host = pattern.strip_prefix("*.").unwrap_or(pattern);

    !host.is_empty()
        && host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        })
}

/// Whether `pattern` matches `host`
pub fn host_matches(pattern: &str, host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    match pattern.strip_prefix("*.") {
        Some(suffix) => host.ends_with(&format!(".{}", suffix.to_ascii_lowercase())),
        None => host.eq_ignore_ascii_case(pattern),
    }
}

/// A registered provider: its manifest and the implementation serving it
#[derive(Clone)]
pub struct RegisteredProvider {
    /// Manifest
    pub descriptor: ProviderDescriptor,
    /// Implementation
    pub provider: Arc<dyn Provider>,
}

impl std::fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Builds provider implementations from manifests
#[derive(Clone, Debug)]
struct ProviderFactory {
    http: Arc<HttpProvider>,
    plugins_dir: Option<PathBuf>,
    search_path: bool,
    timeout: Duration,
}

impl ProviderFactory {
    fn build(
        &self,
        descriptor: &ProviderDescriptor,
        base_dir: Option<&Path>,
    ) -> Result<Arc<dyn Provider>> {
        Ok(match descriptor.provider_type {
            ProviderType::Direct => self.http.clone(),
            ProviderType::Script => Arc::new(ScriptProvider::from_descriptor(
                descriptor,
                base_dir.or(self.plugins_dir.as_deref()),
                self.search_path,
                self.timeout,
            )?),
            ProviderType::Command => {
                Arc::new(CommandProvider::from_descriptor(descriptor, self.timeout)?)
            }
        })
    }
}

/// Ordered set of providers keyed by unique id
pub struct PluginRegistry {
    entries: RwLock<Vec<RegisteredProvider>>,
    factory: ProviderFactory,
}

impl PluginRegistry {
    /// Empty registry
    ///
    /// `http` serves `direct` manifests and URLs handed back by out-of-process providers.
    pub fn new(config: &PluginConfig, http: Arc<HttpProvider>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            factory: ProviderFactory {
                http,
                plugins_dir: config.plugins_dir.clone(),
                search_path: config.search_path,
                timeout: config.plugin_timeout,
            },
        }
    }

    /// Registry with the built-in direct provider and every manifest in `plugins_dir`
    pub fn with_config(config: &PluginConfig, http: Arc<HttpProvider>) -> Result<Self> {
        let registry = Self::new(config, http.clone());

        // Registered even with no hosts so it stays usable as an explicit hint
        registry.insert(RegisteredProvider {
            descriptor: ProviderDescriptor::direct(
                DIRECT_PROVIDER_ID,
                config.direct_hosts.clone(),
            ),
            provider: http,
        })?;

        if let Some(dir) = &config.plugins_dir {
            if dir.is_dir() {
                let report = registry.load_dir(dir)?;
                tracing::info!(
                    dir = %dir.display(),
                    loaded = report.loaded.len(),
                    errors = report.errors.len(),
                    "plugin manifests loaded"
                );
            } else {
                tracing::warn!(dir = %dir.display(), "plugins directory does not exist");
            }
        }

        Ok(registry)
    }

    /// The shared HTTP provider
    pub fn http(&self) -> Arc<HttpProvider> {
        self.factory.http.clone()
    }

    /// Validate a manifest, build its provider and append it
    ///
    /// Script entry points are resolved against the configured plugins directory.
    pub fn register(&self, descriptor: ProviderDescriptor) -> Result<()> {
        self.register_in(descriptor, None)
    }

    pub(crate) fn register_in(
        &self,
        mut descriptor: ProviderDescriptor,
        base_dir: Option<&Path>,
    ) -> Result<()> {
        descriptor.normalize();
        descriptor.validate()?;
        if self.contains(&descriptor.id) {
            return Err(Error::DuplicateProvider { id: descriptor.id });
        }
        let provider = self.factory.build(&descriptor, base_dir)?;
        self.insert(RegisteredProvider {
            descriptor,
            provider,
        })
    }

    /// Append a manifest served by a caller-supplied implementation
    pub fn register_with(
        &self,
        mut descriptor: ProviderDescriptor,
        provider: Arc<dyn Provider>,
    ) -> Result<()> {
        descriptor.normalize();
        descriptor.validate()?;
        self.insert(RegisteredProvider {
            descriptor,
            provider,
        })
    }

    fn insert(&self, entry: RegisteredProvider) -> Result<()> {
        let mut entries = self.write();
        if entries.iter().any(|e| e.descriptor.id == entry.descriptor.id) {
            return Err(Error::DuplicateProvider {
                id: entry.descriptor.id,
            });
        }
        tracing::info!(
            provider = %entry.descriptor.id,
            hosts = ?entry.descriptor.supported_hosts,
            kind = ?entry.descriptor.provider_type,
            "provider registered"
        );
        entries.push(entry);
        Ok(())
    }

    /// First registered provider whose hosts match the URL's host
    pub fn resolve(&self, url: &str) -> Result<ProviderDescriptor> {
        self.resolve_entry(url).map(|entry| entry.descriptor)
    }

    /// Like [`resolve`](Self::resolve), also returning the implementation
    pub fn resolve_entry(&self, url: &str) -> Result<RegisteredProvider> {
        let host = host_of(url).ok_or_else(|| Error::NoProvider {
            url: url.to_string(),
            host: String::new(),
        })?;

        self.read()
            .iter()
            .find(|entry| entry.descriptor.serves_host(&host))
            .cloned()
            .ok_or_else(|| Error::NoProvider {
                url: url.to_string(),
                host,
            })
    }

    /// First registered provider supporting `action` whose hosts match the URL
    pub fn resolve_for_action(&self, action: &str, url: &str) -> Result<ProviderDescriptor> {
        let host = host_of(url).unwrap_or_default();
        self.read()
            .iter()
            .find(|entry| {
                entry.descriptor.supports_action(action) && entry.descriptor.serves_host(&host)
            })
            .map(|entry| entry.descriptor.clone())
            .ok_or_else(|| Error::NoProvider {
                url: url.to_string(),
                host,
            })
    }

    /// Providers for a given function, in registration order
    pub fn find_by_function(&self, function: PluginFunction) -> Vec<ProviderDescriptor> {
        self.read()
            .iter()
            .filter(|entry| entry.descriptor.plugin_function == function)
            .map(|entry| entry.descriptor.clone())
            .collect()
    }

    /// All descriptors, in registration order
    pub fn list_all(&self) -> Vec<ProviderDescriptor> {
        self.read()
            .iter()
            .map(|entry| entry.descriptor.clone())
            .collect()
    }

    /// Look up by id
    pub fn get(&self, id: &str) -> Result<RegisteredProvider> {
        self.read()
            .iter()
            .find(|entry| entry.descriptor.id == id)
            .cloned()
            .ok_or_else(|| Error::PluginNotFound { id: id.to_string() })
    }

    /// Whether a provider with this id is registered
    pub fn contains(&self, id: &str) -> bool {
        self.read().iter().any(|entry| entry.descriptor.id == id)
    }

    /// Unregister a provider
    ///
    /// Jobs that already resolved to it keep their own handle and are unaffected.
    pub fn remove(&self, id: &str) -> Result<ProviderDescriptor> {
        let mut entries = self.write();
        let index = entries
            .iter()
            .position(|entry| entry.descriptor.id == id)
            .ok_or_else(|| Error::PluginNotFound { id: id.to_string() })?;
        let removed = entries.remove(index);
        tracing::info!(provider = %id, "provider removed");
        Ok(removed.descriptor)
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no providers are registered
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // No section panics mid-update; a poisoned list is still consistent
    fn read(&self) -> RwLockReadGuard<'_, Vec<RegisteredProvider>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<RegisteredProvider>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}
