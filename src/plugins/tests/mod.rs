use super::*;
use crate::config::PluginConfig;
use async_trait::async_trait;

mod matching;

/// Provider that never gets called; registry tests only look at descriptors
struct NullProvider;

#[async_trait]
impl Provider for NullProvider {
    async fn fetch(&self, request: &FetchRequest) -> crate::error::Result<FetchOutcome> {
        Ok(FetchOutcome::Redirect {
            url: request.url.clone(),
            filename: None,
        })
    }
}

fn http() -> Arc<HttpProvider> {
    Arc::new(HttpProvider::new("arcade-dl-test", Duration::from_secs(5)).unwrap())
}

fn empty_registry() -> PluginRegistry {
    PluginRegistry::new(&PluginConfig::default(), http())
}

fn descriptor(id: &str, hosts: &[&str]) -> ProviderDescriptor {
    let mut d = ProviderDescriptor::direct(id, hosts.iter().map(|h| h.to_string()).collect());
    d.name = format!("{} provider", id);
    d
}

fn register_null(registry: &PluginRegistry, id: &str, hosts: &[&str]) {
    registry
        .register_with(descriptor(id, hosts), Arc::new(NullProvider))
        .unwrap();
}
