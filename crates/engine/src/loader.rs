//! Facade tying registrations, the provider chain and the definition cache
//! together, plus the process-wide instance.

use std::{collections::HashMap, sync::Arc};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use tracing::{debug, info};

use crate::{
    cache::{DefinitionCache, PendingInvalidation},
    config::{LoaderConfig, load_registrations_file},
    coordinator::ResolutionCoordinator,
    error::{LoaderError, RegistrationError},
    provider::{DefaultProvider, ProviderChain, ResourceProvider},
    registry::ResourceRegistry,
    scheduler::Scheduler,
    types::{Resolution, ResourceConfig, SharedConfig},
};

static LOADER: Lazy<ResourceLoader> = Lazy::new(ResourceLoader::new);

/// The process-wide loader. Starts with only the default provider and no
/// registrations.
pub fn loader() -> &'static ResourceLoader {
    &LOADER
}

/// Saved loader state, produced by [`ResourceLoader::snapshot`].
#[derive(Debug, Clone)]
pub struct LoaderSnapshot {
    providers: Vec<Arc<dyn ResourceProvider>>,
    registrations: IndexMap<String, SharedConfig>,
    resolved: HashMap<String, Resolution>,
    pending_invalidation: PendingInvalidation,
}

/// Registration, provider administration and definition lookup in one place.
///
/// Cloning yields another handle to the same state.
#[derive(Debug, Clone)]
pub struct ResourceLoader {
    registry: ResourceRegistry,
    chain: ProviderChain,
    cache: DefinitionCache,
    default_provider: Arc<dyn ResourceProvider>,
}

impl Default for ResourceLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceLoader {
    pub fn new() -> Self {
        Self::with_scheduler(Scheduler::ambient())
    }

    /// Build a loader whose completions are delivered through `scheduler`.
    pub fn with_scheduler(scheduler: Scheduler) -> Self {
        let registry = ResourceRegistry::new();
        let default_provider: Arc<dyn ResourceProvider> = Arc::new(DefaultProvider::new(registry.clone()));
        let chain = ProviderChain::new(vec![Arc::clone(&default_provider)]);
        let cache = DefinitionCache::new(ResolutionCoordinator::with_scheduler(chain.clone(), scheduler));
        Self {
            registry,
            chain,
            cache,
            default_provider,
        }
    }

    pub fn with_config(config: &LoaderConfig) -> Result<Self, LoaderError> {
        let loader = Self::new();
        loader.apply_config(config)?;
        Ok(loader)
    }

    /// Apply the pending-invalidation policy and register every inline and
    /// file-backed registration in `config`.
    pub fn apply_config(&self, config: &LoaderConfig) -> Result<(), LoaderError> {
        self.cache.set_pending_invalidation(config.pending_invalidation);
        for (name, value) in &config.registrations {
            self.register(name, ResourceConfig::new(value.clone()))?;
        }
        if let Some(path) = config.registrations_file() {
            let count = self.register_all(load_registrations_file(&path)?)?;
            info!(path = %path.display(), count, "applied registrations file");
        }
        Ok(())
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn chain(&self) -> &ProviderChain {
        &self.chain
    }

    pub fn cache(&self) -> &DefinitionCache {
        &self.cache
    }

    pub fn default_provider(&self) -> Arc<dyn ResourceProvider> {
        Arc::clone(&self.default_provider)
    }

    pub fn register(&self, name: &str, config: ResourceConfig) -> Result<(), RegistrationError> {
        self.registry.register(name, config)
    }

    /// Register every entry, stopping at the first rejected one.
    pub fn register_all(&self, registrations: impl IntoIterator<Item = (String, ResourceConfig)>) -> Result<usize, RegistrationError> {
        let mut count = 0;
        for (name, config) in registrations {
            self.register(&name, config)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registry.is_registered(name)
    }

    /// Registered names in registration order.
    pub fn registered_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Remove the registration for `name` and its cached definition.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.registry.unregister(name).is_some();
        self.cache.remove(name);
        removed
    }

    pub async fn get(&self, name: &str) -> Resolution {
        self.cache.get(name).await
    }

    pub fn get_with<F>(&self, name: &str, on_complete: F)
    where
        F: FnOnce(Resolution) + Send + 'static,
    {
        self.cache.get_with(name, on_complete);
    }

    pub fn invalidate(&self, name: &str) -> bool {
        self.cache.invalidate(name)
    }

    pub fn remove(&self, name: &str) -> bool {
        self.cache.remove(name)
    }

    pub fn providers(&self) -> Vec<Arc<dyn ResourceProvider>> {
        self.chain.snapshot()
    }

    pub fn set_providers(&self, providers: Vec<Arc<dyn ResourceProvider>>) {
        debug!(provider_count = providers.len(), "provider chain replaced");
        self.chain.replace(providers);
    }

    pub fn push_provider(&self, provider: Arc<dyn ResourceProvider>) {
        debug!(provider = %provider.label(), "provider appended");
        self.chain.push(provider);
    }

    /// Return to the initial state: default provider only, no registrations,
    /// no cached definitions, default policy.
    pub fn reset(&self) {
        self.registry.clear();
        self.chain.replace(vec![Arc::clone(&self.default_provider)]);
        self.cache.clear();
        self.cache.set_pending_invalidation(PendingInvalidation::default());
    }

    pub fn snapshot(&self) -> LoaderSnapshot {
        LoaderSnapshot {
            providers: self.chain.snapshot(),
            registrations: self.registry.snapshot(),
            resolved: self.cache.resolved_entries(),
            pending_invalidation: self.cache.pending_invalidation(),
        }
    }

    pub fn restore(&self, snapshot: LoaderSnapshot) {
        self.chain.replace(snapshot.providers);
        self.registry.restore(snapshot.registrations);
        self.cache.restore_resolved(snapshot.resolved);
        self.cache.set_pending_invalidation(snapshot.pending_invalidation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::EntryState,
        provider::test_support::{RecordingProvider, sample_config, sample_definition},
    };
    use serde_json::json;

    #[test]
    fn starts_with_only_the_default_provider() {
        let loader = ResourceLoader::new();
        let providers = loader.providers();

        assert_eq!(providers.len(), 1);
        assert!(Arc::ptr_eq(&providers[0], &loader.default_provider()));
        assert_eq!(providers[0].label(), DefaultProvider::LABEL);
    }

    #[tokio::test]
    async fn unregister_clears_the_cached_definition() {
        let loader = ResourceLoader::new();
        loader.register("card", ResourceConfig::new(json!({ "template": "x" }))).unwrap();

        assert!(loader.get("card").await.is_some());
        assert!(loader.unregister("card"));
        assert_eq!(loader.cache().state("card"), EntryState::NoEntry);
        assert!(loader.get("card").await.is_none());
    }

    #[tokio::test]
    async fn snapshot_and_restore_round_trip_providers_registrations_and_cache() {
        let loader = ResourceLoader::new();
        loader.register("kept", ResourceConfig::new(json!({ "template": "k" }))).unwrap();
        let kept = loader.get("kept").await.expect("kept definition");
        let snapshot = loader.snapshot();

        loader.register("extra", ResourceConfig::new(json!({}))).unwrap();
        loader.push_provider(Arc::new(RecordingProvider::supplying_config("configs", sample_config())));
        loader.push_provider(Arc::new(RecordingProvider::supplying_definition("definitions", sample_definition())));
        loader.invalidate("kept");
        loader.restore(snapshot);

        assert_eq!(loader.providers().len(), 1);
        assert!(!loader.is_registered("extra"));
        let restored = loader.get("kept").await.expect("kept definition");
        assert!(Arc::ptr_eq(&kept, &restored));
    }

    #[tokio::test]
    async fn reset_restores_initial_state() {
        let loader = ResourceLoader::new();
        loader.register("card", ResourceConfig::new(json!({}))).unwrap();
        loader.get("card").await;
        loader.push_provider(Arc::new(RecordingProvider::declining("extra")));
        loader.cache().set_pending_invalidation(PendingInvalidation::ExpireOnCompletion);

        loader.reset();

        assert!(loader.registry().names().is_empty());
        assert_eq!(loader.providers().len(), 1);
        assert!(loader.cache().is_empty());
        assert_eq!(loader.cache().pending_invalidation(), PendingInvalidation::Ignore);
    }

    #[test]
    fn apply_config_registers_inline_and_file_registrations() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("more.yaml");
        std::fs::write(&path, "registrations:\n  from-file:\n    template: f\n").unwrap();
        let mut config = LoaderConfig::default();
        config.registrations.insert("inline".into(), json!({ "template": "i" }));
        config.registrations_path = Some(path.to_string_lossy().to_string());
        config.pending_invalidation = PendingInvalidation::ExpireOnCompletion;

        let loader = ResourceLoader::with_config(&config).unwrap();

        assert_eq!(loader.registered_names(), vec!["inline".to_string(), "from-file".to_string()]);
        assert_eq!(loader.cache().pending_invalidation(), PendingInvalidation::ExpireOnCompletion);
    }

    #[test]
    fn apply_config_surfaces_duplicate_registrations() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("dup.json");
        std::fs::write(&path, r#"{ "registrations": { "card": { "template": "b" } } }"#).unwrap();
        let mut config = LoaderConfig::default();
        config.registrations.insert("card".into(), json!({ "template": "a" }));
        config.registrations_path = Some(path.to_string_lossy().to_string());

        let error = ResourceLoader::with_config(&config).expect_err("duplicate");

        assert!(matches!(
            error,
            LoaderError::Registration(RegistrationError::AlreadyRegistered { .. })
        ));
    }
}
