use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use thiserror::Error;
use tracing::{debug, trace};

use super::{Reply, ResourceProvider, Stage};
use crate::types::{SharedConfig, SharedDefinition};

/// Raised when a provider breaks the reply contract. Never surfaced to
/// callers of the cache; the coordinator logs it and resolves to absence.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("provider '{provider}' returned a {stage} synchronously instead of answering through its reply handle")]
    SynchronousReturn {
        provider: String,
        stage: Stage,
        /// The provider asked for this violation not to be reported.
        suppressed: bool,
    },
}

/// Ordered, shared list of providers. Earlier providers win.
///
/// The list may be replaced or extended at any time; every resolution works
/// from a [`ProviderChain::snapshot`] taken when it starts.
#[derive(Clone, Default)]
pub struct ProviderChain {
    providers: Arc<RwLock<Vec<Arc<dyn ResourceProvider>>>>,
}

impl fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self.snapshot().iter().map(|provider| provider.label().to_string()).collect();
        f.debug_struct("ProviderChain").field("providers", &labels).finish()
    }
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn ResourceProvider>>) -> Self {
        Self {
            providers: Arc::new(RwLock::new(providers)),
        }
    }

    pub fn snapshot(&self) -> Vec<Arc<dyn ResourceProvider>> {
        self.providers.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn replace(&self, providers: Vec<Arc<dyn ResourceProvider>>) {
        *self.providers.write().unwrap_or_else(PoisonError::into_inner) = providers;
    }

    pub fn push(&self, provider: Arc<dyn ResourceProvider>) {
        self.providers.write().unwrap_or_else(PoisonError::into_inner).push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ask the current providers for the configuration of `name`.
    pub async fn resolve_configuration(&self, name: &str) -> Result<Option<SharedConfig>, ChainError> {
        resolve_configuration(&self.snapshot(), name).await
    }

    /// Ask the current providers for the definition of `name` given `config`.
    pub async fn resolve_definition(&self, name: &str, config: &SharedConfig) -> Result<Option<SharedDefinition>, ChainError> {
        resolve_definition(&self.snapshot(), name, config).await
    }
}

pub(crate) async fn resolve_configuration(providers: &[Arc<dyn ResourceProvider>], name: &str) -> Result<Option<SharedConfig>, ChainError> {
    first_answer(providers, Stage::Configuration, name, |provider, reply| {
        provider.resolve_configuration(name, reply)
    })
    .await
}

pub(crate) async fn resolve_definition(
    providers: &[Arc<dyn ResourceProvider>],
    name: &str,
    config: &SharedConfig,
) -> Result<Option<SharedDefinition>, ChainError> {
    first_answer(providers, Stage::Definition, name, |provider, reply| {
        provider.resolve_definition(name, config, reply)
    })
    .await
}

/// Walk `providers` in order until one answers with a value.
///
/// Providers without the capability for `stage` are skipped without
/// suspending. Providers after the one that answered are never invoked.
async fn first_answer<T, F>(providers: &[Arc<dyn ResourceProvider>], stage: Stage, name: &str, mut invoke: F) -> Result<Option<T>, ChainError>
where
    T: Send + 'static,
    F: FnMut(&dyn ResourceProvider, Reply<T>) -> Option<T>,
{
    for provider in providers {
        if !provider.capabilities().supports(stage) {
            trace!(name = %name, provider = %provider.label(), stage = %stage, "provider skipped");
            continue;
        }

        let (reply, answer) = Reply::channel();
        if invoke(provider.as_ref(), reply).is_some() {
            // Dropping `answer` here discards whatever the provider delivers later.
            return Err(ChainError::SynchronousReturn {
                provider: provider.label().to_string(),
                stage,
                suppressed: provider.suppress_contract_violations(),
            });
        }

        match answer.await {
            Ok(Some(value)) => {
                debug!(name = %name, provider = %provider.label(), stage = %stage, "provider answered");
                return Ok(Some(value));
            }
            Ok(None) => {
                trace!(name = %name, provider = %provider.label(), stage = %stage, "provider declined");
            }
            Err(_) => {
                debug!(
                    name = %name,
                    provider = %provider.label(),
                    stage = %stage,
                    "provider dropped its reply without answering"
                );
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        Capabilities,
        test_support::{Answer, RecordingProvider, sample_config, sample_definition},
    };

    #[derive(Debug)]
    struct DroppingProvider;

    impl ResourceProvider for DroppingProvider {
        fn label(&self) -> &str {
            "dropping"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::CONFIGURATION
        }

        fn resolve_configuration(&self, _name: &str, reply: Reply<SharedConfig>) -> Option<SharedConfig> {
            drop(reply);
            None
        }
    }

    /// Answers from a plain OS thread outside the runtime.
    #[derive(Debug)]
    struct ThreadedProvider {
        config: SharedConfig,
    }

    impl ResourceProvider for ThreadedProvider {
        fn label(&self) -> &str {
            "threaded"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::CONFIGURATION
        }

        fn resolve_configuration(&self, _name: &str, reply: Reply<SharedConfig>) -> Option<SharedConfig> {
            let config = Arc::clone(&self.config);
            std::thread::spawn(move || {
                reply.complete_with(async move { Some(config) });
            });
            None
        }
    }

    #[tokio::test]
    async fn first_answering_provider_wins_and_later_providers_are_never_called() {
        let config = sample_config();
        let declining = Arc::new(RecordingProvider::declining("declining"));
        let answering = Arc::new(RecordingProvider::supplying_config("answering", Arc::clone(&config)));
        let never = Arc::new(RecordingProvider::supplying_config("never", sample_config()));
        let chain = ProviderChain::new(vec![declining.clone(), answering.clone(), never.clone()]);

        let resolved = chain.resolve_configuration("widget").await.expect("no contract violation");

        assert!(Arc::ptr_eq(&resolved.expect("configuration"), &config));
        assert_eq!(declining.configuration_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(answering.calls(), 1);
        assert_eq!(never.calls(), 0, "providers after the winner must not be invoked");
    }

    #[tokio::test]
    async fn providers_without_the_capability_are_skipped() {
        let definition_only = Arc::new(RecordingProvider::supplying_definition("definition-only", sample_definition()));
        let chain = ProviderChain::new(vec![definition_only.clone()]);

        let resolved = chain.resolve_configuration("widget").await.expect("no contract violation");

        assert!(resolved.is_none());
        assert_eq!(definition_only.calls(), 0);
    }

    #[tokio::test]
    async fn exhausted_chain_is_absent() {
        let chain = ProviderChain::new(vec![
            Arc::new(RecordingProvider::declining("a")),
            Arc::new(RecordingProvider::new("no-handlers", Capabilities::NONE)),
        ]);

        let definition = chain.resolve_definition("widget", &sample_config()).await.expect("no contract violation");

        assert!(definition.is_none());
        assert!(ProviderChain::default().resolve_configuration("widget").await.expect("empty chain").is_none());
    }

    #[tokio::test]
    async fn dropped_reply_counts_as_declined() {
        let config = sample_config();
        let chain = ProviderChain::new(vec![
            Arc::new(DroppingProvider),
            Arc::new(RecordingProvider::supplying_config("fallback", Arc::clone(&config)).immediate()),
        ]);

        let resolved = chain.resolve_configuration("widget").await.expect("no contract violation");

        assert!(Arc::ptr_eq(&resolved.expect("fallback configuration"), &config));
    }

    #[tokio::test]
    async fn reply_can_be_completed_from_a_thread_outside_the_runtime() {
        let config = sample_config();
        let chain = ProviderChain::new(vec![Arc::new(ThreadedProvider {
            config: Arc::clone(&config),
        })]);

        let resolved = chain.resolve_configuration("widget").await.expect("no contract violation");

        assert!(Arc::ptr_eq(&resolved.expect("configuration"), &config));
    }

    #[tokio::test]
    async fn synchronous_return_stops_the_walk_with_a_violation() {
        let mut offending = RecordingProvider::new("offending", Capabilities::CONFIGURATION);
        offending.configuration = Answer::ReturnSynchronously(sample_config());
        let fallback = Arc::new(RecordingProvider::supplying_config("fallback", sample_config()));
        let chain = ProviderChain::new(vec![Arc::new(offending), fallback.clone()]);

        let error = chain.resolve_configuration("widget").await.expect_err("contract violation");

        match error {
            ChainError::SynchronousReturn { provider, stage, suppressed } => {
                assert_eq!(provider, "offending");
                assert_eq!(stage, Stage::Configuration);
                assert!(suppressed);
            }
        }
        assert_eq!(fallback.calls(), 0);
    }

    #[test]
    fn chain_can_be_extended_and_replaced() {
        let chain = ProviderChain::default();
        assert!(chain.is_empty());

        chain.push(Arc::new(RecordingProvider::declining("a")));
        chain.push(Arc::new(RecordingProvider::declining("b")));
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.snapshot()[1].label(), "b");

        chain.replace(vec![Arc::new(RecordingProvider::declining("c"))]);
        let labels: Vec<String> = chain.snapshot().iter().map(|p| p.label().to_string()).collect();
        assert_eq!(labels, vec!["c".to_string()]);
    }
}
