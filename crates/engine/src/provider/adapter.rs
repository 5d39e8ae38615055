use std::{fmt, sync::Arc};

use super::{Capabilities, Reply, ResourceProvider};
use crate::types::{SharedConfig, SharedDefinition};

/// Provider written as plain async functions.
///
/// Wrap an implementation in [`AsyncProviderAdapter`] to place it in a
/// provider chain; the adapter runs each call on its own task and answers
/// through the reply handle, so the reply contract cannot be broken.
#[async_trait::async_trait]
pub trait AsyncResourceProvider: Send + Sync + fmt::Debug + 'static {
    fn label(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    async fn configuration(&self, _name: &str) -> Option<SharedConfig> {
        None
    }

    async fn definition(&self, _name: &str, _config: &SharedConfig) -> Option<SharedDefinition> {
        None
    }
}

#[derive(Debug)]
pub struct AsyncProviderAdapter<P> {
    inner: Arc<P>,
}

impl<P: AsyncResourceProvider> AsyncProviderAdapter<P> {
    pub fn new(provider: P) -> Self {
        Self { inner: Arc::new(provider) }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: AsyncResourceProvider> ResourceProvider for AsyncProviderAdapter<P> {
    fn label(&self) -> &str {
        self.inner.label()
    }

    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    fn resolve_configuration(&self, name: &str, reply: Reply<SharedConfig>) -> Option<SharedConfig> {
        let provider = Arc::clone(&self.inner);
        let name = name.to_string();
        reply.complete_with(async move { provider.configuration(&name).await });
        None
    }

    fn resolve_definition(&self, name: &str, config: &SharedConfig, reply: Reply<SharedDefinition>) -> Option<SharedDefinition> {
        let provider = Arc::clone(&self.inner);
        let name = name.to_string();
        let config = Arc::clone(config);
        reply.complete_with(async move { provider.definition(&name, &config).await });
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        provider::{ProviderChain, test_support::sample_config},
        types::Definition,
    };
    use serde_json::json;

    #[derive(Debug)]
    struct Catalog {
        config: SharedConfig,
    }

    #[async_trait::async_trait]
    impl AsyncResourceProvider for Catalog {
        fn label(&self) -> &str {
            "catalog"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::ALL
        }

        async fn configuration(&self, name: &str) -> Option<SharedConfig> {
            tokio::task::yield_now().await;
            (name == "known").then(|| Arc::clone(&self.config))
        }

        async fn definition(&self, name: &str, config: &SharedConfig) -> Option<SharedDefinition> {
            Arc::ptr_eq(config, &self.config).then(|| Arc::new(Definition::new(json!({ "name": name }))))
        }
    }

    #[derive(Debug)]
    struct Silent;

    #[async_trait::async_trait]
    impl AsyncResourceProvider for Silent {
        fn label(&self) -> &str {
            "silent"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::DEFINITION
        }
    }

    #[tokio::test]
    async fn adapter_answers_through_the_reply_handle() {
        let config = sample_config();
        let chain = ProviderChain::new(vec![Arc::new(AsyncProviderAdapter::new(Catalog {
            config: Arc::clone(&config),
        }))]);

        let resolved = chain.resolve_configuration("known").await.expect("no violation").expect("configuration");
        assert!(Arc::ptr_eq(&resolved, &config));
        assert!(chain.resolve_configuration("unknown").await.expect("no violation").is_none());

        let definition = chain.resolve_definition("known", &resolved).await.expect("no violation").expect("definition");
        assert_eq!(definition.value(), &json!({ "name": "known" }));
    }

    #[tokio::test]
    async fn default_async_methods_decline() {
        let adapter = Arc::new(AsyncProviderAdapter::new(Silent));
        assert_eq!(adapter.inner().label(), "silent");
        assert_eq!(adapter.capabilities(), Capabilities::DEFINITION);
        let chain = ProviderChain::new(vec![adapter]);

        let definition = chain.resolve_definition("any", &sample_config()).await.expect("no violation");

        assert!(definition.is_none());
    }
}
