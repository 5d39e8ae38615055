use std::sync::Arc;

use serde_json::json;

use super::{Capabilities, Reply, ResourceProvider};
use crate::{
    registry::ResourceRegistry,
    types::{Definition, SharedConfig, SharedDefinition},
};

/// Provider answering from the explicit registrations in a [`ResourceRegistry`].
///
/// Configuration comes straight from the registry. The definition wraps the
/// registered configuration together with the resource name; turning it into
/// anything richer is left to the consumer.
#[derive(Debug, Clone)]
pub struct DefaultProvider {
    registry: ResourceRegistry,
}

impl DefaultProvider {
    pub const LABEL: &'static str = "default";

    pub fn new(registry: ResourceRegistry) -> Self {
        Self { registry }
    }
}

impl ResourceProvider for DefaultProvider {
    fn label(&self) -> &str {
        Self::LABEL
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn resolve_configuration(&self, name: &str, reply: Reply<SharedConfig>) -> Option<SharedConfig> {
        reply.complete(self.registry.config_for(name));
        None
    }

    fn resolve_definition(&self, name: &str, config: &SharedConfig, reply: Reply<SharedDefinition>) -> Option<SharedDefinition> {
        let definition = Definition::new(json!({
            "name": name,
            "config": config.value(),
        }));
        reply.supply(Arc::new(definition));
        None
    }
}
