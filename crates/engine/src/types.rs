//! Value types passed through the provider chain and the definition cache.
//!
//! Both payloads are opaque to this crate: a configuration is whatever a
//! provider hands back for a name, and a definition is whatever a provider
//! builds from that configuration. They are shared behind `Arc` so every
//! waiter of a resolution observes the same instance.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Configuration supplied for a resource name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceConfig(pub Value);

impl ResourceConfig {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for ResourceConfig {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Fully materialized definition produced for a resource name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Definition(pub Value);

impl Definition {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for Definition {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

pub type SharedConfig = Arc<ResourceConfig>;
pub type SharedDefinition = Arc<Definition>;

/// Terminal outcome of resolving a name. `None` means no provider could
/// supply a value; it is never used to signal "still loading".
pub type Resolution = Option<SharedDefinition>;
