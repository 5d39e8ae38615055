//! Registration table consulted by the default provider.

use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::RegistrationError,
    types::{ResourceConfig, SharedConfig},
};

/// Explicit configurations keyed by resource name, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    registrations: Arc<RwLock<IndexMap<String, SharedConfig>>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `config` under `name`.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::EmptyName`] when `name` is blank
    /// - [`RegistrationError::InvalidConfig`] when `config` is JSON `null`
    /// - [`RegistrationError::AlreadyRegistered`] when `name` is taken
    pub fn register(&self, name: &str, config: ResourceConfig) -> Result<(), RegistrationError> {
        if name.trim().is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        if config.value() == &Value::Null {
            return Err(RegistrationError::InvalidConfig { name: name.to_string() });
        }

        let mut registrations = self.registrations.write().unwrap_or_else(PoisonError::into_inner);
        if registrations.contains_key(name) {
            return Err(RegistrationError::AlreadyRegistered { name: name.to_string() });
        }
        registrations.insert(name.to_string(), Arc::new(config));
        debug!(name = %name, "resource registered");
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registrations.read().unwrap_or_else(PoisonError::into_inner).contains_key(name)
    }

    /// Remove the registration for `name`, returning its configuration.
    pub fn unregister(&self, name: &str) -> Option<SharedConfig> {
        let removed = self.registrations.write().unwrap_or_else(PoisonError::into_inner).shift_remove(name);
        if removed.is_some() {
            debug!(name = %name, "resource unregistered");
        }
        removed
    }

    pub fn config_for(&self, name: &str) -> Option<SharedConfig> {
        self.registrations.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.registrations.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.registrations.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub(crate) fn snapshot(&self) -> IndexMap<String, SharedConfig> {
        self.registrations.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn restore(&self, registrations: IndexMap<String, SharedConfig>) {
        *self.registrations.write().unwrap_or_else(PoisonError::into_inner) = registrations;
    }
}
