//! Two-stage resolution of a single name through the provider chain.

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tracing::{debug, warn};

use crate::{
    provider::{ChainError, ProviderChain, chain},
    scheduler::Scheduler,
    types::Resolution,
};

/// Resolves a name by asking the chain for a configuration and then for a
/// definition built from it.
///
/// Holds no state of its own besides the chain and the scheduler used to
/// deliver completions; caching is the job of
/// [`DefinitionCache`](crate::cache::DefinitionCache).
#[derive(Debug, Clone, Default)]
pub struct ResolutionCoordinator {
    chain: ProviderChain,
    scheduler: Scheduler,
}

impl ResolutionCoordinator {
    pub fn new(chain: ProviderChain) -> Self {
        Self {
            chain,
            scheduler: Scheduler::ambient(),
        }
    }

    pub fn with_scheduler(chain: ProviderChain, scheduler: Scheduler) -> Self {
        Self { chain, scheduler }
    }

    pub fn chain(&self) -> &ProviderChain {
        &self.chain
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Resolve `name`, suspending at least once even when every provider
    /// answers immediately.
    pub async fn resolve(&self, name: &str) -> Resolution {
        tokio::task::yield_now().await;
        self.run_guarded(name).await
    }

    /// Resolve `name` on its own task and hand the outcome to `on_complete`.
    ///
    /// `on_complete` runs exactly once and never before this call returns.
    ///
    /// # Panics
    ///
    /// Panics outside a Tokio runtime unless the coordinator was built with
    /// an explicit runtime handle.
    pub fn resolve_with<F>(&self, name: &str, on_complete: F)
    where
        F: FnOnce(Resolution) + Send + 'static,
    {
        let coordinator = self.clone();
        let name = name.to_string();
        self.scheduler.spawn(async move {
            let resolution = coordinator.run_guarded(&name).await;
            on_complete(resolution);
        });
    }

    /// A panicking provider resolves to absence instead of taking the
    /// completion down with it.
    async fn run_guarded(&self, name: &str) -> Resolution {
        match AssertUnwindSafe(self.run(name)).catch_unwind().await {
            Ok(resolution) => resolution,
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|reason| reason.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(name = %name, reason = %reason, "provider panicked during resolution; resolving to absence");
                None
            }
        }
    }

    async fn run(&self, name: &str) -> Resolution {
        let providers = self.chain.snapshot();
        debug!(name = %name, provider_count = providers.len(), "resolution started");

        let config = match chain::resolve_configuration(&providers, name).await {
            Ok(Some(config)) => config,
            Ok(None) => {
                debug!(name = %name, "no provider supplied a configuration");
                return None;
            }
            Err(error) => {
                report_violation(name, &error);
                return None;
            }
        };

        match chain::resolve_definition(&providers, name, &config).await {
            Ok(Some(definition)) => {
                debug!(name = %name, "resolution completed");
                Some(definition)
            }
            Ok(None) => {
                debug!(name = %name, "no provider supplied a definition");
                None
            }
            Err(error) => {
                report_violation(name, &error);
                None
            }
        }
    }
}

fn report_violation(name: &str, error: &ChainError) {
    match error {
        ChainError::SynchronousReturn { suppressed: true, .. } => {
            debug!(name = %name, error = %error, "suppressed provider contract violation; resolving to absence");
        }
        ChainError::SynchronousReturn { .. } => {
            warn!(name = %name, error = %error, "provider contract violation; resolving to absence");
        }
    }
}
