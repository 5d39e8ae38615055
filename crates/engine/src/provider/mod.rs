//! Provider plugin interface and the chain that walks it.
//!
//! Modules:
//! - `chain`: Ordered provider list and the first-responder walk
//! - `default`: Provider backed by the registration table
//! - `adapter`: Bridge for providers written as plain async functions

mod adapter;
pub(crate) mod chain;
mod default;

use std::{fmt, future::Future};

use tokio::sync::oneshot;
use tracing::trace;

use crate::{
    scheduler::Scheduler,
    types::{SharedConfig, SharedDefinition},
};

pub use adapter::{AsyncProviderAdapter, AsyncResourceProvider};
pub use chain::{ChainError, ProviderChain};
pub use default::DefaultProvider;

/// The two questions a provider can be asked during a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Configuration,
    Definition,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Definition => write!(f, "definition"),
        }
    }
}

/// Capabilities a provider declares. The chain consults these before invoking
/// a provider and skips it for any stage it does not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub configuration: bool,
    pub definition: bool,
}

impl Capabilities {
    pub const NONE: Self = Self {
        configuration: false,
        definition: false,
    };
    pub const CONFIGURATION: Self = Self {
        configuration: true,
        definition: false,
    };
    pub const DEFINITION: Self = Self {
        configuration: false,
        definition: true,
    };
    pub const ALL: Self = Self {
        configuration: true,
        definition: true,
    };

    pub fn supports(self, stage: Stage) -> bool {
        match stage {
            Stage::Configuration => self.configuration,
            Stage::Definition => self.definition,
        }
    }
}

/// Single-use completion handle passed to a provider.
///
/// A provider answers exactly once through this handle, either before
/// returning from the capability method or later from another task. Dropping
/// the handle without answering is treated the same as [`Reply::decline`].
#[derive(Debug)]
pub struct Reply<T> {
    sender: oneshot::Sender<Option<T>>,
    scheduler: Scheduler,
}

impl<T: Send + 'static> Reply<T> {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Option<T>>) {
        let (sender, receiver) = oneshot::channel();
        let reply = Self {
            sender,
            scheduler: Scheduler::current(),
        };
        (reply, receiver)
    }

    /// Deliver the provider's answer. `None` passes the question on to the
    /// next provider in the chain.
    pub fn complete(self, answer: Option<T>) {
        if self.sender.send(answer).is_err() {
            trace!("provider answer discarded; resolution is no longer waiting");
        }
    }

    /// Answer with a value, ending the walk for this stage.
    pub fn supply(self, value: T) {
        self.complete(Some(value));
    }

    /// Answer with absence.
    pub fn decline(self) {
        self.complete(None);
    }

    /// Spawn `future` on the runtime the resolution runs on and answer with
    /// its output. Safe to call from threads outside that runtime.
    pub fn complete_with<F>(self, future: F)
    where
        F: Future<Output = Option<T>> + Send + 'static,
    {
        let scheduler = self.scheduler.clone();
        scheduler.spawn(async move {
            let answer = future.await;
            self.complete(answer);
        });
    }
}

/// A pluggable source of configurations and definitions.
///
/// Answers travel through the [`Reply`] handle. The synchronous return value
/// is reserved: a provider must return `None`. Returning `Some` is a contract
/// violation and degrades the whole resolution to absence.
pub trait ResourceProvider: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn label(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Supply the configuration for `name`.
    fn resolve_configuration(&self, _name: &str, reply: Reply<SharedConfig>) -> Option<SharedConfig> {
        reply.decline();
        None
    }

    /// Build the definition for `name` from the configuration an earlier
    /// stage produced.
    fn resolve_definition(&self, _name: &str, _config: &SharedConfig, reply: Reply<SharedDefinition>) -> Option<SharedDefinition> {
        reply.decline();
        None
    }

    /// Silences the warning logged when this provider violates the reply
    /// contract. The resolution still degrades to absence.
    fn suppress_contract_violations(&self) -> bool {
        false
    }
}
