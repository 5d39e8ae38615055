//! # Defcache Engine
//!
//! Resolves resource names into definitions through an ordered chain of
//! pluggable providers and caches the outcome per name.
//!
//! ## Key Features
//!
//! - **Provider Chain**: First provider to answer wins; later providers are never invoked
//! - **Two-Stage Resolution**: A configuration is resolved first, then a definition from it
//! - **Single-Flight Cache**: Concurrent requests for one name share a single resolution
//! - **Always Asynchronous**: Completions are delivered on a later scheduling turn, even for
//!   providers that answer immediately
//!
//! ## Usage
//!
//! ```rust
//! use defcache_engine::{ResourceConfig, ResourceLoader};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = ResourceLoader::new();
//! loader.register("user-card", ResourceConfig::new(json!({ "template": "<div/>" })))?;
//!
//! let definition = loader.get("user-card").await.expect("registered");
//! assert_eq!(definition.value()["name"], "user-card");
//!
//! assert!(loader.get("unknown").await.is_none());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`provider`**: Provider trait, reply handles and the chain walker
//! - **`coordinator`**: Two-stage resolution of one name
//! - **`cache`**: Name-keyed outcomes with in-flight coalescing
//! - **`registry`**: Explicit registrations consulted by the default provider
//! - **`loader`**: Facade and process-wide instance
//! - **`config`**: Loader configuration and registrations documents

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod loader;
pub mod provider;
pub mod registry;
pub mod scheduler;
pub mod types;

pub use cache::{DefinitionCache, EntryState, PendingInvalidation};
pub use config::{LoaderConfig, RegistrationsDocument, default_config_path, expand_tilde, load_registrations_file};
pub use coordinator::ResolutionCoordinator;
pub use error::{ConfigError, LoaderError, RegistrationError};
pub use loader::{LoaderSnapshot, ResourceLoader, loader};
pub use provider::{
    AsyncProviderAdapter, AsyncResourceProvider, Capabilities, ChainError, DefaultProvider, ProviderChain, Reply, ResourceProvider, Stage,
};
pub use registry::ResourceRegistry;
pub use scheduler::Scheduler;
pub use types::{Definition, Resolution, ResourceConfig, SharedConfig, SharedDefinition};
