//! Error types for the loader.
//!
//! Resolution itself never fails: absence is a regular outcome, and provider
//! contract violations are folded into absence by the coordinator. Errors
//! here cover registration and configuration only.

use std::path::PathBuf;

use thiserror::Error;

/// Rejected registration.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("resource name must not be empty")]
    EmptyName,

    #[error("invalid configuration for resource '{name}'")]
    InvalidConfig { name: String },

    #[error("resource '{name}' is already registered")]
    AlreadyRegistered { name: String },
}

/// Failure reading a loader configuration or registrations document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Top-level loader error.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
