//! Loader configuration and registrations documents.
//!
//! The configuration file is JSON and lives at
//! `~/.config/defcache/config.json` on most platforms; set
//! `DEFCACHE_CONFIG_PATH` to point elsewhere. A missing file yields the
//! defaults.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use dirs_next::{config_dir, home_dir};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{cache::PendingInvalidation, error::ConfigError, types::ResourceConfig};

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "DEFCACHE_CONFIG_PATH";

pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Effect of invalidating a name whose resolution is still in flight.
    pub pending_invalidation: PendingInvalidation,
    /// Registrations document loaded when the configuration is applied.
    pub registrations_path: Option<String>,
    /// Inline registrations, applied in declaration order.
    pub registrations: IndexMap<String, Value>,
}

impl LoaderConfig {
    /// Load from [`default_config_path`].
    ///
    /// A missing file yields the defaults; an unparsable one is logged and
    /// also yields the defaults. Other I/O failures are returned.
    pub fn load() -> Result<Self, ConfigError> {
        let path = default_config_path();
        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    debug!(path = %path.display(), "loaded loader configuration");
                    Ok(config)
                }
                Err(error) => {
                    warn!(
                        path = %path.display(),
                        error = %error,
                        "Failed to parse loader configuration; using defaults"
                    );
                    Ok(Self::default())
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io { path, source }),
        }
    }

    /// Load from an explicit path. Unlike [`LoaderConfig::load`], every
    /// failure is returned.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Location of the registrations document, with `~` expanded.
    pub fn registrations_file(&self) -> Option<PathBuf> {
        self.registrations_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(expand_tilde)
    }
}

/// Document listing resource registrations.
///
/// ```yaml
/// registrations:
///   user-card:
///     template: "<div/>"
/// ```
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RegistrationsDocument {
    #[serde(default)]
    pub registrations: IndexMap<String, Value>,
}

/// Read a registrations document. Files ending in `.json` are parsed as
/// JSON, everything else as YAML.
pub fn load_registrations_file(path: impl AsRef<Path>) -> Result<IndexMap<String, ResourceConfig>, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
    let document: RegistrationsDocument = if is_json {
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?
    };

    debug!(
        path = %path.display(),
        registration_count = document.registrations.len(),
        "loaded registrations document"
    );
    Ok(document
        .registrations
        .into_iter()
        .map(|(name, value)| (name, ResourceConfig::new(value)))
        .collect())
}

/// Get the default path for the loader configuration file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("defcache")
        .join(CONFIG_FILE_NAME)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    if trimmed == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = trimmed.strip_prefix("~/").or_else(|| trimmed.strip_prefix("~\\")) {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(trimmed)
}
