//! File configuration and the provider exclusion list.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::orchestrator::DEFAULT_TIMEOUT;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("software ID for exclusion must not be empty")]
    BlankExclusion,

    #[error("software ID {0} is already in the exclusion list")]
    DuplicateExclusion(String),
}

/// Settings read from `upkeep.toml`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Per-installer timeout in seconds.
    pub timeout: u64,
    /// Ask providers for release data newer than their built-in data.
    pub auto_get_newer: bool,
    /// Provider IDs to leave alone.
    pub exclude: Vec<String>,
    /// Override for the installer cache directory.
    pub cache_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            auto_get_newer: true,
            exclude: Vec::new(),
            cache_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load settings if the file exists, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) if p.exists() => {
                tracing::debug!("Loading settings from {}", p.display());
                Self::load(p)
            }
            _ => Ok(Self::default()),
        }
    }
}

/// Lowercased, duplicate-free set of provider IDs to skip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionList(Vec<String>);

impl ExclusionList {
    /// Build the list, rejecting blank and repeated IDs.
    pub fn parse<I, S>(ids: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Vec::new();
        for id in ids {
            let id = id.as_ref().trim().to_lowercase();
            if id.is_empty() {
                return Err(ConfigError::BlankExclusion);
            }
            if list.contains(&id) {
                return Err(ConfigError::DuplicateExclusion(id));
            }
            list.push(id);
        }
        Ok(Self(list))
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, id: &str) -> bool {
        let id = id.to_lowercase();
        self.0.iter().any(|e| *e == id)
    }

    /// True if any of `ids` is excluded.
    pub fn excludes_any(&self, ids: &[String]) -> bool {
        ids.iter().any(|id| self.contains(id))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}
