use crate::error::{FolioError, Result};
use crate::resource::UnknownAttributes;
use crate::storage::InverseIndexStrategy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub content: ContentConfig,
}

/// Metadata backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default)]
    pub backend: MetadataBackend,
    #[serde(default = "default_metadata_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub inverse_index: InverseIndexStrategy,
    #[serde(default)]
    pub unknown_attributes: UnknownAttributes,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            backend: MetadataBackend::default(),
            path: default_metadata_path(),
            inverse_index: InverseIndexStrategy::default(),
            unknown_attributes: UnknownAttributes::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataBackend {
    Memory,
    #[default]
    Sqlite,
}

/// Content backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default)]
    pub backend: ContentBackend,
    #[serde(default = "default_content_path")]
    pub path: PathBuf,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            backend: ContentBackend::default(),
            path: default_content_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentBackend {
    Memory,
    #[default]
    Disk,
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from("folio-data/metadata.db")
}

fn default_content_path() -> PathBuf {
    PathBuf::from("folio-data/files")
}

impl Config {
    /// Load from a configuration file, with `FOLIO_`-prefixed environment
    /// variables (`FOLIO_METADATA__BACKEND=memory`) layered on top.
    pub fn from_file(path: &str) -> Result<Self> {
        Self::load(Some(path))
    }

    /// Defaults plus environment overrides, for runs without a file.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Every backend in memory; nothing touches disk.
    pub fn in_memory() -> Self {
        Self {
            metadata: MetadataConfig {
                backend: MetadataBackend::Memory,
                ..MetadataConfig::default()
            },
            content: ContentConfig {
                backend: ContentBackend::Memory,
                ..ContentConfig::default()
            },
        }
    }

    fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path));
        }

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix("FOLIO")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| FolioError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| FolioError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Rebase relative store paths onto `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        if self.metadata.path.is_relative() {
            self.metadata.path = root.join(&self.metadata.path);
        }
        if self.content.path.is_relative() {
            self.content.path = root.join(&self.content.path);
        }
        self
    }
}
