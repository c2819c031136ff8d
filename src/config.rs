//! Storage configuration
//!
//! [`StorageConfig`] tells the factory where each primitive keeps its data.
//! Every field has a default, so an empty JSON object (or no file at all) is a
//! valid configuration. Environment variables override the file.

use crate::error::{ConfigError, ConfigResult};
use crate::platform::{Platform, PLATFORM_ENV};
use crate::storage::constants::{DEFAULT_DOCUMENT_STORE_NAME, DEFAULT_LOCAL_STORAGE_QUOTA};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable overriding [`StorageConfig::data_dir`]
pub const DATA_DIR_ENV: &str = "CHAT_STORAGE_DATA_DIR";

/// Which primitive backs the document store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStoreBackend {
    /// Process memory; nothing survives a restart
    Memory,
    /// SQLite file under the data directory (`sqlite` feature)
    Sqlite,
}

impl Default for DocumentStoreBackend {
    fn default() -> Self {
        if cfg!(feature = "sqlite") {
            DocumentStoreBackend::Sqlite
        } else {
            DocumentStoreBackend::Memory
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for every on-disk primitive
    pub data_dir: PathBuf,
    /// Platform override; detected when absent
    pub platform: Option<Platform>,
    /// File name of the desktop store, relative to `data_dir`
    pub desktop_store_file: String,
    /// Directory of the local storage area, relative to `data_dir`
    pub local_storage_dir: String,
    /// Byte quota of the local storage area
    pub local_storage_quota_bytes: usize,
    /// Document store instance name
    pub document_store_name: String,
    /// Document store primitive
    pub document_store_backend: DocumentStoreBackend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./chat-storage"),
            platform: None,
            desktop_store_file: "config.json".to_string(),
            local_storage_dir: "local-storage".to_string(),
            local_storage_quota_bytes: DEFAULT_LOCAL_STORAGE_QUOTA,
            document_store_name: DEFAULT_DOCUMENT_STORE_NAME.to_string(),
            document_store_backend: DocumentStoreBackend::default(),
        }
    }
}

impl StorageConfig {
    /// Load a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply [`DATA_DIR_ENV`] and [`PLATFORM_ENV`] on top of this configuration.
    ///
    /// An unknown platform name is ignored with a warning, as in
    /// [`Platform::detect`].
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(DATA_DIR_ENV) {
            if !dir.is_empty() {
                self.data_dir = PathBuf::from(dir);
            }
        }
        if let Some(name) = lookup(PLATFORM_ENV) {
            match name.parse::<Platform>() {
                Ok(platform) => self.platform = Some(platform),
                Err(e) => warn!(error = %e, "ignoring {}", PLATFORM_ENV),
            }
        }
        self
    }

    /// Reject values no primitive can work with
    pub fn validate(&self) -> ConfigResult<()> {
        let non_empty = [
            ("desktop_store_file", &self.desktop_store_file),
            ("local_storage_dir", &self.local_storage_dir),
            ("document_store_name", &self.document_store_name),
        ];
        for (field, value) in non_empty {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        if self.local_storage_quota_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "local_storage_quota_bytes".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.document_store_backend == DocumentStoreBackend::Sqlite && !cfg!(feature = "sqlite") {
            return Err(ConfigError::InvalidValue {
                field: "document_store_backend".to_string(),
                reason: "sqlite support is not compiled in".to_string(),
            });
        }
        Ok(())
    }

    /// The platform to select backends for
    pub fn platform(&self) -> Platform {
        Platform::detect(self.platform)
    }

    /// Full path of the desktop store file
    pub fn desktop_store_path(&self) -> PathBuf {
        self.data_dir.join(&self.desktop_store_file)
    }

    /// Full path of the local storage directory
    pub fn local_storage_path(&self) -> PathBuf {
        self.data_dir.join(&self.local_storage_dir)
    }

    /// Full path of the document store database
    pub fn document_store_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.sqlite", self.document_store_name))
    }
}
