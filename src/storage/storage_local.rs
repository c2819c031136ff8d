//! Browser local storage backend
//!
//! The primitive is a synchronous string key/value area ([`WebStorage`]). Two
//! areas are provided:
//! - [`MemoryWebStorage`] - insertion ordered, in memory
//! - [`DirWebStorage`] - one file per key under a directory, atomic writes
//!
//! Both enforce a byte quota the way browsers do (key and value lengths both
//! count). The adapter, [`LocalStorage`], only exposes the legacy slots in
//! [`LEGACY_LOCAL_STORAGE_KEYS`] when enumerating, because the same area is
//! shared with unrelated entries.

use crate::error::{StorageError, StorageResult};
use crate::storage::codec;
use crate::storage::constants::DEFAULT_LOCAL_STORAGE_QUOTA;
use crate::storage::storage_api::{utils, Storage, StorageType, StoreKey, StoreValues};
use async_trait::async_trait;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Keys that existed when local storage was last used as the primary store
pub const LEGACY_LOCAL_STORAGE_KEYS: [&str; 5] = [
    StoreKey::ConfigVersion.as_str(),
    StoreKey::Configs.as_str(),
    StoreKey::Settings.as_str(),
    StoreKey::MyCopilots.as_str(),
    StoreKey::ChatSessions.as_str(),
];

/// Whether `key` is one of [`LEGACY_LOCAL_STORAGE_KEYS`]
pub fn is_legacy_key(key: &str) -> bool {
    LEGACY_LOCAL_STORAGE_KEYS.contains(&key)
}

/// Synchronous string key/value area
pub trait WebStorage: Send + Sync {
    /// Stored text under `key`
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove `key`, if present
    fn remove_item(&self, key: &str) -> StorageResult<()>;

    /// Every key in the area, including ones this crate never wrote
    fn keys(&self) -> StorageResult<Vec<String>>;
}

fn check_quota(key: &str, required: usize, limit: Option<usize>) -> StorageResult<()> {
    match limit {
        Some(limit) if required > limit => Err(StorageError::QuotaExceeded {
            key: key.to_string(),
            required,
            limit,
        }),
        _ => Ok(()),
    }
}

fn poisoned(operation: &str) -> StorageError {
    StorageError::OperationFailed {
        operation: operation.to_string(),
        reason: "lock poisoned".to_string(),
    }
}

/// In-memory storage area
#[derive(Debug, Clone)]
pub struct MemoryWebStorage {
    items: Arc<RwLock<Vec<(String, String)>>>,
    quota: Option<usize>,
}

impl Default for MemoryWebStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWebStorage {
    /// Create an area with the default browser quota
    pub fn new() -> Self {
        Self::with_quota(Some(DEFAULT_LOCAL_STORAGE_QUOTA))
    }

    /// Create an area with `quota` bytes, or unbounded with `None`
    pub fn with_quota(quota: Option<usize>) -> Self {
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
            quota,
        }
    }
}

impl WebStorage for MemoryWebStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        let items = self.items.read().map_err(|_| poisoned("get_item"))?;
        Ok(items.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone()))
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut items = self.items.write().map_err(|_| poisoned("set_item"))?;

        let used: usize = items
            .iter()
            .filter(|(k, _)| k != key)
            .map(|(k, v)| k.len() + v.len())
            .sum();
        check_quota(key, used + key.len() + value.len(), self.quota)?;

        match items.iter().position(|(k, _)| k == key) {
            Some(index) => items[index].1 = value.to_string(),
            None => items.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        let mut items = self.items.write().map_err(|_| poisoned("remove_item"))?;
        items.retain(|(k, _)| k != key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let items = self.items.read().map_err(|_| poisoned("keys"))?;
        Ok(items.iter().map(|(k, _)| k.clone()).collect())
    }
}

const TEMP_PREFIX: &str = ".tmp-";

/// Storage area persisted as one file per key
#[derive(Debug, Clone)]
pub struct DirWebStorage {
    base_path: PathBuf,
    quota: Option<usize>,
}

impl DirWebStorage {
    /// Open (creating if needed) the area rooted at `base_path`
    pub fn new(base_path: impl Into<PathBuf>, quota: Option<usize>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).map_err(|e| StorageError::OperationFailed {
            operation: "create_base_directory".to_string(),
            reason: format!("Failed to create base directory: {}", e),
        })?;

        if !base_path.is_dir() {
            return Err(StorageError::OperationFailed {
                operation: "verify_base_directory".to_string(),
                reason: "Base path exists but is not a directory".to_string(),
            });
        }

        Ok(Self { base_path, quota })
    }

    /// Root directory of the area
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn item_path(&self, key: &str) -> StorageResult<PathBuf> {
        utils::validate_file_key(key)?;
        if key.starts_with(TEMP_PREFIX) {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                reason: "Key uses the reserved temporary-file prefix".to_string(),
            });
        }
        Ok(self.base_path.join(key))
    }

    /// Bytes used by every item except `skip`
    fn used_bytes(&self, skip: &str) -> StorageResult<usize> {
        let mut used = 0;
        for key in self.keys()? {
            if key == skip {
                continue;
            }
            let len = fs::metadata(self.base_path.join(&key))
                .map(|m| m.len() as usize)
                .map_err(|e| StorageError::OperationFailed {
                    operation: "get_file_metadata".to_string(),
                    reason: format!("Failed to get file metadata: {}", e),
                })?;
            used += key.len() + len;
        }
        Ok(used)
    }

    fn write_file(&self, key: &str, path: &Path, data: &[u8]) -> StorageResult<()> {
        let write_failed = |reason: String| StorageError::WriteFailed {
            key: key.to_string(),
            reason,
        };

        let temp_path = self
            .base_path
            .join(format!("{}{}", TEMP_PREFIX, uuid::Uuid::new_v4().simple()));

        {
            let file = File::create(&temp_path)
                .map_err(|e| write_failed(format!("Failed to create temporary file: {}", e)))?;
            let mut writer = BufWriter::new(file);
            writer
                .write_all(data)
                .and_then(|_| writer.flush())
                .map_err(|e| write_failed(format!("Failed to write temporary file: {}", e)))?;
        }

        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(write_failed(format!("Failed to rename temporary file: {}", e)));
        }

        Ok(())
    }
}

impl WebStorage for DirWebStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.item_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => Ok(Some(text)),
                Err(_) => {
                    warn!(key, "stored item is not valid UTF-8");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::OperationFailed {
                operation: "read_file".to_string(),
                reason: format!("Failed to read file: {}", e),
            }),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.item_path(key)?;
        let used = self.used_bytes(key)?;
        check_quota(key, used + key.len() + value.len(), self.quota)?;
        self.write_file(key, &path, value.as_bytes())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        let path = self.item_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::OperationFailed {
                operation: "delete_file".to_string(),
                reason: format!("Failed to delete file: {}", e),
            }),
        }
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| StorageError::OperationFailed {
            operation: "read_directory".to_string(),
            reason: format!("Failed to read directory: {}", e),
        })?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::OperationFailed {
                operation: "read_directory_entry".to_string(),
                reason: format!("Failed to read directory entry: {}", e),
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if !name.starts_with(TEMP_PREFIX) {
                    keys.push(name.to_string());
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// Local storage backend restricted to the legacy slots on enumeration
#[derive(Clone)]
pub struct LocalStorage {
    area: Arc<dyn WebStorage>,
}

impl LocalStorage {
    /// Create a backend over `area`
    pub fn new(area: Arc<dyn WebStorage>) -> Self {
        Self { area }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn get_storage_type(&self) -> StorageType {
        StorageType::LocalStorage
    }

    async fn set_store_value(&self, key: &str, value: &Value) -> StorageResult<()> {
        let json = codec::encode(key, value)?;
        self.area.set_item(key, &json)
    }

    async fn get_store_value(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self
            .area
            .get_item(key)?
            .and_then(|json| codec::decode(key, &json)))
    }

    async fn del_store_value(&self, key: &str) -> StorageResult<()> {
        self.area.remove_item(key)
    }

    async fn get_all_store_values(&self) -> StorageResult<StoreValues> {
        let mut values = StoreValues::new();
        for key in LEGACY_LOCAL_STORAGE_KEYS {
            if let Some(value) = self
                .area
                .get_item(key)?
                .and_then(|json| codec::decode(key, &json))
            {
                values.insert(key.to_string(), value);
            }
        }
        Ok(values)
    }

    async fn get_all_store_keys(&self) -> StorageResult<Vec<String>> {
        let keys: Vec<String> = self
            .area
            .keys()?
            .into_iter()
            .filter(|key| is_legacy_key(key))
            .collect();
        debug!(count = keys.len(), "legacy local storage keys");
        Ok(keys)
    }
}
