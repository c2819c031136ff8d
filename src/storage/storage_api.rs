//! Storage contract shared by every backend
//!
//! This module provides the uniform key/value interface ([`Storage`]) that all
//! backends implement, the fixed set of persisted slots ([`StoreKey`]) and the
//! backend labels ([`StorageType`]).

use crate::error::{StorageError, StorageResult};
use crate::storage::codec;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A mapping from key to decoded value, as returned by bulk reads
pub type StoreValues = serde_json::Map<String, Value>;

/// Persisted slots used by the chat client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreKey {
    /// Schema version of the stored configuration
    #[serde(rename = "configVersion")]
    ConfigVersion,
    /// Configuration blob
    #[serde(rename = "configs")]
    Configs,
    /// User settings blob
    #[serde(rename = "settings")]
    Settings,
    /// Saved assistants
    #[serde(rename = "myCopilots")]
    MyCopilots,
    /// Chat sessions
    #[serde(rename = "chat-sessions")]
    ChatSessions,
}

impl StoreKey {
    /// Every slot, in declaration order
    pub const ALL: [StoreKey; 5] = [
        StoreKey::ConfigVersion,
        StoreKey::Configs,
        StoreKey::Settings,
        StoreKey::MyCopilots,
        StoreKey::ChatSessions,
    ];

    /// The string this slot is persisted under
    pub const fn as_str(self) -> &'static str {
        match self {
            StoreKey::ConfigVersion => "configVersion",
            StoreKey::Configs => "configs",
            StoreKey::Settings => "settings",
            StoreKey::MyCopilots => "myCopilots",
            StoreKey::ChatSessions => "chat-sessions",
        }
    }
}

impl AsRef<str> for StoreKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKey {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StoreKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| StorageError::InvalidKey {
                key: s.to_string(),
                reason: "not a known store key".to_string(),
            })
    }
}

/// Storage backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageType {
    /// JSON file owned by the desktop host process, reached over IPC
    DesktopFile,
    /// Browser local storage
    LocalStorage,
    /// Embedded document store
    #[serde(rename = "INDEXEDDB")]
    IndexedDb,
    /// Mobile database (disabled)
    MobileSqlite,
}

impl StorageType {
    /// Constant label identifying the backend
    pub const fn label(self) -> &'static str {
        match self {
            StorageType::DesktopFile => "DESKTOP_FILE",
            StorageType::LocalStorage => "LOCAL_STORAGE",
            StorageType::IndexedDb => "INDEXEDDB",
            StorageType::MobileSqlite => "MOBILE_SQLITE",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StorageType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            StorageType::DesktopFile,
            StorageType::LocalStorage,
            StorageType::IndexedDb,
            StorageType::MobileSqlite,
        ]
        .into_iter()
        .find(|kind| kind.label().eq_ignore_ascii_case(s))
        .ok_or_else(|| StorageError::BackendNotAvailable {
            backend: s.to_string(),
        })
    }
}

/// Key/value contract implemented by every backend
///
/// Values cross the backend boundary as JSON text (see [`codec`]). Reads
/// report a missing or undecodable entry as `Ok(None)`; only a failing
/// primitive produces an error.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Backend label
    fn get_storage_type(&self) -> StorageType;

    /// Write `value` under `key`, replacing any previous value
    async fn set_store_value(&self, key: &str, value: &Value) -> StorageResult<()>;

    /// Read the value under `key`
    async fn get_store_value(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Remove `key`; succeeds when the key is absent
    async fn del_store_value(&self, key: &str) -> StorageResult<()>;

    /// Every key/value pair visible to this backend
    async fn get_all_store_values(&self) -> StorageResult<StoreValues>;

    /// Every key visible to this backend
    async fn get_all_store_keys(&self) -> StorageResult<Vec<String>>;

    /// Write every entry of `values`, one key at a time.
    ///
    /// Not atomic: the first failure is returned and keys written before it
    /// stay written.
    async fn set_all_store_values(&self, values: &StoreValues) -> StorageResult<()> {
        for (key, value) in values {
            self.set_store_value(key, value).await?;
        }
        Ok(())
    }
}

/// Typed convenience methods available on every [`Storage`]
#[async_trait]
pub trait StorageExt: Storage {
    /// Read `key` and deserialize it into `T`; a shape mismatch reads as `None`
    async fn get_typed<T>(&self, key: &str) -> StorageResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let value = match self.get_store_value(key).await? {
            Some(value) => value,
            None => return Ok(None),
        };
        match serde_json::from_value(value) {
            Ok(typed) => Ok(Some(typed)),
            Err(e) => {
                tracing::warn!(key, error = %e, "stored value has an unexpected shape");
                Ok(None)
            }
        }
    }

    /// Serialize `value` and write it under `key`
    async fn set_typed<T>(&self, key: &str, value: &T) -> StorageResult<()>
    where
        T: Serialize + Sync,
    {
        let value = codec::to_value(key, value)?;
        self.set_store_value(key, &value).await
    }

    /// Whether the backend holds any visible entry
    async fn has_data(&self) -> StorageResult<bool> {
        Ok(!self.get_all_store_keys().await?.is_empty())
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}

/// Utility functions for storage keys
pub mod utils {
    use super::*;
    use crate::storage::constants::MAX_KEY_LENGTH;

    /// Validate storage key
    pub fn validate_key(key: &str) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                reason: "Key cannot be empty".to_string(),
            });
        }

        if key.len() > MAX_KEY_LENGTH {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                reason: format!("Key too long (max {} characters)", MAX_KEY_LENGTH),
            });
        }

        if key.contains('\0') || key.contains('\n') || key.contains('\r') {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                reason: "Key contains invalid characters".to_string(),
            });
        }

        Ok(())
    }

    /// Validate a key that will be used as a file name
    pub fn validate_file_key(key: &str) -> StorageResult<()> {
        validate_key(key)?;

        if key == "." || key == ".." || key.contains('/') || key.contains('\\') {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                reason: "Key cannot contain path separators".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_key_names() {
        assert_eq!(StoreKey::ConfigVersion.as_str(), "configVersion");
        assert_eq!(StoreKey::ChatSessions.as_str(), "chat-sessions");
        assert_eq!("myCopilots".parse::<StoreKey>().unwrap(), StoreKey::MyCopilots);
        assert!("unknown".parse::<StoreKey>().is_err());
    }

    #[test]
    fn test_store_key_serde_matches_as_str() {
        for key in StoreKey::ALL {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
    }

    #[test]
    fn test_storage_type_labels() {
        assert_eq!(StorageType::DesktopFile.label(), "DESKTOP_FILE");
        assert_eq!(StorageType::IndexedDb.to_string(), "INDEXEDDB");
        assert_eq!(
            "local_storage".parse::<StorageType>().unwrap(),
            StorageType::LocalStorage
        );
        assert_eq!(
            serde_json::to_string(&StorageType::MobileSqlite).unwrap(),
            "\"MOBILE_SQLITE\""
        );
    }

    #[test]
    fn test_validate_key() {
        assert!(utils::validate_key("settings").is_ok());
        assert!(utils::validate_key("").is_err());
        assert!(utils::validate_key("key\0with\0nulls").is_err());
        assert!(utils::validate_key("key\nwith\nnewlines").is_err());
        assert!(utils::validate_key(&"k".repeat(2000)).is_err());
    }

    #[test]
    fn test_validate_file_key() {
        assert!(utils::validate_file_key("chat-sessions").is_ok());
        assert!(utils::validate_file_key("a/b").is_err());
        assert!(utils::validate_file_key("..").is_err());
    }
}
