//! Storage module for chat client persistence
//!
//! This module provides a unified key/value interface with four backend implementations:
//! - **Desktop file storage** - JSON file owned by the host process, reached over IPC
//! - **Local storage** - Browser local storage area, restricted to legacy keys
//! - **Document store** - Named asynchronous key/value instance ("IndexedDB")
//! - **Mobile database** - Disabled placeholder, every operation is a no-op
//!
//! All backends implement [`Storage`]. Which ones exist on a given platform,
//! and in what order they should be probed for old user data, is decided by
//! [`select_backends_for_platform`].
//!
//! # Examples
//!
//! ```rust
//! use chat_storage::storage::{LocalStorage, MemoryWebStorage, Storage, StoreKey};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = LocalStorage::new(Arc::new(MemoryWebStorage::new()));
//!
//! storage
//!     .set_store_value(StoreKey::Settings.as_str(), &json!({"theme": "dark"}))
//!     .await?;
//!
//! let settings = storage.get_store_value(StoreKey::Settings.as_str()).await?;
//! assert_eq!(settings, Some(json!({"theme": "dark"})));
//! # Ok(())
//! # }
//! ```

// Core storage API and types
pub mod storage_api;
pub mod codec;

// Primitives
pub mod document_store;

// Storage backend implementations
pub mod storage_ipc;
pub mod storage_local;
pub mod storage_indexed;
pub mod storage_mobile;

pub mod manager;

// Re-export main types for convenience
pub use storage_api::{Storage, StorageExt, StorageType, StoreKey, StoreValues};

pub use document_store::{DocumentStore, MemoryDocumentStore};
#[cfg(feature = "sqlite")]
pub use document_store::SqliteDocumentStore;
pub use manager::StorageManager;
pub use storage_indexed::IndexedDbStorage;
pub use storage_ipc::{
    spawn_store_host, ChannelTransport, DesktopFileStorage, IpcReply, IpcRequest, IpcTransport,
    StoreHost,
};
pub use storage_local::{
    DirWebStorage, LocalStorage, MemoryWebStorage, WebStorage, LEGACY_LOCAL_STORAGE_KEYS,
};
pub use storage_mobile::MobileSqliteStorage;

use crate::config::{DocumentStoreBackend, StorageConfig};
use crate::error::{StorageError, StorageResult};
use crate::platform::Platform;
use std::sync::Arc;
use tracing::debug;

/// Storage constants
pub mod constants {
    //! Constants used throughout the storage module

    /// Maximum storage key length
    pub const MAX_KEY_LENGTH: usize = 1024;

    /// Default local storage quota (5 MiB, what browsers grant per origin)
    pub const DEFAULT_LOCAL_STORAGE_QUOTA: usize = 5 * 1024 * 1024;

    /// Default document store instance name
    pub const DEFAULT_DOCUMENT_STORE_NAME: &str = "chatboxstore";
}

/// Backends holding legacy data on `platform`, in the order they should be probed
pub fn select_backends_for_platform(platform: Platform) -> Vec<StorageType> {
    match platform {
        Platform::Desktop => vec![StorageType::DesktopFile],
        Platform::Mobile => vec![
            StorageType::IndexedDb,
            StorageType::MobileSqlite,
            StorageType::LocalStorage,
        ],
        Platform::Web => vec![StorageType::LocalStorage],
    }
}

/// Primitive handles backends are built on
#[derive(Clone, Default)]
pub struct BackendHandles {
    ipc: Option<Arc<dyn IpcTransport>>,
    web_storage: Option<Arc<dyn WebStorage>>,
    document_store: Option<Arc<dyn DocumentStore>>,
}

impl BackendHandles {
    /// No primitives; add them with the `with_*` methods
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `ipc` for the desktop backend
    pub fn with_ipc(mut self, ipc: Arc<dyn IpcTransport>) -> Self {
        self.ipc = Some(ipc);
        self
    }

    /// Use `area` for the local storage backend
    pub fn with_web_storage(mut self, area: Arc<dyn WebStorage>) -> Self {
        self.web_storage = Some(area);
        self
    }

    /// Use `store` for the document store backend
    pub fn with_document_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.document_store = Some(store);
        self
    }

    /// Open the primitives `kinds` need, as described by `config`
    pub async fn from_config(config: &StorageConfig, kinds: &[StorageType]) -> StorageResult<Self> {
        let mut handles = Self::new();

        for kind in kinds {
            match kind {
                StorageType::DesktopFile if handles.ipc.is_none() => {
                    let host = StoreHost::open(config.desktop_store_path()).await?;
                    handles.ipc = Some(Arc::new(spawn_store_host(host)));
                }
                StorageType::LocalStorage if handles.web_storage.is_none() => {
                    let area = DirWebStorage::new(
                        config.local_storage_path(),
                        Some(config.local_storage_quota_bytes),
                    )?;
                    handles.web_storage = Some(Arc::new(area));
                }
                StorageType::IndexedDb if handles.document_store.is_none() => {
                    handles.document_store = Some(open_document_store(config)?);
                }
                _ => {}
            }
        }

        Ok(handles)
    }
}

fn open_document_store(config: &StorageConfig) -> StorageResult<Arc<dyn DocumentStore>> {
    match config.document_store_backend {
        DocumentStoreBackend::Memory => Ok(Arc::new(MemoryDocumentStore::new(
            config.document_store_name.clone(),
        ))),
        #[cfg(feature = "sqlite")]
        DocumentStoreBackend::Sqlite => Ok(Arc::new(SqliteDocumentStore::open(
            config.document_store_path(),
            config.document_store_name.clone(),
        )?)),
        #[cfg(not(feature = "sqlite"))]
        DocumentStoreBackend::Sqlite => Err(StorageError::BackendNotAvailable {
            backend: "sqlite document store".to_string(),
        }),
    }
}

/// Storage factory for creating backend instances
pub struct StorageFactory;

impl StorageFactory {
    /// Create the `kind` backend on top of `handles`
    pub fn create(kind: StorageType, handles: &BackendHandles) -> StorageResult<Arc<dyn Storage>> {
        let missing = || StorageError::BackendNotAvailable {
            backend: kind.label().to_string(),
        };

        let storage: Arc<dyn Storage> = match kind {
            StorageType::DesktopFile => {
                Arc::new(DesktopFileStorage::new(handles.ipc.clone().ok_or_else(missing)?))
            }
            StorageType::LocalStorage => Arc::new(LocalStorage::new(
                handles.web_storage.clone().ok_or_else(missing)?,
            )),
            StorageType::IndexedDb => Arc::new(IndexedDbStorage::new(
                handles.document_store.clone().ok_or_else(missing)?,
            )),
            StorageType::MobileSqlite => Arc::new(MobileSqliteStorage::new()),
        };

        debug!(backend = %kind, "storage backend created");
        Ok(storage)
    }

    /// Create every legacy backend of `platform`, in probe order
    pub fn legacy_storages(
        platform: Platform,
        handles: &BackendHandles,
    ) -> StorageResult<Vec<Arc<dyn Storage>>> {
        select_backends_for_platform(platform)
            .into_iter()
            .map(|kind| Self::create(kind, handles))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_selection_order() {
        assert_eq!(
            select_backends_for_platform(Platform::Desktop),
            vec![StorageType::DesktopFile]
        );
        assert_eq!(
            select_backends_for_platform(Platform::Mobile),
            vec![
                StorageType::IndexedDb,
                StorageType::MobileSqlite,
                StorageType::LocalStorage
            ]
        );
        assert_eq!(
            select_backends_for_platform(Platform::Web),
            vec![StorageType::LocalStorage]
        );
    }

    #[test]
    fn test_constants() {
        assert_eq!(constants::MAX_KEY_LENGTH, 1024);
        assert_eq!(constants::DEFAULT_LOCAL_STORAGE_QUOTA, 5 * 1024 * 1024);
        assert_eq!(constants::DEFAULT_DOCUMENT_STORE_NAME, "chatboxstore");
    }

    #[test]
    fn test_factory_missing_primitive() {
        let handles = BackendHandles::new();
        assert!(matches!(
            StorageFactory::create(StorageType::DesktopFile, &handles),
            Err(StorageError::BackendNotAvailable { .. })
        ));
        assert!(StorageFactory::create(StorageType::MobileSqlite, &handles).is_ok());
    }

    #[test]
    fn test_factory_mobile_order() {
        let handles = BackendHandles::new()
            .with_web_storage(Arc::new(MemoryWebStorage::new()))
            .with_document_store(Arc::new(MemoryDocumentStore::new("chatboxstore")));

        let kinds: Vec<StorageType> = StorageFactory::legacy_storages(Platform::Mobile, &handles)
            .unwrap()
            .iter()
            .map(|s| s.get_storage_type())
            .collect();
        assert_eq!(kinds, select_backends_for_platform(Platform::Mobile));
    }

    #[tokio::test]
    async fn test_handles_from_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
            document_store_backend: DocumentStoreBackend::Memory,
            ..Default::default()
        };

        let kinds = [StorageType::DesktopFile, StorageType::LocalStorage];
        let handles = BackendHandles::from_config(&config, &kinds).await.unwrap();

        let desktop = StorageFactory::create(StorageType::DesktopFile, &handles).unwrap();
        desktop.set_store_value("settings", &json!({"a": 1})).await.unwrap();
        assert!(config.desktop_store_path().exists());

        let local = StorageFactory::create(StorageType::LocalStorage, &handles).unwrap();
        local.set_store_value("configs", &json!([])).await.unwrap();
        assert!(config.local_storage_path().join("configs").exists());

        assert!(StorageFactory::create(StorageType::IndexedDb, &handles).is_err());
    }
}
