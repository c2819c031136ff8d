//! Lazily built backend set and legacy storage discovery

use crate::config::StorageConfig;
use crate::error::{ConfigResult, StorageError, StorageResult};
use crate::platform::Platform;
use crate::storage::storage_api::{Storage, StorageType};
use crate::storage::{select_backends_for_platform, BackendHandles, StorageFactory};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

enum HandleSource {
    Config(StorageConfig),
    Handles(BackendHandles),
}

/// Owns the legacy backends of one platform.
///
/// Backends are built the first time they are asked for and then live as long
/// as the manager.
pub struct StorageManager {
    platform: Platform,
    source: HandleSource,
    storages: OnceCell<Vec<Arc<dyn Storage>>>,
}

impl StorageManager {
    /// Manager whose primitives are opened from `config`
    pub fn from_config(config: StorageConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            platform: config.platform(),
            source: HandleSource::Config(config),
            storages: OnceCell::new(),
        })
    }

    /// Manager over primitives the caller already opened
    pub fn with_handles(platform: Platform, handles: BackendHandles) -> Self {
        Self {
            platform,
            source: HandleSource::Handles(handles),
            storages: OnceCell::new(),
        }
    }

    /// Platform backends are selected for
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Legacy backends in probe order
    pub async fn legacy_storages(&self) -> StorageResult<&[Arc<dyn Storage>]> {
        let storages = self
            .storages
            .get_or_try_init(|| async {
                let kinds = select_backends_for_platform(self.platform);
                info!(platform = %self.platform, ?kinds, "building legacy storage backends");
                let handles = match &self.source {
                    HandleSource::Config(config) => {
                        BackendHandles::from_config(config, &kinds).await?
                    }
                    HandleSource::Handles(handles) => handles.clone(),
                };
                StorageFactory::legacy_storages(self.platform, &handles)
            })
            .await?;
        Ok(storages.as_slice())
    }

    /// The `kind` backend, if it is part of this platform's selection
    pub async fn storage(&self, kind: StorageType) -> StorageResult<Arc<dyn Storage>> {
        self.legacy_storages()
            .await?
            .iter()
            .find(|storage| storage.get_storage_type() == kind)
            .cloned()
            .ok_or_else(|| StorageError::BackendNotAvailable {
                backend: format!("{} on {}", kind, self.platform),
            })
    }

    /// First backend, in probe order, that holds any key.
    ///
    /// A backend whose key listing fails is logged and skipped.
    pub async fn discover_legacy_storage(&self) -> StorageResult<Option<Arc<dyn Storage>>> {
        for storage in self.legacy_storages().await? {
            match storage.get_all_store_keys().await {
                Ok(keys) if !keys.is_empty() => {
                    info!(backend = %storage.get_storage_type(), keys = keys.len(), "found legacy data");
                    return Ok(Some(Arc::clone(storage)));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(backend = %storage.get_storage_type(), error = %e, "skipping backend during discovery");
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocumentStoreBackend;
    use crate::storage::{DocumentStore, MemoryDocumentStore, MemoryWebStorage, WebStorage};
    use serde_json::json;
    use tempfile::TempDir;

    fn mobile_manager() -> (StorageManager, Arc<MemoryWebStorage>, Arc<MemoryDocumentStore>) {
        let area = Arc::new(MemoryWebStorage::new());
        let store = Arc::new(MemoryDocumentStore::new("chatboxstore"));
        let handles = BackendHandles::new()
            .with_web_storage(area.clone())
            .with_document_store(store.clone());
        (
            StorageManager::with_handles(Platform::Mobile, handles),
            area,
            store,
        )
    }

    #[tokio::test]
    async fn test_built_once() {
        let (manager, _area, _store) = mobile_manager();
        let first = manager.legacy_storages().await.unwrap().as_ptr();
        let second = manager.legacy_storages().await.unwrap().as_ptr();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_discovery_follows_priority() {
        let (manager, area, _store) = mobile_manager();
        assert!(manager.discover_legacy_storage().await.unwrap().is_none());

        area.set_item("settings", "{}").unwrap();
        let found = manager.discover_legacy_storage().await.unwrap().unwrap();
        assert_eq!(found.get_storage_type(), StorageType::LocalStorage);

        let indexed = manager.storage(StorageType::IndexedDb).await.unwrap();
        indexed.set_store_value("settings", &json!({"theme": "dark"})).await.unwrap();
        let found = manager.discover_legacy_storage().await.unwrap().unwrap();
        assert_eq!(found.get_storage_type(), StorageType::IndexedDb);
    }

    /// Document store whose key listing always fails
    struct BrokenKeysStore;

    #[async_trait::async_trait]
    impl DocumentStore for BrokenKeysStore {
        fn name(&self) -> &str {
            "broken"
        }
        async fn get_item(&self, _key: &str) -> StorageResult<Option<serde_json::Value>> {
            Ok(None)
        }
        async fn set_item(&self, _key: &str, _item: serde_json::Value) -> StorageResult<()> {
            Ok(())
        }
        async fn remove_item(&self, _key: &str) -> StorageResult<()> {
            Ok(())
        }
        async fn iterate(&self) -> StorageResult<Vec<(String, serde_json::Value)>> {
            Ok(Vec::new())
        }
        async fn keys(&self) -> StorageResult<Vec<String>> {
            Err(StorageError::OperationFailed {
                operation: "keys".to_string(),
                reason: "database is locked".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_discovery_skips_failing_backend() {
        let area = Arc::new(MemoryWebStorage::new());
        area.set_item("settings", "{\"theme\":\"dark\"}").unwrap();
        let handles = BackendHandles::new()
            .with_web_storage(area)
            .with_document_store(Arc::new(BrokenKeysStore));
        let manager = StorageManager::with_handles(Platform::Mobile, handles);

        let found = manager.discover_legacy_storage().await.unwrap().unwrap();
        assert_eq!(found.get_storage_type(), StorageType::LocalStorage);
    }

    #[tokio::test]
    async fn test_foreign_local_keys_do_not_count() {
        let (manager, area, _store) = mobile_manager();
        area.set_item("i18nextLng", "\"en\"").unwrap();
        assert!(manager.discover_legacy_storage().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_storage_outside_selection() {
        let (manager, _area, _store) = mobile_manager();
        assert!(matches!(
            manager.storage(StorageType::DesktopFile).await,
            Err(StorageError::BackendNotAvailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_from_config_desktop() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
            platform: Some(Platform::Desktop),
            document_store_backend: DocumentStoreBackend::Memory,
            ..Default::default()
        };
        let manager = StorageManager::from_config(config).unwrap();
        assert_eq!(manager.platform(), Platform::Desktop);

        let desktop = manager.storage(StorageType::DesktopFile).await.unwrap();
        desktop.set_store_value("configVersion", &json!(9)).await.unwrap();
        let found = manager.discover_legacy_storage().await.unwrap().unwrap();
        assert_eq!(found.get_store_value("configVersion").await.unwrap(), Some(json!(9)));
    }
}
