//! Integration tests for the chat-storage library

use chat_storage::prelude::*;
use chat_storage::storage::{
    spawn_store_host, DesktopFileStorage, DocumentStore, IndexedDbStorage, LocalStorage,
    MemoryDocumentStore, MemoryWebStorage, MobileSqliteStorage, StoreHost, WebStorage,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

/// One instance of every real backend, plus the raw primitives behind them
struct Backends {
    desktop: DesktopFileStorage,
    local: LocalStorage,
    indexed: IndexedDbStorage,
    local_area: Arc<MemoryWebStorage>,
    document_store: Arc<MemoryDocumentStore>,
    _temp_dir: TempDir,
}

async fn create_backends() -> Backends {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let host = StoreHost::open(temp_dir.path().join("config.json"))
        .await
        .expect("Failed to open store host");
    let local_area = Arc::new(MemoryWebStorage::new());
    let document_store = Arc::new(MemoryDocumentStore::new("chatboxstore"));

    Backends {
        desktop: DesktopFileStorage::new(Arc::new(spawn_store_host(host))),
        local: LocalStorage::new(local_area.clone()),
        indexed: IndexedDbStorage::new(document_store.clone()),
        local_area,
        document_store,
        _temp_dir: temp_dir,
    }
}

impl Backends {
    fn real(&self) -> Vec<&dyn Storage> {
        vec![&self.desktop, &self.local, &self.indexed]
    }
}

#[test]
fn test_library_version() {
    assert!(!chat_storage::VERSION.is_empty());
    assert_eq!(chat_storage::CRATE_NAME, "chat-storage");
}

#[tokio::test]
async fn test_round_trip_every_backend() {
    let backends = create_backends().await;
    let value = json!({
        "sessions": [{"id": "a1", "messages": [{"role": "user", "content": "hi"}]}],
        "count": 3,
        "pinned": false
    });

    for storage in backends.real() {
        storage
            .set_store_value(StoreKey::ChatSessions.as_str(), &value)
            .await
            .expect("Failed to set value");
        let read = storage
            .get_store_value(StoreKey::ChatSessions.as_str())
            .await
            .expect("Failed to get value");
        assert_eq!(read, Some(value.clone()), "{}", storage.get_storage_type());
    }

    let stub = MobileSqliteStorage::new();
    stub.set_store_value("chat-sessions", &value).await.unwrap();
    assert_eq!(stub.get_store_value("chat-sessions").await.unwrap(), None);
}

#[tokio::test]
async fn test_delete_every_backend() {
    let backends = create_backends().await;

    for storage in backends.real() {
        storage.set_store_value("settings", &json!(1)).await.unwrap();
        storage.del_store_value("settings").await.unwrap();
        assert_eq!(storage.get_store_value("settings").await.unwrap(), None);
        // Deleting again is fine.
        storage.del_store_value("settings").await.unwrap();
    }
}

#[tokio::test]
async fn test_bulk_write_every_backend() {
    let backends = create_backends().await;
    let mut values = StoreValues::new();
    values.insert("A".to_string(), json!(1));
    values.insert("B".to_string(), json!(2));

    for storage in backends.real() {
        storage.set_all_store_values(&values).await.unwrap();
        assert_eq!(storage.get_store_value("A").await.unwrap(), Some(json!(1)));
        assert_eq!(storage.get_store_value("B").await.unwrap(), Some(json!(2)));
    }
}

#[tokio::test]
async fn test_corrupt_text_reads_as_none() {
    let backends = create_backends().await;

    backends.local_area.set_item("settings", "{oops").unwrap();
    assert_eq!(backends.local.get_store_value("settings").await.unwrap(), None);

    backends
        .document_store
        .set_item("settings", Value::String("{oops".to_string()))
        .await
        .unwrap();
    assert_eq!(backends.indexed.get_store_value("settings").await.unwrap(), None);
}

#[tokio::test]
async fn test_local_storage_allow_list() {
    let backends = create_backends().await;
    backends.local_area.set_item("foreign", "\"x\"").unwrap();
    backends
        .local
        .set_store_value("myCopilots", &json!([]))
        .await
        .unwrap();

    let keys = backends.local.get_all_store_keys().await.unwrap();
    assert_eq!(keys, vec!["myCopilots".to_string()]);
    let values = backends.local.get_all_store_values().await.unwrap();
    assert!(!values.contains_key("foreign"));
}

#[tokio::test]
async fn test_settings_scenario_on_document_store() {
    let backends = create_backends().await;
    backends
        .indexed
        .set_store_value(StoreKey::Settings.as_str(), &json!({"theme": "dark"}))
        .await
        .unwrap();

    let values = backends.indexed.get_all_store_values().await.unwrap();
    let mut expected = StoreValues::new();
    expected.insert("settings".to_string(), json!({"theme": "dark"}));
    assert_eq!(values, expected);
}

#[tokio::test]
async fn test_typed_helpers() {
    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Settings {
        theme: String,
        font_size: u32,
    }

    let backends = create_backends().await;
    let settings = Settings {
        theme: "dark".to_string(),
        font_size: 14,
    };

    for storage in backends.real() {
        storage.set_typed("settings", &settings).await.unwrap();
        let read: Option<Settings> = storage.get_typed("settings").await.unwrap();
        assert_eq!(read.as_ref(), Some(&settings));

        // Wrong shape reads as absent.
        let wrong: Option<Vec<u8>> = storage.get_typed("settings").await.unwrap();
        assert!(wrong.is_none());
        assert!(storage.has_data().await.unwrap());
    }
}

#[test]
fn test_selection() {
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
fn test_error_types() {
    let error = Error::Storage(StorageError::WriteFailed {
        key: "configs".to_string(),
        reason: "test error".to_string(),
    });

    assert!(error.to_string().contains("Storage error"));
    assert!(error.to_string().contains("configs"));
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_web_platform_from_config_persists() {
    let temp_dir = TempDir::new().unwrap();
    let config = StorageConfig {
        data_dir: temp_dir.path().to_path_buf(),
        platform: Some(Platform::Web),
        ..Default::default()
    };

    let manager = StorageManager::from_config(config.clone()).unwrap();
    let local = manager.storage(StorageType::LocalStorage).await.unwrap();
    local.set_store_value("configVersion", &json!(6)).await.unwrap();

    // A fresh manager sees what the first one wrote.
    let manager = StorageManager::from_config(config).unwrap();
    let found = manager.discover_legacy_storage().await.unwrap().unwrap();
    assert_eq!(found.get_storage_type(), StorageType::LocalStorage);
    assert_eq!(found.get_store_value("configVersion").await.unwrap(), Some(json!(6)));
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_mobile_platform_sqlite_document_store() {
    let temp_dir = TempDir::new().unwrap();
    let config = StorageConfig {
        data_dir: temp_dir.path().to_path_buf(),
        platform: Some(Platform::Mobile),
        ..Default::default()
    };

    let manager = StorageManager::from_config(config.clone()).unwrap();
    let indexed = manager.storage(StorageType::IndexedDb).await.unwrap();
    indexed
        .set_store_value("settings", &json!({"theme": "dark"}))
        .await
        .unwrap();
    assert!(config.document_store_path().exists());

    let manager = StorageManager::from_config(config).unwrap();
    let found = manager.discover_legacy_storage().await.unwrap().unwrap();
    assert_eq!(found.get_storage_type(), StorageType::IndexedDb);
    assert_eq!(
        found.get_all_store_values().await.unwrap()["settings"],
        json!({"theme": "dark"})
    );
}
