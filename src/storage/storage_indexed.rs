//! Document store backend (the "IndexedDB" store of the web and mobile builds)

use crate::error::{StorageError, StorageResult};
use crate::storage::codec;
use crate::storage::document_store::DocumentStore;
use crate::storage::storage_api::{Storage, StorageType, StoreValues};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Backend over a named [`DocumentStore`] instance.
///
/// Every value is written as a JSON string item. On read, an item that is not
/// a string, or a string that does not parse, is treated as null.
#[derive(Clone)]
pub struct IndexedDbStorage {
    store: Arc<dyn DocumentStore>,
}

impl IndexedDbStorage {
    /// Create a backend over `store`
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Name of the underlying store instance
    pub fn store_name(&self) -> &str {
        self.store.name()
    }
}

fn decode_item(key: &str, item: Value) -> Option<Value> {
    match item {
        Value::String(json) => codec::decode(key, &json),
        Value::Null => None,
        _ => {
            warn!(key, "stored item is not a string");
            None
        }
    }
}

#[async_trait]
impl Storage for IndexedDbStorage {
    fn get_storage_type(&self) -> StorageType {
        StorageType::IndexedDb
    }

    #[instrument(skip(self, value))]
    async fn set_store_value(&self, key: &str, value: &Value) -> StorageResult<()> {
        let json = codec::encode(key, value)?;
        self.store
            .set_item(key, Value::String(json))
            .await
            .map_err(|e| match e {
                StorageError::WriteFailed { .. } => e,
                other => StorageError::WriteFailed {
                    key: key.to_string(),
                    reason: other.to_string(),
                },
            })
    }

    async fn get_store_value(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self
            .store
            .get_item(key)
            .await?
            .and_then(|item| decode_item(key, item)))
    }

    async fn del_store_value(&self, key: &str) -> StorageResult<()> {
        self.store.remove_item(key).await
    }

    async fn get_all_store_values(&self) -> StorageResult<StoreValues> {
        let mut values = StoreValues::new();
        for (key, item) in self.store.iterate().await? {
            let value = decode_item(&key, item).unwrap_or(Value::Null);
            values.insert(key, value);
        }
        Ok(values)
    }

    async fn get_all_store_keys(&self) -> StorageResult<Vec<String>> {
        self.store.keys().await
    }
}
