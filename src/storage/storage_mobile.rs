//! Mobile database backend
//!
//! The SQLite integration of the mobile build was removed. The type stays so
//! backend selection keeps its order and callers can probe it; every write
//! succeeds without storing anything and every read is empty.

use crate::error::StorageResult;
use crate::storage::storage_api::{Storage, StorageType, StoreValues};
use async_trait::async_trait;
use serde_json::Value;

/// Disabled mobile database backend. Not durable.
#[derive(Debug, Clone, Copy, Default)]
pub struct MobileSqliteStorage;

impl MobileSqliteStorage {
    /// Create the placeholder backend
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Storage for MobileSqliteStorage {
    fn get_storage_type(&self) -> StorageType {
        StorageType::MobileSqlite
    }

    async fn set_store_value(&self, _key: &str, _value: &Value) -> StorageResult<()> {
        Ok(())
    }

    async fn get_store_value(&self, _key: &str) -> StorageResult<Option<Value>> {
        Ok(None)
    }

    async fn del_store_value(&self, _key: &str) -> StorageResult<()> {
        Ok(())
    }

    async fn get_all_store_values(&self) -> StorageResult<StoreValues> {
        Ok(StoreValues::new())
    }

    async fn get_all_store_keys(&self) -> StorageResult<Vec<String>> {
        Ok(Vec::new())
    }
}
