//! Embedded document store primitive
//!
//! An asynchronous key/value store scoped to a named instance. Items are raw
//! JSON values rather than text, so an entry someone else wrote as a number or
//! object is representable; the adapter in
//! [`storage_indexed`](crate::storage::storage_indexed) only ever writes
//! strings and treats anything else as corruption.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Asynchronous named key/value store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Name of the instance this handle is scoped to
    fn name(&self) -> &str;

    /// Item stored under `key`
    async fn get_item(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Store `item` under `key`
    async fn set_item(&self, key: &str, item: Value) -> StorageResult<()>;

    /// Remove `key`, if present
    async fn remove_item(&self, key: &str) -> StorageResult<()>;

    /// Every `(key, item)` pair in the instance
    async fn iterate(&self) -> StorageResult<Vec<(String, Value)>>;

    /// Every key in the instance
    async fn keys(&self) -> StorageResult<Vec<String>>;
}

/// In-memory document store
///
/// Clones share the same items.
#[derive(Debug, Clone)]
pub struct MemoryDocumentStore {
    name: String,
    items: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl MemoryDocumentStore {
    /// Create an empty instance called `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    fn poisoned(&self, operation: &str) -> StorageError {
        StorageError::OperationFailed {
            operation: operation.to_string(),
            reason: format!("document store {} lock poisoned", self.name),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_item(&self, key: &str) -> StorageResult<Option<Value>> {
        let items = self.items.read().map_err(|_| self.poisoned("get_item"))?;
        Ok(items.get(key).cloned())
    }

    async fn set_item(&self, key: &str, item: Value) -> StorageResult<()> {
        let mut items = self.items.write().map_err(|_| self.poisoned("set_item"))?;
        items.insert(key.to_string(), item);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> StorageResult<()> {
        let mut items = self.items.write().map_err(|_| self.poisoned("remove_item"))?;
        items.remove(key);
        Ok(())
    }

    async fn iterate(&self) -> StorageResult<Vec<(String, Value)>> {
        let items = self.items.read().map_err(|_| self.poisoned("iterate"))?;
        Ok(items.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        let items = self.items.read().map_err(|_| self.poisoned("keys"))?;
        Ok(items.keys().cloned().collect())
    }
}

#[cfg(feature = "sqlite")]
pub use self::sqlite::SqliteDocumentStore;

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::*;
    use rusqlite::types::{Value as SqlValue, ValueRef};
    use rusqlite::{params, Connection, OptionalExtension};
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;
    use tracing::{debug, info};

    const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS keyvaluepairs (
        namespace TEXT NOT NULL,
        key TEXT NOT NULL,
        value,
        PRIMARY KEY (namespace, key)
    )";

    /// Document store kept in a SQLite table, one namespace per instance name.
    ///
    /// The value column is untyped, so items keep their SQLite storage class:
    /// strings come back as strings, numbers as numbers, and booleans,
    /// arrays and objects (stored as JSON blobs) as their decoded value.
    #[derive(Clone)]
    pub struct SqliteDocumentStore {
        name: String,
        conn: Arc<Mutex<Connection>>,
    }

    impl SqliteDocumentStore {
        /// Open (or create) the database at `path` and scope it to `name`
        pub fn open(path: impl AsRef<Path>, name: impl Into<String>) -> StorageResult<Self> {
            let path = path.as_ref();
            info!(path = %path.display(), "opening document store database");
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| StorageError::OperationFailed {
                        operation: "create_parent_directory".to_string(),
                        reason: format!("Failed to create parent directory: {}", e),
                    })?;
                }
            }
            Self::init(Connection::open(path)?, name.into())
        }

        /// In-memory database, mostly for tests
        pub fn open_in_memory(name: impl Into<String>) -> StorageResult<Self> {
            debug!("opening in-memory document store");
            Self::init(Connection::open_in_memory()?, name.into())
        }

        fn init(conn: Connection, name: String) -> StorageResult<Self> {
            conn.busy_timeout(Duration::from_secs(5))?;
            conn.execute_batch(SCHEMA)?;
            Ok(Self {
                name,
                conn: Arc::new(Mutex::new(conn)),
            })
        }

        /// Run `f` against the connection on the blocking pool
        async fn execute<F, T>(&self, f: F) -> StorageResult<T>
        where
            F: FnOnce(&Connection, &str) -> StorageResult<T> + Send + 'static,
            T: Send + 'static,
        {
            let conn = Arc::clone(&self.conn);
            let name = self.name.clone();
            tokio::task::spawn_blocking(move || {
                let conn = conn.lock().map_err(|e| StorageError::OperationFailed {
                    operation: "lock_connection".to_string(),
                    reason: format!("mutex poisoned: {e}"),
                })?;
                f(&*conn, name.as_str())
            })
            .await?
        }
    }

    fn to_sql(item: Value) -> SqlValue {
        match item {
            Value::Null => SqlValue::Null,
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Real(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => SqlValue::Text(s),
            other @ (Value::Bool(_) | Value::Array(_) | Value::Object(_)) => {
                SqlValue::Blob(serde_json::to_vec(&other).unwrap_or_default())
            }
        }
    }

    fn from_sql(value: ValueRef<'_>) -> Value {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::from(i),
            ValueRef::Real(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => serde_json::from_slice(bytes).unwrap_or(Value::Null),
        }
    }

    #[async_trait]
    impl DocumentStore for SqliteDocumentStore {
        fn name(&self) -> &str {
            &self.name
        }

        async fn get_item(&self, key: &str) -> StorageResult<Option<Value>> {
            let key = key.to_string();
            self.execute(move |conn, ns| {
                let item = conn
                    .query_row(
                        "SELECT value FROM keyvaluepairs WHERE namespace = ?1 AND key = ?2",
                        params![ns, key],
                        |row| Ok(from_sql(row.get_ref(0)?)),
                    )
                    .optional()?;
                Ok(item)
            })
            .await
        }

        async fn set_item(&self, key: &str, item: Value) -> StorageResult<()> {
            let key = key.to_string();
            self.execute(move |conn, ns| {
                conn.execute(
                    "INSERT INTO keyvaluepairs (namespace, key, value) VALUES (?1, ?2, ?3) \
                     ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value",
                    params![ns, key, to_sql(item)],
                )?;
                Ok(())
            })
            .await
        }

        async fn remove_item(&self, key: &str) -> StorageResult<()> {
            let key = key.to_string();
            self.execute(move |conn, ns| {
                conn.execute(
                    "DELETE FROM keyvaluepairs WHERE namespace = ?1 AND key = ?2",
                    params![ns, key],
                )?;
                Ok(())
            })
            .await
        }

        async fn iterate(&self) -> StorageResult<Vec<(String, Value)>> {
            self.execute(|conn, ns| {
                let mut stmt = conn.prepare(
                    "SELECT key, value FROM keyvaluepairs WHERE namespace = ?1 ORDER BY key",
                )?;
                let rows = stmt.query_map(params![ns], |row| {
                    Ok((row.get::<_, String>(0)?, from_sql(row.get_ref(1)?)))
                })?;
                let mut entries = Vec::new();
                for row in rows {
                    entries.push(row?);
                }
                Ok(entries)
            })
            .await
        }

        async fn keys(&self) -> StorageResult<Vec<String>> {
            self.execute(|conn, ns| {
                let mut stmt = conn
                    .prepare("SELECT key FROM keyvaluepairs WHERE namespace = ?1 ORDER BY key")?;
                let rows = stmt.query_map(params![ns], |row| row.get::<_, String>(0))?;
                let mut keys = Vec::new();
                for row in rows {
                    keys.push(row?);
                }
                Ok(keys)
            })
            .await
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serde_json::json;
        use tempfile::TempDir;

        #[tokio::test]
        async fn storage_classes_survive() {
            let store = SqliteDocumentStore::open_in_memory("chatboxstore").unwrap();
            store.set_item("text", json!("{\"a\":1}")).await.unwrap();
            store.set_item("int", json!(42)).await.unwrap();
            store.set_item("obj", json!({"a": [1, 2]})).await.unwrap();
            store.set_item("flag", json!(true)).await.unwrap();

            assert_eq!(store.get_item("text").await.unwrap(), Some(json!("{\"a\":1}")));
            assert_eq!(store.get_item("int").await.unwrap(), Some(json!(42)));
            assert_eq!(store.get_item("obj").await.unwrap(), Some(json!({"a": [1, 2]})));
            assert_eq!(store.get_item("flag").await.unwrap(), Some(json!(true)));
            assert_eq!(store.get_item("missing").await.unwrap(), None);
        }

        #[tokio::test]
        async fn namespaces_are_isolated() {
            let temp_dir = TempDir::new().unwrap();
            let path = temp_dir.path().join("docs.sqlite");
            let a = SqliteDocumentStore::open(&path, "a").unwrap();
            let b = SqliteDocumentStore::open(&path, "b").unwrap();

            a.set_item("k", json!("1")).await.unwrap();
            assert_eq!(b.get_item("k").await.unwrap(), None);
            assert_eq!(a.keys().await.unwrap(), vec!["k".to_string()]);
            assert!(b.iterate().await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn overwrite_and_remove() {
            let store = SqliteDocumentStore::open_in_memory("chatboxstore").unwrap();
            store.set_item("k", json!("1")).await.unwrap();
            store.set_item("k", json!("2")).await.unwrap();
            assert_eq!(store.iterate().await.unwrap(), vec![("k".to_string(), json!("2"))]);

            store.remove_item("k").await.unwrap();
            store.remove_item("k").await.unwrap();
            assert!(store.keys().await.unwrap().is_empty());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_basics() {
        let store = MemoryDocumentStore::new("chatboxstore");
        assert_eq!(store.name(), "chatboxstore");

        store.set_item("b", json!("2")).await.unwrap();
        store.set_item("a", json!(1)).await.unwrap();
        assert_eq!(store.keys().await.unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.get_item("a").await.unwrap(), Some(json!(1)));

        store.remove_item("a").await.unwrap();
        assert_eq!(store.iterate().await.unwrap(), vec![("b".to_string(), json!("2"))]);
    }

    #[tokio::test]
    async fn test_memory_clones_share_items() {
        let store = MemoryDocumentStore::new("chatboxstore");
        let other = store.clone();
        store.set_item("k", json!("v")).await.unwrap();
        assert_eq!(other.get_item("k").await.unwrap(), Some(json!("v")));
    }
}
