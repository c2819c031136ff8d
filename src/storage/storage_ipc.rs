//! Desktop file storage reached over inter-process calls
//!
//! On desktop the store lives in a JSON file owned by the host process. The
//! client side ([`DesktopFileStorage`]) never touches the file: it sends
//! [`IpcRequest`]s through an [`IpcTransport`] and every value travels as JSON
//! text, because the transport cannot carry arbitrary object graphs.
//!
//! The host side is [`StoreHost`]. It can be called in-process (it implements
//! [`IpcTransport`] itself) or run on its own task behind a channel with
//! [`spawn_store_host`].

use crate::error::{StorageError, StorageResult};
use crate::storage::codec;
use crate::storage::storage_api::{utils, Storage, StorageType, StoreValues};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs as async_fs;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, instrument, warn};

/// A call sent from the client to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "camelCase")]
pub enum IpcRequest {
    /// Write one JSON-encoded value
    SetStoreValue { key: String, json: String },
    /// Read one value as JSON text
    GetStoreValue { key: String },
    /// Remove one key
    DelStoreValue { key: String },
    /// Read the whole store as one JSON envelope
    GetAllStoreValues,
    /// List every key
    GetAllStoreKeys,
    /// Write a JSON envelope of key/value pairs
    SetAllStoreValues { json: String },
}

impl IpcRequest {
    /// Channel name of this call
    pub fn channel(&self) -> &'static str {
        match self {
            IpcRequest::SetStoreValue { .. } => "setStoreValue",
            IpcRequest::GetStoreValue { .. } => "getStoreValue",
            IpcRequest::DelStoreValue { .. } => "delStoreValue",
            IpcRequest::GetAllStoreValues => "getAllStoreValues",
            IpcRequest::GetAllStoreKeys => "getAllStoreKeys",
            IpcRequest::SetAllStoreValues { .. } => "setAllStoreValues",
        }
    }
}

/// The host's answer to an [`IpcRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum IpcReply {
    /// The call completed and returns nothing
    Done,
    /// JSON text, or nothing when the key is absent
    Value(Option<String>),
    /// A key listing
    Keys(Vec<String>),
}

/// Carries requests to the host process
#[async_trait]
pub trait IpcTransport: Send + Sync {
    /// Send `request` and wait for the reply
    async fn invoke(&self, request: IpcRequest) -> StorageResult<IpcReply>;
}

/// Host-side store: a JSON object file holding every key
pub struct StoreHost {
    path: PathBuf,
    values: Mutex<StoreValues>,
}

impl StoreHost {
    /// Open the store file at `path`.
    ///
    /// A missing file starts an empty store. A non-empty file that is not a
    /// JSON object is renamed to `<file>.corrupt-<uuid>` and the store starts
    /// empty, so the original bytes survive the next write.
    pub async fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        info!(path = %path.display(), "opening desktop store file");

        let values = match async_fs::read_to_string(&path).await {
            Ok(text) => match codec::decode("*", &text) {
                Some(Value::Object(map)) => map,
                _ if text.trim().is_empty() => StoreValues::new(),
                _ => {
                    quarantine(&path).await?;
                    StoreValues::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                quarantine(&path).await?;
                StoreValues::new()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreValues::new(),
            Err(e) => {
                return Err(StorageError::OperationFailed {
                    operation: "open_store_file".to_string(),
                    reason: format!("Failed to read {}: {}", path.display(), e),
                })
            }
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Execute one request against the store
    #[instrument(skip(self, request), fields(channel = request.channel()))]
    pub async fn handle(&self, request: IpcRequest) -> StorageResult<IpcReply> {
        match request {
            IpcRequest::SetStoreValue { key, json } => {
                utils::validate_key(&key)?;
                let value = codec::decode_strict(&key, &json).map_err(|e| {
                    StorageError::WriteFailed {
                        key: key.clone(),
                        reason: e.to_string(),
                    }
                })?;
                let mut values = self.values.lock().await;
                let mut next = values.clone();
                next.insert(key.clone(), value);
                self.persist(&next, &key).await?;
                *values = next;
                Ok(IpcReply::Done)
            }
            IpcRequest::GetStoreValue { key } => {
                let values = self.values.lock().await;
                match values.get(&key) {
                    Some(value) => Ok(IpcReply::Value(Some(codec::encode(&key, value)?))),
                    None => Ok(IpcReply::Value(None)),
                }
            }
            IpcRequest::DelStoreValue { key } => {
                let mut values = self.values.lock().await;
                if !values.contains_key(&key) {
                    return Ok(IpcReply::Done);
                }
                let mut next = values.clone();
                next.remove(&key);
                self.persist(&next, &key).await?;
                *values = next;
                Ok(IpcReply::Done)
            }
            IpcRequest::GetAllStoreValues => {
                let values = self.values.lock().await;
                Ok(IpcReply::Value(Some(codec::encode_envelope(&values)?)))
            }
            IpcRequest::GetAllStoreKeys => {
                let values = self.values.lock().await;
                Ok(IpcReply::Keys(values.keys().cloned().collect()))
            }
            IpcRequest::SetAllStoreValues { json } => {
                let incoming = match codec::decode_strict("*", &json) {
                    Ok(Value::Object(map)) => map,
                    Ok(_) => {
                        return Err(StorageError::WriteFailed {
                            key: "*".to_string(),
                            reason: "envelope is not a JSON object".to_string(),
                        })
                    }
                    Err(e) => {
                        return Err(StorageError::WriteFailed {
                            key: "*".to_string(),
                            reason: e.to_string(),
                        })
                    }
                };
                for key in incoming.keys() {
                    utils::validate_key(key)?;
                }
                let mut values = self.values.lock().await;
                let mut next = values.clone();
                next.extend(incoming);
                self.persist(&next, "*").await?;
                *values = next;
                Ok(IpcReply::Done)
            }
        }
    }

    /// Write the whole store to a temporary file, then rename it into place
    async fn persist(&self, values: &StoreValues, key: &str) -> StorageResult<()> {
        let write_failed = |reason: String| StorageError::WriteFailed {
            key: key.to_string(),
            reason,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                async_fs::create_dir_all(parent)
                    .await
                    .map_err(|e| write_failed(format!("Failed to create parent directory: {}", e)))?;
            }
        }

        let text = serde_json::to_string_pretty(values)
            .map_err(|e| write_failed(format!("serialization failed: {}", e)))?;
        let temp_path = self
            .path
            .with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));

        async_fs::write(&temp_path, text.as_bytes())
            .await
            .map_err(|e| write_failed(format!("Failed to write temporary file: {}", e)))?;

        if let Err(e) = async_fs::rename(&temp_path, &self.path).await {
            let _ = async_fs::remove_file(&temp_path).await;
            return Err(write_failed(format!("Failed to rename temporary file: {}", e)));
        }

        debug!(path = %self.path.display(), entries = values.len(), "store file written");
        Ok(())
    }
}

/// Move an unreadable store file out of the way; it is never overwritten
async fn quarantine(path: &Path) -> StorageResult<PathBuf> {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".corrupt-{}", uuid::Uuid::new_v4().simple()));
    let target = path.with_file_name(name);

    async_fs::rename(path, &target)
        .await
        .map_err(|e| StorageError::OperationFailed {
            operation: "quarantine_store_file".to_string(),
            reason: format!("Failed to move corrupt {} aside: {}", path.display(), e),
        })?;

    warn!(
        path = %path.display(),
        backup = %target.display(),
        "desktop store file is not a JSON object, moved aside"
    );
    Ok(target)
}

#[async_trait]
impl IpcTransport for StoreHost {
    async fn invoke(&self, request: IpcRequest) -> StorageResult<IpcReply> {
        self.handle(request).await
    }
}

type PendingCall = (IpcRequest, oneshot::Sender<StorageResult<IpcReply>>);

/// Client end of a host running on its own task
#[derive(Clone)]
pub struct ChannelTransport {
    sender: mpsc::Sender<PendingCall>,
}

#[async_trait]
impl IpcTransport for ChannelTransport {
    async fn invoke(&self, request: IpcRequest) -> StorageResult<IpcReply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send((request, reply_tx))
            .await
            .map_err(|_| StorageError::ChannelClosed)?;
        reply_rx.await.map_err(|_| StorageError::ChannelClosed)?
    }
}

/// Run `host` on a tokio task and return a transport connected to it.
///
/// Requests are served one at a time in arrival order. The task ends when
/// every [`ChannelTransport`] clone has been dropped.
pub fn spawn_store_host(host: StoreHost) -> ChannelTransport {
    let (sender, mut receiver) = mpsc::channel::<PendingCall>(64);

    tokio::spawn(async move {
        while let Some((request, reply)) = receiver.recv().await {
            let result = host.handle(request).await;
            if reply.send(result).is_err() {
                debug!("ipc caller went away before the reply");
            }
        }
        debug!(path = %host.path().display(), "desktop store host stopped");
    });

    ChannelTransport { sender }
}

/// Desktop backend: every operation is an inter-process call
#[derive(Clone)]
pub struct DesktopFileStorage {
    ipc: Arc<dyn IpcTransport>,
}

impl DesktopFileStorage {
    /// Create a backend talking through `ipc`
    pub fn new(ipc: Arc<dyn IpcTransport>) -> Self {
        Self { ipc }
    }

    async fn call(&self, request: IpcRequest) -> StorageResult<IpcReply> {
        let channel = request.channel();
        self.ipc.invoke(request).await.map_err(|e| match e {
            StorageError::ChannelClosed
            | StorageError::WriteFailed { .. }
            | StorageError::InvalidKey { .. } => e,
            other => StorageError::Ipc {
                channel: channel.to_string(),
                reason: other.to_string(),
            },
        })
    }
}

fn unexpected_reply(channel: &str, reply: &IpcReply) -> StorageError {
    StorageError::Ipc {
        channel: channel.to_string(),
        reason: format!("unexpected reply {:?}", reply),
    }
}

#[async_trait]
impl Storage for DesktopFileStorage {
    fn get_storage_type(&self) -> StorageType {
        StorageType::DesktopFile
    }

    async fn set_store_value(&self, key: &str, value: &Value) -> StorageResult<()> {
        let json = codec::encode(key, value)?;
        self.call(IpcRequest::SetStoreValue {
            key: key.to_string(),
            json,
        })
        .await?;
        Ok(())
    }

    async fn get_store_value(&self, key: &str) -> StorageResult<Option<Value>> {
        match self
            .call(IpcRequest::GetStoreValue {
                key: key.to_string(),
            })
            .await?
        {
            IpcReply::Value(Some(json)) => Ok(codec::decode(key, &json)),
            IpcReply::Value(None) => Ok(None),
            other => Err(unexpected_reply("getStoreValue", &other)),
        }
    }

    async fn del_store_value(&self, key: &str) -> StorageResult<()> {
        self.call(IpcRequest::DelStoreValue {
            key: key.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn get_all_store_values(&self) -> StorageResult<StoreValues> {
        match self.call(IpcRequest::GetAllStoreValues).await? {
            IpcReply::Value(Some(json)) => Ok(codec::decode_envelope(&json)),
            IpcReply::Value(None) => Ok(StoreValues::new()),
            other => Err(unexpected_reply("getAllStoreValues", &other)),
        }
    }

    async fn get_all_store_keys(&self) -> StorageResult<Vec<String>> {
        match self.call(IpcRequest::GetAllStoreKeys).await? {
            IpcReply::Keys(keys) => Ok(keys),
            other => Err(unexpected_reply("getAllStoreKeys", &other)),
        }
    }

    async fn set_all_store_values(&self, values: &StoreValues) -> StorageResult<()> {
        let json = codec::encode_envelope(values)?;
        self.call(IpcRequest::SetAllStoreValues { json }).await?;
        Ok(())
    }
}
