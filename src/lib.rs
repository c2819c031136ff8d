//! # chat-storage
//!
//! Key/value persistence for a chat client that has shipped on several
//! platforms, each with its own storage technology. One async contract,
//! [`storage::Storage`], is implemented by four interchangeable backends so the
//! application can find user data written by older versions and move it.
//!
//! ## Backends
//!
//! - **Desktop file**: JSON file owned by the host process, reached over IPC
//! - **Local storage**: browser-style string area, only legacy keys are visible
//! - **Document store**: named async key/value instance
//! - **Mobile database**: disabled placeholder
//!
//! ## Optional Features
//!
//! - `sqlite` (default): SQLite-backed document store
//!
//! ## Example
//!
//! ```rust
//! use chat_storage::prelude::*;
//! use chat_storage::storage::{BackendHandles, MemoryDocumentStore, MemoryWebStorage};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let handles = BackendHandles::new()
//!     .with_web_storage(Arc::new(MemoryWebStorage::new()))
//!     .with_document_store(Arc::new(MemoryDocumentStore::new("chatboxstore")));
//! let manager = StorageManager::with_handles(Platform::Mobile, handles);
//!
//! // Nothing written yet, so there is no legacy data to import.
//! assert!(manager.discover_legacy_storage().await?.is_none());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export core error types
pub use error::{Error, Result};

// Core modules
pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod storage;

// Re-export commonly used types
pub mod prelude {
    //! Common types and traits for convenient importing

    pub use crate::config::StorageConfig;
    pub use crate::error::{Error, Result, StorageError, StorageResult};
    pub use crate::platform::Platform;
    pub use crate::storage::{
        select_backends_for_platform, Storage, StorageExt, StorageManager, StorageType, StoreKey,
        StoreValues,
    };
}

// Version information
/// The version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
