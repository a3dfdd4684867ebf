//! Key-addressed blob storage
//!
//! The proxy only ever needs two operations from storage: does a key exist,
//! and read all of its bytes. [`StorageBackend`] is one store (a directory, a
//! bucket, a map); [`BlobStore`] addresses several of them by backend id and
//! is what the request pipeline consumes.

pub mod filesystem;
pub mod memory;
pub mod s3;

pub use filesystem::FilesystemBackend;
pub use memory::MemoryBackend;
pub use s3::S3Backend;

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::BackendConfig;
use crate::error::ProxyError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Unknown storage backend: {0}")]
    UnknownBackend(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<StorageError> for ProxyError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => ProxyError::NotFound { path },
            StorageError::InvalidPath(path) => ProxyError::DirectoryTraversal { path },
            other => ProxyError::Storage {
                message: other.to_string(),
            },
        }
    }
}

/// A single byte store
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend kind for logs, e.g. `filesystem`
    fn kind(&self) -> &'static str;

    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Read the whole object; absent keys fail with [`StorageError::NotFound`]
    async fn read(&self, path: &str) -> Result<Bytes, StorageError>;
}

/// Backends addressed by id
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn exists(&self, backend_id: &str, path: &str) -> Result<bool, StorageError>;

    async fn read(&self, backend_id: &str, path: &str) -> Result<Bytes, StorageError>;
}

/// [`BlobStore`] dispatching on backend id
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn StorageBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, backend: Arc<dyn StorageBackend>) -> &mut Self {
        self.backends.insert(id.into(), backend);
        self
    }

    pub fn get(&self, id: &str) -> Result<&Arc<dyn StorageBackend>, StorageError> {
        self.backends
            .get(id)
            .ok_or_else(|| StorageError::UnknownBackend(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.backends.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.backends.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Build every configured backend
    ///
    /// S3 backends need an async client, hence the async constructor.
    pub async fn from_config(configs: &HashMap<String, BackendConfig>) -> Result<Self, String> {
        let mut registry = Self::new();

        for (id, config) in configs {
            let backend: Arc<dyn StorageBackend> = match config {
                BackendConfig::Filesystem { root } => {
                    if !std::path::Path::new(root).is_dir() {
                        return Err(format!(
                            "Backend '{}': filesystem root '{}' is not a directory",
                            id, root
                        ));
                    }
                    Arc::new(FilesystemBackend::new(root))
                }
                BackendConfig::Memory => Arc::new(MemoryBackend::new()),
                BackendConfig::S3(s3) => Arc::new(S3Backend::from_config(s3).await),
            };

            tracing::info!(backend_id = %id, kind = backend.kind(), "Storage backend ready");
            registry.register(id.clone(), backend);
        }

        Ok(registry)
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.ids())
            .finish()
    }
}

#[async_trait]
impl BlobStore for BackendRegistry {
    async fn exists(&self, backend_id: &str, path: &str) -> Result<bool, StorageError> {
        self.get(backend_id)?.exists(path).await
    }

    async fn read(&self, backend_id: &str, path: &str) -> Result<Bytes, StorageError> {
        self.get(backend_id)?.read(path).await
    }
}
