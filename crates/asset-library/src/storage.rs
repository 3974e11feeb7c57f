//! Storage Abstraction
//!
//! Blob storage for originals and renditions, keyed by the relative paths
//! produced by [`AttachmentPaths`](crate::paths::AttachmentPaths).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStoreExt, PutPayload};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

use crate::settings::S3Settings;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Storage configuration error: {0}")]
    ConfigError(String),
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// File metadata from storage
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    /// File size in bytes
    pub size: u64,
    /// Content type guessed from the key
    pub content_type: String,
    /// SHA256 digest
    pub digest: String,
}

impl FileMetadata {
    fn describe(key: &str, data: &[u8]) -> Self {
        Self {
            size: data.len() as u64,
            content_type: mime_guess::from_path(key)
                .first_or_octet_stream()
                .to_string(),
            digest: calculate_digest(data),
        }
    }
}

/// Storage trait - unified interface for storage backends
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store data with a key
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<FileMetadata>;

    /// Retrieve data by key
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Delete data by key; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if key exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// URL served by the backend itself, for backends reachable without the app
    fn public_url(&self, key: &str) -> Option<String>;

    /// Backend location of a key, e.g. a filesystem path
    fn path(&self, key: &str) -> String;

    /// Get storage name for logging
    fn name(&self) -> &str;
}

pub fn calculate_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Local filesystem storage
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a full path
    fn resolve_path(&self, key: &str) -> StorageResult<PathBuf> {
        // Prevent directory traversal
        if key.is_empty()
            || key.split(['/', '\\']).any(|segment| segment == "..")
            || key.starts_with('/')
            || key.starts_with('\\')
        {
            return Err(StorageError::InvalidPath(key.to_string()));
        }

        Ok(self.root.join(key))
    }

    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    #[instrument(skip(self, data), fields(storage = "local"))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<FileMetadata> {
        let path = self.resolve_path(key)?;
        self.ensure_parent(&path).await?;

        let metadata = FileMetadata::describe(key, &data);

        let mut file = fs::File::create(&path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;

        debug!(path = ?path, size = metadata.size, "File stored");

        Ok(metadata)
    }

    #[instrument(skip(self), fields(storage = "local"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.resolve_path(key)?;

        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), fields(storage = "local"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.resolve_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = ?path, "File deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.resolve_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    fn public_url(&self, _key: &str) -> Option<String> {
        None
    }

    fn path(&self, key: &str) -> String {
        self.root.join(key).to_string_lossy().into_owned()
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// In-memory storage for testing
#[derive(Default)]
pub struct MemoryStorage {
    files: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        let files = self.files.read().await;
        let mut keys: Vec<String> = files.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<FileMetadata> {
        let metadata = FileMetadata::describe(key, &data);
        let mut files = self.files.write().await;
        files.insert(key.to_string(), data);
        Ok(metadata)
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let files = self.files.read().await;
        files
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let mut files = self.files.write().await;
        files.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let files = self.files.read().await;
        Ok(files.contains_key(key))
    }

    fn public_url(&self, _key: &str) -> Option<String> {
        None
    }

    fn path(&self, key: &str) -> String {
        format!("memory://{}", key)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// S3-compatible storage
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
    region: String,
    endpoint: Option<String>,
}

impl S3Storage {
    pub fn new(settings: &S3Settings) -> StorageResult<Self> {
        let bucket = settings
            .bucket
            .clone()
            .ok_or_else(|| StorageError::ConfigError("assets.s3.bucket is not set".to_string()))?;

        let mut builder = AmazonS3Builder::from_env()
            .with_region(settings.region.clone())
            .with_bucket_name(bucket.clone());

        if let Some(ref key) = settings.access_key_id {
            builder = builder.with_access_key_id(key.clone());
        }
        if let Some(ref secret) = settings.secret_access_key {
            builder = builder.with_secret_access_key(secret.clone());
        }
        if let Some(ref endpoint) = settings.endpoint {
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        info!(bucket = %bucket, region = %settings.region, "S3 storage initialized");

        Ok(Self {
            store,
            bucket,
            region: settings.region.clone(),
            endpoint: settings.endpoint.clone(),
        })
    }

    fn location(key: &str) -> ObjectPath {
        ObjectPath::from(key.to_string())
    }

    fn backend_error(&self, key: &str, e: object_store::Error) -> StorageError {
        match e {
            object_store::Error::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                error!(error = %other, bucket = %self.bucket, key = %key, "S3 request failed");
                StorageError::BackendError(other.to_string())
            }
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    #[instrument(skip(self, data), fields(storage = "s3"))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<FileMetadata> {
        let metadata = FileMetadata::describe(key, &data);
        self.store
            .put(&Self::location(key), PutPayload::from(data))
            .await
            .map_err(|e| self.backend_error(key, e))?;

        debug!(bucket = %self.bucket, key = %key, size = metadata.size, "Object stored");
        Ok(metadata)
    }

    #[instrument(skip(self), fields(storage = "s3"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let result = self
            .store
            .get(&Self::location(key))
            .await
            .map_err(|e| self.backend_error(key, e))?;

        result.bytes().await.map_err(|e| self.backend_error(key, e))
    }

    #[instrument(skip(self), fields(storage = "s3"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        match self.store.delete(&Self::location(key)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(self.backend_error(key, e)),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.store.head(&Self::location(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(self.backend_error(key, e)),
        }
    }

    fn public_url(&self, key: &str) -> Option<String> {
        Some(match self.endpoint {
            Some(ref endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            ),
        })
    }

    fn path(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }

    fn name(&self) -> &str {
        "s3"
    }
}
