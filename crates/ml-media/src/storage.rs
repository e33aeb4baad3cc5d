//! Storage Abstraction
//!
//! The byte store behind attachments. The registry only keeps content
//! references; these backends own the bytes.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use ml_core::MediaError;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::mime::detect_mime_type;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for MediaError {
    fn from(err: StorageError) -> Self {
        MediaError::StorageFailure(err.to_string())
    }
}

/// File metadata from storage
#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// File size in bytes
    pub size: u64,
    /// Content type (MIME)
    pub content_type: String,
    /// SHA256 digest
    pub digest: String,
}

impl FileMetadata {
    fn describe(key: &str, data: &[u8]) -> Self {
        Self {
            size: data.len() as u64,
            content_type: detect_mime_type(Path::new(key), data),
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

    /// Public reference for a key
    fn url(&self, key: &str) -> String;

    /// Get storage name for logging
    fn name(&self) -> &str;
}

/// Local filesystem storage
pub struct LocalStorage {
    /// Root directory for storage
    root: PathBuf,
    /// Base URL for generating URLs
    base_url: String,
}

impl LocalStorage {
    /// Create a new local storage
    pub fn new(root: impl AsRef<Path>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a full path
    fn resolve_path(&self, key: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes || key.contains('\\') {
            return Err(StorageError::InvalidPath(key.to_string()));
        }

        Ok(self.root.join(relative))
    }

    /// Ensure parent directory exists
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
            Ok(buffer) => Ok(Bytes::from(buffer)),
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

    fn url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// In-memory storage for testing
pub struct MemoryStorage {
    files: tokio::sync::RwLock<std::collections::HashMap<String, (Bytes, FileMetadata)>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            files: tokio::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<FileMetadata> {
        let metadata = FileMetadata::describe(key, &data);

        let mut files = self.files.write().await;
        files.insert(key.to_string(), (data, metadata.clone()));

        Ok(metadata)
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let files = self.files.read().await;
        files
            .get(key)
            .map(|(data, _)| data.clone())
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

    fn url(&self, key: &str) -> String {
        format!("/memory/{}", key)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Calculate SHA256 digest
fn calculate_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Generate a disk filename (safe for filesystem)
pub fn generate_disk_filename(filename: &str) -> String {
    let uuid = Uuid::new_v4();
    let ext = Path::new(filename)
        .extension()
        .and_then(|s| s.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("");

    if ext.is_empty() {
        uuid.to_string()
    } else {
        format!("{}.{}", uuid, ext.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_put_get() {
        let storage = MemoryStorage::new();
        let data = Bytes::from("Hello, World!");

        let meta = storage.put("test.txt", data.clone()).await.unwrap();
        assert_eq!(meta.size, 13);
        assert_eq!(meta.content_type, "text/plain");
        assert_eq!(meta.digest.len(), 64);

        let retrieved = storage.get("test.txt").await.unwrap();
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn test_memory_storage_delete() {
        let storage = MemoryStorage::new();

        storage.put("test.txt", Bytes::from("test data")).await.unwrap();
        assert!(storage.exists("test.txt").await.unwrap());

        storage.delete("test.txt").await.unwrap();
        assert!(!storage.exists("test.txt").await.unwrap());
        storage.delete("test.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_storage_not_found() {
        let storage = MemoryStorage::new();

        let result = storage.get("nonexistent.txt").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_local_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/storage/");

        let meta = storage
            .put("2026/photo.txt", Bytes::from("pixels"))
            .await
            .unwrap();
        assert_eq!(meta.size, 6);
        assert_eq!(
            storage.get("2026/photo.txt").await.unwrap(),
            Bytes::from("pixels")
        );
        assert_eq!(storage.url("2026/photo.txt"), "/storage/2026/photo.txt");

        storage.delete("2026/photo.txt").await.unwrap();
        assert!(!storage.exists("2026/photo.txt").await.unwrap());
        assert!(matches!(
            storage.get("2026/photo.txt").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_local_storage_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/storage");

        for key in ["../../../etc/passwd", "/etc/passwd", "./a", "a\\..\\b", ""] {
            let result = storage.get(key).await;
            assert!(
                matches!(result, Err(StorageError::InvalidPath(_))),
                "key {:?} should be rejected",
                key
            );
        }
    }

    #[test]
    fn test_generate_disk_filename() {
        let filename = generate_disk_filename("report.XLSX");
        assert!(filename.ends_with(".xlsx"));

        let no_ext = generate_disk_filename("noext");
        assert!(!no_ext.contains('.'));

        assert_ne!(generate_disk_filename("a.png"), generate_disk_filename("a.png"));
    }

    #[test]
    fn test_storage_error_becomes_storage_failure() {
        let err: MediaError = StorageError::BackendError("bucket offline".into()).into();
        assert!(matches!(err, MediaError::StorageFailure(_)));
    }
}
