//! Asset byte storage on top of `object_store`
//!
//! Backends: S3 (or any S3-compatible host via `endpoint`), a local
//! directory under `<root>/objects`, or memory for tests.

use bb_common::config::{RootFolder, StorageBackend, StorageConfig};
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::asset::sanitize_file_name;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage misconfigured: {0}")]
    Config(String),

    #[error("object store error: {0}")]
    Backend(#[from] object_store::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn map_not_found(err: object_store::Error, key: &str) -> StorageError {
    match err {
        object_store::Error::NotFound { .. } => StorageError::NotFound(key.to_string()),
        other => StorageError::Backend(other),
    }
}

/// Object key of an asset's bytes
///
/// ```
/// use bb_server::storage::object_key;
/// use uuid::Uuid;
///
/// let key = object_key("google|42", Uuid::nil(), "final cut.mp4");
/// assert_eq!(key, "users/google_42/assets/00000000-0000-0000-0000-000000000000/final_cut.mp4");
/// ```
pub fn object_key(user_id: &str, asset_id: Uuid, file_name: &str) -> String {
    format!(
        "users/{}/assets/{}/{}",
        sanitize_file_name(user_id),
        asset_id,
        sanitize_file_name(file_name)
    )
}

/// MIME type of `bytes` by content sniffing, else the declared type
pub fn detect_mime(bytes: &[u8], declared: Option<&str>) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }
    declared
        .map(|d| d.split(';').next().unwrap_or(d).trim().to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Handle to the configured object store
#[derive(Clone)]
pub struct AssetStorage {
    store: Arc<dyn ObjectStore>,
    backend: &'static str,
}

impl std::fmt::Debug for AssetStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetStorage")
            .field("backend", &self.backend)
            .finish()
    }
}

impl AssetStorage {
    /// Build the store described by the `[storage]` TOML section
    pub fn from_config(config: &StorageConfig, root: &RootFolder) -> Result<Self, StorageError> {
        match config.backend {
            StorageBackend::S3 => {
                let bucket = config
                    .bucket
                    .as_deref()
                    .ok_or_else(|| StorageError::Config("storage.bucket is required for s3".into()))?;

                let mut builder = AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_allow_http(config.allow_http);
                if let Some(region) = &config.region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = &config.endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                if let Some(key_id) = &config.access_key_id {
                    builder = builder.with_access_key_id(key_id);
                }
                if let Some(secret) = &config.secret_access_key {
                    builder = builder.with_secret_access_key(secret);
                }

                info!("Object storage: s3 bucket '{}'", bucket);
                Ok(Self {
                    store: Arc::new(builder.build()?),
                    backend: "s3",
                })
            }
            StorageBackend::Local => {
                let path = config
                    .local_path
                    .clone()
                    .unwrap_or_else(|| root.objects_path());
                std::fs::create_dir_all(&path)?;
                info!("Object storage: local directory {}", path.display());
                Ok(Self {
                    store: Arc::new(LocalFileSystem::new_with_prefix(&path)?),
                    backend: "local",
                })
            }
            StorageBackend::Memory => {
                info!("Object storage: in-memory (contents are lost on exit)");
                Ok(Self::in_memory())
            }
        }
    }

    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            backend: "memory",
        }
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    pub async fn put(&self, key: &str, bytes: Bytes) -> Result<(), StorageError> {
        let size = bytes.len();
        self.store
            .put(&ObjectPath::from(key), PutPayload::from(bytes))
            .await?;
        debug!(key, size, "Stored object");
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let result = self
            .store
            .get(&ObjectPath::from(key))
            .await
            .map_err(|e| map_not_found(e, key))?;
        result.bytes().await.map_err(|e| map_not_found(e, key))
    }

    /// Stream an object's bytes
    pub async fn get_stream(
        &self,
        key: &str,
    ) -> Result<BoxStream<'static, Result<Bytes, StorageError>>, StorageError> {
        let result = self
            .store
            .get(&ObjectPath::from(key))
            .await
            .map_err(|e| map_not_found(e, key))?;
        Ok(result
            .into_stream()
            .map(|chunk| chunk.map_err(StorageError::Backend))
            .boxed())
    }

    /// Delete an object; returns false when it was already gone
    pub async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        match self.store.delete(&ObjectPath::from(key)).await {
            Ok(()) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::Backend(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[test]
    fn test_detect_mime_sniffs_content() {
        assert_eq!(detect_mime(PNG_HEADER, Some("text/plain")), "image/png");
    }

    #[test]
    fn test_detect_mime_falls_back_to_declared() {
        assert_eq!(detect_mime(b"hello", Some("Text/Plain; charset=utf-8")), "text/plain");
        assert_eq!(detect_mime(b"hello", None), "application/octet-stream");
        assert_eq!(detect_mime(b"hello", Some("")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_memory_round_trip_and_delete() {
        let storage = AssetStorage::in_memory();
        let key = object_key("u1", Uuid::new_v4(), "a.txt");

        storage.put(&key, Bytes::from_static(b"abc")).await.unwrap();
        assert_eq!(storage.get(&key).await.unwrap(), Bytes::from_static(b"abc"));

        let mut stream = storage.get_stream(&key).await.unwrap();
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"abc");

        assert!(storage.delete(&key).await.unwrap());
        assert!(matches!(storage.get(&key).await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_local_backend_writes_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = RootFolder::new(dir.path().to_path_buf());
        let storage = AssetStorage::from_config(&StorageConfig::default(), &root).unwrap();
        assert_eq!(storage.backend(), "local");

        storage.put("users/u/assets/x/f.bin", Bytes::from_static(b"1")).await.unwrap();
        assert!(root.objects_path().join("users/u/assets/x/f.bin").exists());
    }

    #[test]
    fn test_s3_requires_bucket() {
        let config = StorageConfig {
            backend: StorageBackend::S3,
            ..StorageConfig::default()
        };
        let root = RootFolder::new(std::env::temp_dir());
        assert!(matches!(
            AssetStorage::from_config(&config, &root),
            Err(StorageError::Config(_))
        ));
    }
}
