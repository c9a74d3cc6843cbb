//! Tile storage on top of `object_store` (MinIO/S3, local filesystem, memory).

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::{
    aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory, path::Path, ObjectStore,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{StorageError, StorageResult};
use crate::key::{StoragePath, TileKey};
use crate::store::{DescriptorStore, TileStore};

/// Configuration for an S3-compatible object storage connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// S3/MinIO endpoint URL
    pub endpoint: String,
    /// Bucket name
    pub bucket: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// AWS region (use "us-east-1" for MinIO)
    pub region: String,
    /// Allow HTTP (for local MinIO)
    pub allow_http: bool,
    /// Key prefix under which the dataset lives, e.g. "coverages/sst"
    #[serde(default)]
    pub prefix: Option<String>,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://minio:9000".to_string(),
            bucket: "coverage-data".to_string(),
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
            region: "us-east-1".to_string(),
            allow_http: true,
            prefix: None,
        }
    }
}

impl ObjectStorageConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("S3_ENDPOINT").unwrap_or(defaults.endpoint),
            bucket: std::env::var("S3_BUCKET").unwrap_or(defaults.bucket),
            access_key_id: std::env::var("S3_ACCESS_KEY").unwrap_or(defaults.access_key_id),
            secret_access_key: std::env::var("S3_SECRET_KEY")
                .unwrap_or(defaults.secret_access_key),
            region: std::env::var("S3_REGION").unwrap_or(defaults.region),
            allow_http: std::env::var("S3_ALLOW_HTTP")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.allow_http),
            prefix: std::env::var("S3_PREFIX").ok().filter(|p| !p.is_empty()),
        }
    }
}

/// Tile and descriptor storage backed by any [`ObjectStore`].
///
/// Object stores replace objects atomically on `put`, which gives the
/// no-torn-read guarantee the [`TileStore`] contract asks for.
pub struct ObjectTileStore {
    store: Arc<dyn ObjectStore>,
    prefix: Option<String>,
    label: String,
}

impl ObjectTileStore {
    /// Wrap an existing object store.
    pub fn new(store: Arc<dyn ObjectStore>, label: impl Into<String>) -> Self {
        Self {
            store,
            prefix: None,
            label: label.into(),
        }
    }

    /// Place every object under `prefix`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim_matches('/').to_string();
        self.prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Create an S3/MinIO-backed store from config.
    pub fn from_config(config: &ObjectStorageConfig) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_endpoint(&config.endpoint)
            .with_bucket_name(&config.bucket)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key)
            .with_region(&config.region);

        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::backend(format!("Failed to create S3 client: {}", e)))?;

        let mut tile_store = Self::new(Arc::new(store), config.bucket.clone());
        if let Some(prefix) = &config.prefix {
            tile_store = tile_store.with_prefix(prefix.clone());
        }
        Ok(tile_store)
    }

    /// Store tiles as files under `root`, creating the directory if needed.
    pub fn local(root: impl AsRef<std::path::Path>) -> StorageResult<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        let store = LocalFileSystem::new_with_prefix(root).map_err(|e| {
            StorageError::backend(format!("Failed to open {}: {}", root.display(), e))
        })?;
        Ok(Self::new(Arc::new(store), root.display().to_string()))
    }

    /// Object-store semantics without persistence.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "memory")
    }

    fn location(&self, relative: &str) -> Path {
        match &self.prefix {
            Some(prefix) => Path::from(format!("{}/{}", prefix, relative)),
            None => Path::from(relative),
        }
    }

    fn relative<'a>(&self, location: &'a str) -> &'a str {
        match &self.prefix {
            Some(prefix) => location
                .strip_prefix(prefix.as_str())
                .map(|rest| rest.trim_start_matches('/'))
                .unwrap_or(location),
            None => location,
        }
    }

    async fn get_object(&self, location: &Path) -> StorageResult<Option<Bytes>> {
        let result = match self.store.get(location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => {
                return Err(StorageError::backend(format!(
                    "Failed to read {}: {}",
                    location, e
                )))
            }
        };

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::backend(format!("Failed to read bytes: {}", e)))?;

        debug!(size = bytes.len(), "Read object");
        Ok(Some(bytes))
    }

    async fn put_object(&self, location: &Path, data: Bytes) -> StorageResult<()> {
        debug!(size = data.len(), "Writing object");

        self.store
            .put(location, data.into())
            .await
            .map_err(|e| StorageError::backend(format!("Failed to write {}: {}", location, e)))?;

        Ok(())
    }

    /// List objects with a given prefix. A missing prefix lists as empty.
    async fn list(&self, prefix: &Path) -> StorageResult<Vec<Path>> {
        let mut paths = Vec::new();

        let mut stream = self.store.list(Some(prefix));
        loop {
            match stream.try_next().await {
                Ok(Some(meta)) => paths.push(meta.location),
                Ok(None) => break,
                Err(object_store::Error::NotFound { .. }) => break,
                Err(e) => return Err(StorageError::backend(format!("List failed: {}", e))),
            }
        }

        Ok(paths)
    }

    /// Get storage statistics (total size and object count).
    pub async fn stats(&self) -> StorageResult<StorageStats> {
        let mut total_size: u64 = 0;
        let mut object_count: u64 = 0;

        let root = self.location(StoragePath::root());
        let mut stream = self.store.list(Some(&root));
        loop {
            match stream.try_next().await {
                Ok(Some(meta)) => {
                    total_size += meta.size as u64;
                    object_count += 1;
                }
                Ok(None) | Err(object_store::Error::NotFound { .. }) => break,
                Err(e) => return Err(StorageError::backend(format!("List failed: {}", e))),
            }
        }

        Ok(StorageStats {
            total_size,
            object_count,
            label: self.label.clone(),
        })
    }
}

#[async_trait]
impl TileStore for ObjectTileStore {
    #[instrument(skip(self), fields(store = %self.label, tile = %key))]
    async fn get(&self, key: &TileKey) -> StorageResult<Option<Bytes>> {
        self.get_object(&self.location(&StoragePath::tile(key))).await
    }

    #[instrument(skip(self, data), fields(store = %self.label, tile = %key))]
    async fn put(&self, key: &TileKey, data: Bytes) -> StorageResult<()> {
        self.put_object(&self.location(&StoragePath::tile(key)), data)
            .await
    }

    async fn exists(&self, key: &TileKey) -> StorageResult<bool> {
        let location = self.location(&StoragePath::tile(key));

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::backend(format!(
                "Failed to check {}: {}",
                location, e
            ))),
        }
    }

    #[instrument(skip(self), fields(store = %self.label))]
    async fn delete(&self, pyramid_id: &str, mosaic_id: Option<&str>) -> StorageResult<u64> {
        let prefix = self.location(&StoragePath::tiles_prefix(pyramid_id, mosaic_id));
        let mut removed = 0u64;

        for location in self.list(&prefix).await? {
            match self.store.delete(&location).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => removed += 1,
                Err(e) => {
                    return Err(StorageError::backend(format!(
                        "Failed to delete {}: {}",
                        location, e
                    )))
                }
            }
        }

        debug!(removed, "Deleted tiles");
        Ok(removed)
    }
}

#[async_trait]
impl DescriptorStore for ObjectTileStore {
    #[instrument(skip(self, data), fields(store = %self.label))]
    async fn put_descriptor(&self, pyramid_id: &str, data: Bytes) -> StorageResult<()> {
        self.put_object(&self.location(&StoragePath::descriptor(pyramid_id)), data)
            .await
    }

    async fn get_descriptor(&self, pyramid_id: &str) -> StorageResult<Option<Bytes>> {
        self.get_object(&self.location(&StoragePath::descriptor(pyramid_id)))
            .await
    }

    async fn list_descriptors(&self) -> StorageResult<Vec<String>> {
        let root = self.location(StoragePath::root());
        let mut ids: Vec<String> = self
            .list(&root)
            .await?
            .iter()
            .filter_map(|location| {
                let location = location.to_string();
                StoragePath::pyramid_of_descriptor(self.relative(&location)).map(str::to_string)
            })
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn delete_descriptor(&self, pyramid_id: &str) -> StorageResult<()> {
        let location = self.location(&StoragePath::descriptor(pyramid_id));
        match self.store.delete(&location).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(StorageError::backend(format!(
                "Failed to delete {}: {}",
                location, e
            ))),
        }
    }
}

/// Storage statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageStats {
    /// Total size in bytes
    pub total_size: u64,
    /// Number of objects
    pub object_count: u64,
    /// Bucket name or root directory
    pub label: String,
}
