//! Backend contracts consumed by the coverage engine.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::error::StorageResult;
use crate::key::TileKey;

/// Byte-level tile storage.
///
/// Implementations must never expose a partially written tile: a read
/// concurrent with a write returns either the old or the new content.
/// Writes to the same key are last-write-wins.
#[async_trait]
pub trait TileStore: Send + Sync {
    /// Read a tile. `Ok(None)` means the tile was never written.
    async fn get(&self, key: &TileKey) -> StorageResult<Option<Bytes>>;

    /// Write a tile, replacing any previous content.
    async fn put(&self, key: &TileKey, data: Bytes) -> StorageResult<()>;

    /// Check if a tile exists.
    async fn exists(&self, key: &TileKey) -> StorageResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Remove every tile of a mosaic, or of the whole pyramid when
    /// `mosaic_id` is `None`. Returns the number of tiles removed.
    async fn delete(&self, pyramid_id: &str, mosaic_id: Option<&str>) -> StorageResult<u64>;
}

/// Storage for per-pyramid metadata descriptors.
///
/// Descriptors are opaque bytes here; the coverage crate owns the format.
#[async_trait]
pub trait DescriptorStore: Send + Sync {
    async fn put_descriptor(&self, pyramid_id: &str, data: Bytes) -> StorageResult<()>;

    async fn get_descriptor(&self, pyramid_id: &str) -> StorageResult<Option<Bytes>>;

    /// Ids of every pyramid that has a descriptor, sorted.
    async fn list_descriptors(&self) -> StorageResult<Vec<String>>;

    async fn delete_descriptor(&self, pyramid_id: &str) -> StorageResult<()>;
}

#[async_trait]
impl<T: TileStore + ?Sized> TileStore for Arc<T> {
    async fn get(&self, key: &TileKey) -> StorageResult<Option<Bytes>> {
        (**self).get(key).await
    }

    async fn put(&self, key: &TileKey, data: Bytes) -> StorageResult<()> {
        (**self).put(key, data).await
    }

    async fn exists(&self, key: &TileKey) -> StorageResult<bool> {
        (**self).exists(key).await
    }

    async fn delete(&self, pyramid_id: &str, mosaic_id: Option<&str>) -> StorageResult<u64> {
        (**self).delete(pyramid_id, mosaic_id).await
    }
}

#[async_trait]
impl<T: DescriptorStore + ?Sized> DescriptorStore for Arc<T> {
    async fn put_descriptor(&self, pyramid_id: &str, data: Bytes) -> StorageResult<()> {
        (**self).put_descriptor(pyramid_id, data).await
    }

    async fn get_descriptor(&self, pyramid_id: &str) -> StorageResult<Option<Bytes>> {
        (**self).get_descriptor(pyramid_id).await
    }

    async fn list_descriptors(&self) -> StorageResult<Vec<String>> {
        (**self).list_descriptors().await
    }

    async fn delete_descriptor(&self, pyramid_id: &str) -> StorageResult<()> {
        (**self).delete_descriptor(pyramid_id).await
    }
}
