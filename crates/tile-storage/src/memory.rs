//! In-process storage backend.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StorageResult;
use crate::key::TileKey;
use crate::store::{DescriptorStore, TileStore};

/// Tiles and descriptors held in memory.
///
/// Every operation swaps whole `Bytes` values under a lock, so readers
/// never observe a torn tile.
#[derive(Default)]
pub struct MemoryTileStore {
    tiles: RwLock<HashMap<TileKey, Bytes>>,
    descriptors: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tiles.
    pub async fn tile_count(&self) -> usize {
        self.tiles.read().await.len()
    }

    /// Total payload bytes across all tiles.
    pub async fn total_bytes(&self) -> u64 {
        self.tiles
            .read()
            .await
            .values()
            .map(|b| b.len() as u64)
            .sum()
    }
}

#[async_trait]
impl TileStore for MemoryTileStore {
    async fn get(&self, key: &TileKey) -> StorageResult<Option<Bytes>> {
        Ok(self.tiles.read().await.get(key).cloned())
    }

    async fn put(&self, key: &TileKey, data: Bytes) -> StorageResult<()> {
        debug!(tile = %key, size = data.len(), "Writing tile");
        self.tiles.write().await.insert(key.clone(), data);
        Ok(())
    }

    async fn exists(&self, key: &TileKey) -> StorageResult<bool> {
        Ok(self.tiles.read().await.contains_key(key))
    }

    async fn delete(&self, pyramid_id: &str, mosaic_id: Option<&str>) -> StorageResult<u64> {
        let mut tiles = self.tiles.write().await;
        let before = tiles.len();
        tiles.retain(|key, _| !key.belongs_to(pyramid_id, mosaic_id));
        let removed = (before - tiles.len()) as u64;
        debug!(pyramid = pyramid_id, mosaic = ?mosaic_id, removed, "Deleted tiles");
        Ok(removed)
    }
}

#[async_trait]
impl DescriptorStore for MemoryTileStore {
    async fn put_descriptor(&self, pyramid_id: &str, data: Bytes) -> StorageResult<()> {
        self.descriptors
            .write()
            .await
            .insert(pyramid_id.to_string(), data);
        Ok(())
    }

    async fn get_descriptor(&self, pyramid_id: &str) -> StorageResult<Option<Bytes>> {
        Ok(self.descriptors.read().await.get(pyramid_id).cloned())
    }

    async fn list_descriptors(&self) -> StorageResult<Vec<String>> {
        Ok(self.descriptors.read().await.keys().cloned().collect())
    }

    async fn delete_descriptor(&self, pyramid_id: &str) -> StorageResult<()> {
        self.descriptors.write().await.remove(pyramid_id);
        Ok(())
    }
}
