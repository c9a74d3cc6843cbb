//! LRU cache for tile bytes, and a read-through store wrapper.

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StorageResult;
use crate::key::TileKey;
use crate::store::{DescriptorStore, TileStore};

/// Rough tile payload size used to bound the LRU entry count (256×256 f32).
const TILE_SIZE_ESTIMATE: usize = 256 * 256 * 4;

/// Statistics about the tile cache.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub memory_bytes: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU cache for tile bytes with memory-bounded eviction.
///
/// Every invalidation bumps a generation counter. A fill that started
/// before an invalidation is rejected by [`TileCache::insert_if_current`].
pub struct TileCache {
    cache: LruCache<TileKey, Bytes>,
    memory_limit: usize,
    current_memory: usize,
    generation: u64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl TileCache {
    /// Create a new tile cache with the given memory limit in bytes.
    pub fn new(memory_limit: usize) -> Self {
        let max_entries = (memory_limit / TILE_SIZE_ESTIMATE).max(16);

        Self {
            cache: LruCache::new(NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN)),
            memory_limit,
            current_memory: 0,
            generation: 0,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Try to get a tile from the cache.
    pub fn get(&mut self, key: &TileKey) -> Option<Bytes> {
        if let Some(data) = self.cache.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(data.clone())
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Current invalidation generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Insert a tile fetched while `generation` was current. Returns false,
    /// leaving the cache untouched, if an invalidation happened since.
    pub fn insert_if_current(&mut self, key: TileKey, data: Bytes, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.insert(key, data);
        true
    }

    /// Insert a tile, evicting least recently used entries to make room.
    pub fn insert(&mut self, key: TileKey, data: Bytes) {
        let data_size = data.len();
        self.evict(&key);

        while self.current_memory + data_size > self.memory_limit && !self.cache.is_empty() {
            if let Some((_, evicted)) = self.cache.pop_lru() {
                self.current_memory = self.current_memory.saturating_sub(evicted.len());
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        // Only insert if the data fits (or cache was empty)
        if data_size <= self.memory_limit {
            if let Some((_, evicted)) = self.cache.push(key, data) {
                // Entry-count bound reached before the memory bound.
                self.current_memory = self.current_memory.saturating_sub(evicted.len());
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
            self.current_memory += data_size;
        }
    }

    /// Drop one entry after its tile changed.
    pub fn remove(&mut self, key: &TileKey) {
        self.generation += 1;
        self.evict(key);
    }

    fn evict(&mut self, key: &TileKey) {
        if let Some(data) = self.cache.pop(key) {
            self.current_memory = self.current_memory.saturating_sub(data.len());
        }
    }

    /// Drop every entry of a mosaic, or of a whole pyramid.
    pub fn invalidate(&mut self, pyramid_id: &str, mosaic_id: Option<&str>) -> usize {
        let doomed: Vec<TileKey> = self
            .cache
            .iter()
            .filter(|(key, _)| key.belongs_to(pyramid_id, mosaic_id))
            .map(|(key, _)| key.clone())
            .collect();
        self.generation += 1;
        for key in &doomed {
            self.evict(key);
        }
        doomed.len()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
            memory_bytes: self.current_memory as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Clear all entries from the cache.
    pub fn clear(&mut self) -> usize {
        let dropped = self.cache.len();
        self.generation += 1;
        self.cache.clear();
        self.current_memory = 0;
        dropped
    }

    /// Get the current memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        self.current_memory
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Read-through cache in front of another [`TileStore`].
///
/// Only present tiles are cached. Writes and deletes go to the inner
/// store first and then invalidate the affected entries. A read that
/// raced with a write or delete returns what it fetched but does not
/// populate the cache.
pub struct CachedTileStore<S> {
    inner: S,
    cache: Arc<Mutex<TileCache>>,
}

impl<S> CachedTileStore<S> {
    pub fn new(inner: S, memory_limit: usize) -> Self {
        Self {
            inner,
            cache: Arc::new(Mutex::new(TileCache::new(memory_limit))),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }

    /// Handle on the cache that outlives type erasure of the store.
    pub fn handle(&self) -> TileCacheHandle {
        TileCacheHandle {
            cache: Arc::clone(&self.cache),
        }
    }
}

/// Shared control over a [`CachedTileStore`]'s cache.
#[derive(Clone)]
pub struct TileCacheHandle {
    cache: Arc<Mutex<TileCache>>,
}

impl TileCacheHandle {
    /// Drop every cached tile. Returns the number of entries dropped.
    pub async fn clear(&self) -> usize {
        self.cache.lock().await.clear()
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }
}

#[async_trait]
impl<S: TileStore> TileStore for CachedTileStore<S> {
    async fn get(&self, key: &TileKey) -> StorageResult<Option<Bytes>> {
        let generation = {
            let mut cache = self.cache.lock().await;
            if let Some(data) = cache.get(key) {
                return Ok(Some(data));
            }
            cache.generation()
        };

        let data = self.inner.get(key).await?;
        if let Some(bytes) = &data {
            let filled = self
                .cache
                .lock()
                .await
                .insert_if_current(key.clone(), bytes.clone(), generation);
            if !filled {
                debug!(tile = %key, "Skipped cache fill after concurrent invalidation");
            }
        }
        Ok(data)
    }

    async fn put(&self, key: &TileKey, data: Bytes) -> StorageResult<()> {
        self.inner.put(key, data).await?;
        self.cache.lock().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &TileKey) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn delete(&self, pyramid_id: &str, mosaic_id: Option<&str>) -> StorageResult<u64> {
        let removed = self.inner.delete(pyramid_id, mosaic_id).await?;
        let dropped = self.cache.lock().await.invalidate(pyramid_id, mosaic_id);
        debug!(pyramid = pyramid_id, mosaic = ?mosaic_id, dropped, "Invalidated cached tiles");
        Ok(removed)
    }
}

#[async_trait]
impl<S: DescriptorStore> DescriptorStore for CachedTileStore<S> {
    async fn put_descriptor(&self, pyramid_id: &str, data: Bytes) -> StorageResult<()> {
        self.inner.put_descriptor(pyramid_id, data).await
    }

    async fn get_descriptor(&self, pyramid_id: &str) -> StorageResult<Option<Bytes>> {
        self.inner.get_descriptor(pyramid_id).await
    }

    async fn list_descriptors(&self) -> StorageResult<Vec<String>> {
        self.inner.list_descriptors().await
    }

    async fn delete_descriptor(&self, pyramid_id: &str) -> StorageResult<()> {
        self.inner.delete_descriptor(pyramid_id).await
    }
}
