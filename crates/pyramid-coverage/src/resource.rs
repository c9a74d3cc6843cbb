//! A coverage resource: one pyramid set over one storage backend.
//!
//! The resource owns the current metadata snapshot. Readers clone the
//! snapshot `Arc` when a read starts and never see a half-applied change;
//! writers build a new set, persist its descriptor and then swap it in.

use std::sync::Arc;

use coverage_common::{CrsTransform, Envelope, ReferenceSystem};
use tile_storage::{CacheStats, CachedTileStore, DescriptorStore, TileCacheHandle, TileStore};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};

use crate::codec::CodecRegistry;
use crate::config::PyramidConfig;
use crate::descriptor::PyramidDescriptor;
use crate::error::{CoverageError, Result};
use crate::model::PyramidSet;
use crate::reader::CoverageReader;
use crate::writer::CoverageWriter;

/// Backend holding both tiles and descriptors.
pub trait CoverageStore: TileStore + DescriptorStore {}

impl<T: TileStore + DescriptorStore> CoverageStore for T {}

/// State shared by the resource and every reader/writer handle.
pub(crate) struct ResourceInner {
    pub(crate) store: Arc<dyn CoverageStore>,
    pub(crate) reference_system: ReferenceSystem,
    pub(crate) config: PyramidConfig,
    pub(crate) codecs: CodecRegistry,
    pub(crate) transform: Arc<dyn CrsTransform>,
    /// Present when tile reads go through an LRU cache.
    cache: Option<TileCacheHandle>,
    snapshot: RwLock<Arc<PyramidSet>>,
    /// Serializes metadata mutations.
    write_lock: Mutex<()>,
}

impl ResourceInner {
    /// Current metadata snapshot.
    pub(crate) async fn snapshot(&self) -> Arc<PyramidSet> {
        self.snapshot.read().await.clone()
    }

    /// Take the writer lock.
    pub(crate) async fn lock_writes(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    /// Publish a new snapshot. Callers hold the writer lock.
    pub(crate) async fn publish(&self, set: PyramidSet) {
        *self.snapshot.write().await = Arc::new(set);
    }

    /// Read every descriptor and build a set from them.
    async fn load(&self) -> Result<PyramidSet> {
        let mut set = PyramidSet::new(self.reference_system.clone());

        for id in self.store.list_descriptors().await? {
            let Some(bytes) = self.store.get_descriptor(&id).await? else {
                // Deleted between listing and reading.
                continue;
            };
            let pyramid = PyramidDescriptor::from_bytes(&bytes)
                .and_then(PyramidDescriptor::into_pyramid)
                .map_err(|e| CoverageError::invalid_metadata(format!("descriptor {}: {}", id, e)))?;

            if pyramid.id != id {
                return Err(CoverageError::invalid_metadata(format!(
                    "descriptor stored under {} describes pyramid {}",
                    id, pyramid.id
                )));
            }
            debug!(pyramid = %pyramid.id, mosaics = pyramid.mosaics().len(), "Loaded pyramid descriptor");
            set.insert(pyramid)?;
        }

        Ok(set)
    }
}

/// Entry point for reading and writing one pyramidal coverage.
#[derive(Clone)]
pub struct PyramidResource {
    inner: Arc<ResourceInner>,
}

impl PyramidResource {
    /// Open a resource over `store`, loading every persisted descriptor.
    ///
    /// When `config.tile_cache_size_mb` is non-zero, tile reads go through
    /// an LRU cache of that size. Descriptors stored with another
    /// reference system fail with `IncompatibleReferenceSystem`; malformed
    /// ones with `InvalidMetadata`.
    #[instrument(skip_all, fields(crs = %reference_system))]
    pub async fn open<S>(
        store: S,
        reference_system: ReferenceSystem,
        config: PyramidConfig,
        codecs: CodecRegistry,
        transform: Arc<dyn CrsTransform>,
    ) -> Result<Self>
    where
        S: TileStore + DescriptorStore + 'static,
    {
        config.validate_with(&codecs)?;

        let (store, cache) = if config.tile_cache_size_mb > 0 {
            let cached = CachedTileStore::new(store, config.tile_cache_size_bytes());
            let handle = cached.handle();
            let store: Arc<dyn CoverageStore> = Arc::new(cached);
            (store, Some(handle))
        } else {
            let store: Arc<dyn CoverageStore> = Arc::new(store);
            (store, None)
        };

        let inner = ResourceInner {
            store,
            reference_system: reference_system.clone(),
            config,
            codecs,
            transform,
            cache,
            snapshot: RwLock::new(Arc::new(PyramidSet::new(reference_system))),
            write_lock: Mutex::new(()),
        };

        let set = inner.load().await?;
        info!(pyramids = set.len(), "Opened pyramid resource");
        *inner.snapshot.write().await = Arc::new(set);

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Re-read descriptors from storage, replacing the current snapshot.
    ///
    /// Cached tiles are dropped too, since another process may have
    /// rewritten them.
    pub async fn reload(&self) -> Result<()> {
        let _guard = self.inner.lock_writes().await;
        let set = self.inner.load().await?;
        let dropped = match &self.inner.cache {
            Some(cache) => cache.clear().await,
            None => 0,
        };
        info!(pyramids = set.len(), dropped_tiles = dropped, "Reloaded pyramid resource");
        self.inner.publish(set).await;
        Ok(())
    }

    /// Tile cache statistics, `None` when caching is disabled.
    pub async fn cache_stats(&self) -> Option<CacheStats> {
        match &self.inner.cache {
            Some(cache) => Some(cache.stats().await),
            None => None,
        }
    }

    pub fn reader(&self) -> CoverageReader {
        CoverageReader::new(self.inner.clone())
    }

    pub fn writer(&self) -> CoverageWriter {
        CoverageWriter::new(self.inner.clone())
    }

    /// Envelope of the whole dataset, `None` while it has no mosaics.
    pub async fn envelope(&self) -> Option<Envelope> {
        self.inner.snapshot().await.envelope()
    }

    /// The current metadata snapshot.
    pub async fn pyramid_set(&self) -> Arc<PyramidSet> {
        self.inner.snapshot().await
    }

    pub fn reference_system(&self) -> &ReferenceSystem {
        &self.inner.reference_system
    }

    pub fn config(&self) -> &PyramidConfig {
        &self.inner.config
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.inner.codecs
    }
}

impl std::fmt::Debug for PyramidResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PyramidResource")
            .field("reference_system", &self.inner.reference_system)
            .field("config", &self.inner.config)
            .field("codecs", &self.inner.codecs)
            .finish()
    }
}
