//! Storage abstractions for pyramid coverages.
//!
//! Provides unified interfaces for:
//! - Tile bytes addressed by (pyramid, mosaic, column, row)
//! - Per-pyramid metadata descriptors
//!
//! Backends:
//! - [`MemoryTileStore`]: process-local maps, for tests and scratch datasets
//! - [`ObjectTileStore`]: any `object_store` backend (S3/MinIO, local
//!   filesystem, in-memory)
//! - [`CachedTileStore`]: read-through LRU wrapper around another store

pub mod cache;
pub mod error;
pub mod key;
pub mod memory;
pub mod object_store;
pub mod store;

pub use self::object_store::{ObjectStorageConfig, ObjectTileStore, StorageStats};
pub use cache::{CacheStats, CachedTileStore, TileCache, TileCacheHandle};
pub use error::{StorageError, StorageResult};
pub use key::{validate_id, StoragePath, TileKey};
pub use memory::MemoryTileStore;
pub use store::{DescriptorStore, TileStore};
