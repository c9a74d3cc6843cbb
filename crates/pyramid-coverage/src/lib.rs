//! Pyramidal multi-resolution raster coverages
//!
//! A coverage is stored as a set of pyramids, one per slice of the extra
//! axes (elevation, time, ...). Each pyramid holds mosaics at decreasing
//! resolutions, and each mosaic is a regular grid of fixed-size tiles
//! kept in a [`tile_storage::TileStore`]. This crate provides:
//!
//! - **Partial reads**: only the tiles intersecting a request are fetched
//! - **Resolution selection**: the coarsest mosaic that still satisfies
//!   the requested resolution is used
//! - **Consistent snapshots**: readers never observe a half-applied
//!   metadata change
//!
//! # Architecture
//!
//! ```text
//! ReadRequest (envelope, crs, resolution)
//!      │
//!      ▼
//! CoverageReader::read()
//!      │
//!      ├─► Resolve envelope: check CRS, clip to domain, reproject
//!      │
//!      ├─► PyramidSet::pyramids_matching(slice ranges)
//!      │         │
//!      │         └─► per pyramid: select_mosaic(resolution)
//!      │                   │
//!      │                   ├─► tile_range(bbox)
//!      │                   │
//!      │                   └─► fetch tiles concurrently, decode, blit
//!      │
//!      └─► CoverageStack (one GridCoverage or error per slice)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use pyramid_coverage::{CodecRegistry, PyramidConfig, PyramidResource, ReadRequest};
//!
//! let resource = PyramidResource::open(store, crs, PyramidConfig::from_env(),
//!     CodecRegistry::with_defaults(), Arc::new(IdentityTransform)).await?;
//!
//! let report = resource.writer()
//!     .ingest_raster(&raster, (-180.0, 90.0), (0.25, 0.25), &[0.0])
//!     .await?;
//!
//! let request = ReadRequest::horizontal(bbox, CrsCode::Epsg4326).with_resolution(1.0, 1.0);
//! let stack = resource.reader().read(&request).await?;
//! for coverage in stack.coverages() {
//!     // ...
//! }
//! ```

pub mod codec;
pub mod config;
pub mod descriptor;
pub mod downsample;
pub mod error;
pub mod model;
pub mod raster;
pub mod reader;
pub mod resource;
pub mod selection;
pub mod writer;

// Re-export commonly used types at crate root
pub use codec::{CodecRegistry, DeflateCodec, RasterCodec, RawCodec};
pub use config::{GenerationConfig, PyramidConfig};
pub use descriptor::{MosaicDescriptor, PyramidDescriptor};
pub use downsample::{downsample_2x, generate_pyramid, DownsampleMethod, PyramidLevelData};
pub use error::{CoverageError, Result};
pub use model::{Mosaic, MosaicGeometry, Pyramid, PyramidSet, TileRange};
pub use raster::RasterBuffer;
pub use reader::{CoverageReader, CoverageStack, GridCoverage, ReadRequest, SliceCoverage};
pub use resource::{CoverageStore, PyramidResource};
pub use writer::{CoverageWriter, IngestReport};
