//! Shared setup for the coverage integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use coverage_common::{BoundingBox, CrsCode, CrsTransform, DimensionAxis, IdentityTransform, ReferenceSystem};
use pyramid_coverage::{
    CodecRegistry, CoverageWriter, GenerationConfig, PyramidConfig, PyramidResource, RasterBuffer,
};
use test_utils::{create_tile_pattern, MosaicLayout};
use tile_storage::{DescriptorStore, MemoryTileStore, TileStore};

/// Added to every coarse-mosaic sample so the two mosaics are told apart.
pub const COARSE_OFFSET: f32 = 500_000.0;

/// Added to every sample of the upper-slice pyramid.
pub const UPPER_OFFSET: f32 = 1_000_000.0;

/// Geographic horizontal CRS plus an elevation axis.
pub fn wgs84_elevation() -> ReferenceSystem {
    ReferenceSystem::horizontal(CrsCode::Epsg4326).with_axis(DimensionAxis::elevation())
}

pub fn bbox((min_x, min_y, max_x, max_y): (f64, f64, f64, f64)) -> BoundingBox {
    BoundingBox::new(min_x, min_y, max_x, max_y)
}

/// Uncompressed tiles, no cache, 10 pixel tiles for ingestion.
pub fn test_config() -> PyramidConfig {
    PyramidConfig {
        tile_format: "raw".to_string(),
        tile_cache_size_mb: 0,
        generation: GenerationConfig {
            tile_size: 10,
            min_dimension: 10,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// [`test_config`] with a small tile cache in front of the store.
pub fn cached_config() -> PyramidConfig {
    PyramidConfig {
        tile_cache_size_mb: 4,
        ..test_config()
    }
}

pub async fn open_resource<S>(store: S, transform: Arc<dyn CrsTransform>) -> PyramidResource
where
    S: TileStore + DescriptorStore + 'static,
{
    open_resource_with(store, transform, test_config()).await
}

pub async fn open_resource_with<S>(
    store: S,
    transform: Arc<dyn CrsTransform>,
    config: PyramidConfig,
) -> PyramidResource
where
    S: TileStore + DescriptorStore + 'static,
{
    test_utils::init_tracing();
    PyramidResource::open(
        store,
        wgs84_elevation(),
        config,
        CodecRegistry::with_defaults(),
        transform,
    )
    .await
    .expect("open resource")
}

/// A resource over an in-memory store, returning the store for inspection.
pub async fn memory_resource() -> (Arc<MemoryTileStore>, PyramidResource) {
    let store = Arc::new(MemoryTileStore::new());
    let resource = open_resource(store.clone(), Arc::new(IdentityTransform)).await;
    (store, resource)
}

/// Like [`memory_resource`], with tile reads going through the cache.
pub async fn cached_memory_resource() -> (Arc<MemoryTileStore>, PyramidResource) {
    let store = Arc::new(MemoryTileStore::new());
    let resource = open_resource_with(store.clone(), Arc::new(IdentityTransform), cached_config()).await;
    (store, resource)
}

/// Ids of a pyramid built by [`build_reference_pyramid`].
#[derive(Debug, Clone)]
pub struct ReferencePyramid {
    pub pyramid_id: String,
    pub coarse_id: String,
    pub fine_id: String,
}

/// Create a mosaic from its fixture form and fill every tile with
/// [`create_tile_pattern`] samples, skipping the tiles in `skip`.
pub async fn write_mosaic(
    writer: &CoverageWriter,
    pyramid_id: &str,
    mosaic_id: &str,
    layout: MosaicLayout,
    offset: f32,
    skip: &[(u32, u32)],
) -> String {
    let id = writer
        .create_mosaic_with_id(
            pyramid_id,
            mosaic_id,
            (layout.grid_cols, layout.grid_rows),
            (layout.tile_width, layout.tile_height),
            &[layout.upper_left.0, layout.upper_left.1],
            layout.resolution,
        )
        .await
        .expect("create mosaic");

    let (width, height) = (layout.tile_width as usize, layout.tile_height as usize);
    for row in 0..layout.grid_rows {
        for col in 0..layout.grid_cols {
            if skip.contains(&(col, row)) {
                continue;
            }
            let tile = RasterBuffer::single_band(
                width,
                height,
                create_tile_pattern(col, row, width, height, offset),
            )
            .expect("tile raster");
            writer
                .write_raster(pyramid_id, &id, col, row, &tile)
                .await
                .expect("write tile");
        }
    }
    id
}

/// The two-mosaic reference pyramid at `slice`.
///
/// Fine samples are `global_col * 1000 + global_row + offset`; coarse
/// samples add [`COARSE_OFFSET`] on top.
pub async fn build_reference_pyramid(
    writer: &CoverageWriter,
    slice: f64,
    offset: f32,
    skip_fine: &[(u32, u32)],
) -> ReferencePyramid {
    let pyramid_id = writer
        .create_pyramid(&wgs84_elevation(), &[slice])
        .await
        .expect("create pyramid");
    let coarse_id = write_mosaic(
        writer,
        &pyramid_id,
        "coarse",
        test_utils::mosaics::COARSE,
        offset + COARSE_OFFSET,
        &[],
    )
    .await;
    let fine_id = write_mosaic(
        writer,
        &pyramid_id,
        "fine",
        test_utils::mosaics::FINE,
        offset,
        skip_fine,
    )
    .await;

    ReferencePyramid {
        pyramid_id,
        coarse_id,
        fine_id,
    }
}
