//! Ingestion: creating pyramids and mosaics and writing tiles.

use std::sync::Arc;

use bytes::Bytes;
use coverage_common::ReferenceSystem;
use futures::stream::{self, StreamExt, TryStreamExt};
use tile_storage::validate_id;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::codec::RasterCodec;
use crate::descriptor::PyramidDescriptor;
use crate::downsample::{generate_pyramid, PyramidLevelData};
use crate::error::{CoverageError, Result};
use crate::model::{Mosaic, MosaicGeometry, Pyramid};
use crate::raster::RasterBuffer;
use crate::resource::ResourceInner;

/// Outcome of [`CoverageWriter::ingest_raster`].
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub pyramid_id: String,
    /// Generated mosaics, native resolution first.
    pub mosaic_ids: Vec<String>,
    pub tiles_written: usize,
}

/// Write handle on a [`PyramidResource`](crate::PyramidResource).
///
/// Metadata changes are serialized across every writer of the resource
/// and become visible to readers only once their descriptor is stored.
/// Tile writes are not serialized; the last write to an address wins.
#[derive(Clone)]
pub struct CoverageWriter {
    inner: Arc<ResourceInner>,
}

fn check_id(id: &str) -> Result<()> {
    validate_id(id).map_err(|_| CoverageError::InvalidId(id.to_string()))
}

impl CoverageWriter {
    pub(crate) fn new(inner: Arc<ResourceInner>) -> Self {
        Self { inner }
    }

    /// Create an empty pyramid at `slice` with a generated id.
    pub async fn create_pyramid(&self, crs: &ReferenceSystem, slice: &[f64]) -> Result<String> {
        self.create_pyramid_with_id(&Uuid::new_v4().to_string(), crs, slice)
            .await
    }

    /// Create an empty pyramid under a caller-chosen id.
    ///
    /// `crs` must be the resource's reference system. With
    /// `enforce_unique_slices` a second pyramid at an occupied slice fails
    /// with `DuplicatePyramid`.
    #[instrument(skip(self, crs), fields(crs = %crs))]
    pub async fn create_pyramid_with_id(
        &self,
        id: &str,
        crs: &ReferenceSystem,
        slice: &[f64],
    ) -> Result<String> {
        check_id(id)?;
        let pyramid = Pyramid::new(
            id,
            crs.clone(),
            slice.to_vec(),
            self.inner.config.tile_format.as_str(),
        )?;

        let _guard = self.inner.lock_writes().await;
        let mut set = (*self.inner.snapshot().await).clone();

        if self.inner.config.enforce_unique_slices {
            if let Some(existing) = set.pyramid_at(slice, self.inner.config.slice_tolerance) {
                return Err(CoverageError::DuplicatePyramid(format!(
                    "pyramid {} already sits at slice {:?}",
                    existing.id, slice
                )));
            }
        }

        set.insert(pyramid.clone())?;
        self.persist(&pyramid).await?;
        self.inner.publish(set).await;

        info!(pyramid = id, slice = ?slice, "Created pyramid");
        Ok(id.to_string())
    }

    /// Add a mosaic with a generated id.
    ///
    /// `corner` is the upper-left corner, either 2-D or with the pyramid's
    /// slice on the extra axes.
    pub async fn create_mosaic(
        &self,
        pyramid_id: &str,
        grid_size: (u32, u32),
        tile_size: (u32, u32),
        corner: &[f64],
        resolution: (f64, f64),
    ) -> Result<String> {
        self.create_mosaic_with_id(
            pyramid_id,
            &Uuid::new_v4().to_string(),
            grid_size,
            tile_size,
            corner,
            resolution,
        )
        .await
    }

    /// Add a mosaic under a caller-chosen id.
    ///
    /// Fails with `InvalidGeometry` for non-positive sizes or resolution
    /// and `DuplicateResolution` when the pyramid already has a mosaic at
    /// this resolution.
    pub async fn create_mosaic_with_id(
        &self,
        pyramid_id: &str,
        mosaic_id: &str,
        grid_size: (u32, u32),
        tile_size: (u32, u32),
        corner: &[f64],
        resolution: (f64, f64),
    ) -> Result<String> {
        let mosaic = self
            .add_mosaic(pyramid_id, mosaic_id, grid_size, tile_size, corner, resolution)
            .await?;
        Ok(mosaic.id)
    }

    #[instrument(skip(self, corner))]
    async fn add_mosaic(
        &self,
        pyramid_id: &str,
        mosaic_id: &str,
        grid_size: (u32, u32),
        tile_size: (u32, u32),
        corner: &[f64],
        resolution: (f64, f64),
    ) -> Result<Mosaic> {
        check_id(mosaic_id)?;

        let _guard = self.inner.lock_writes().await;
        let mut set = (*self.inner.snapshot().await).clone();
        let pyramid = set
            .get_mut(pyramid_id)
            .ok_or_else(|| CoverageError::PyramidNotFound(pyramid_id.to_string()))?;

        let geometry = MosaicGeometry::new(
            pyramid.complete_corner(corner)?,
            grid_size,
            tile_size,
            resolution,
        );
        let mosaic = pyramid.add_mosaic(mosaic_id, geometry)?.clone();

        self.persist(pyramid).await?;
        self.inner.publish(set).await;

        info!(
            pyramid = pyramid_id,
            mosaic = mosaic_id,
            grid = ?grid_size,
            tile = ?tile_size,
            resolution = ?resolution,
            "Created mosaic"
        );
        Ok(mosaic)
    }

    /// Store encoded tile bytes, replacing any previous tile.
    ///
    /// Fails with `OutOfRange` outside the mosaic grid and `Io` when the
    /// backend fails. Nothing is retried.
    pub async fn write_tile(
        &self,
        pyramid_id: &str,
        mosaic_id: &str,
        col: u32,
        row: u32,
        data: Bytes,
    ) -> Result<()> {
        let (_, mosaic) = self.lookup(pyramid_id, mosaic_id).await?;
        mosaic
            .write_tile(self.inner.store.as_ref(), col, row, data)
            .await
    }

    /// Encode `raster` with the pyramid's codec and store it as one tile.
    ///
    /// The raster must have exactly the mosaic's tile size.
    pub async fn write_raster(
        &self,
        pyramid_id: &str,
        mosaic_id: &str,
        col: u32,
        row: u32,
        raster: &RasterBuffer,
    ) -> Result<()> {
        let (pyramid, mosaic) = self.lookup(pyramid_id, mosaic_id).await?;
        let codec = self.inner.codecs.get(&pyramid.tile_format)?;
        self.put_raster(&mosaic, codec.as_ref(), col, row, raster)
            .await
    }

    /// Remove a pyramid, its descriptor and every tile. Returns the
    /// number of tiles removed.
    ///
    /// The snapshot only changes once storage is updated, so a failed
    /// delete leaves the pyramid listed.
    #[instrument(skip(self))]
    pub async fn delete_pyramid(&self, pyramid_id: &str) -> Result<u64> {
        let _guard = self.inner.lock_writes().await;
        let mut set = (*self.inner.snapshot().await).clone();
        if set.remove(pyramid_id).is_none() {
            return Err(CoverageError::PyramidNotFound(pyramid_id.to_string()));
        }

        // Tiles go first: if anything fails the pyramid stays listed and
        // the delete can be retried.
        let removed = self.inner.store.delete(pyramid_id, None).await?;
        self.inner.store.delete_descriptor(pyramid_id).await?;
        self.inner.publish(set).await;

        info!(pyramid = pyramid_id, tiles = removed, "Deleted pyramid");
        Ok(removed)
    }

    /// Remove one mosaic and its tiles. Returns the number of tiles removed.
    #[instrument(skip(self))]
    pub async fn delete_mosaic(&self, pyramid_id: &str, mosaic_id: &str) -> Result<u64> {
        let _guard = self.inner.lock_writes().await;
        let mut set = (*self.inner.snapshot().await).clone();
        let pyramid = set
            .get_mut(pyramid_id)
            .ok_or_else(|| CoverageError::PyramidNotFound(pyramid_id.to_string()))?;
        if pyramid.remove_mosaic(mosaic_id).is_none() {
            return Err(CoverageError::mosaic_not_found(pyramid_id, mosaic_id));
        }

        let removed = self.inner.store.delete(pyramid_id, Some(mosaic_id)).await?;
        self.persist(pyramid).await?;
        self.inner.publish(set).await;

        info!(pyramid = pyramid_id, mosaic = mosaic_id, tiles = removed, "Deleted mosaic");
        Ok(removed)
    }

    /// Build a whole pyramid from a full-resolution raster.
    ///
    /// Creates a pyramid at `slice`, then one mosaic per level: level 0 at
    /// `resolution`, each further level downsampled by two until the
    /// smaller side would drop below `generation.min_dimension`. Tiles are
    /// `generation.tile_size` square; edge tiles are padded with NaN.
    #[instrument(skip(self, raster), fields(width = raster.width(), height = raster.height()))]
    pub async fn ingest_raster(
        &self,
        raster: &RasterBuffer,
        upper_left: (f64, f64),
        resolution: (f64, f64),
        slice: &[f64],
    ) -> Result<IngestReport> {
        if raster.is_empty() {
            return Err(CoverageError::invalid_geometry("cannot ingest an empty raster"));
        }
        let generation = &self.inner.config.generation;
        // Check geometry before anything is created.
        MosaicGeometry::new(
            vec![upper_left.0, upper_left.1],
            (1, 1),
            (generation.tile_size, generation.tile_size),
            resolution,
        )
        .validate()?;

        let codec = self.inner.codecs.get(&self.inner.config.tile_format)?;
        let levels = generate_pyramid(raster, generation.min_dimension, generation.method);

        let crs = self.inner.reference_system.clone();
        let pyramid_id = self.create_pyramid(&crs, slice).await?;

        // A failed ingest must not leave a half-built pyramid behind.
        let written = self
            .write_levels(&pyramid_id, &levels, codec.as_ref(), upper_left, resolution)
            .await;
        let (mosaic_ids, tiles_written) = match written {
            Ok(done) => done,
            Err(err) => {
                warn!(pyramid = %pyramid_id, error = %err, "Ingest failed, removing pyramid");
                if let Err(cleanup) = self.delete_pyramid(&pyramid_id).await {
                    warn!(pyramid = %pyramid_id, error = %cleanup, "Failed to remove partially ingested pyramid");
                }
                return Err(err);
            }
        };

        info!(
            pyramid = %pyramid_id,
            levels = mosaic_ids.len(),
            tiles = tiles_written,
            "Ingested raster"
        );
        Ok(IngestReport {
            pyramid_id,
            mosaic_ids,
            tiles_written,
        })
    }

    /// One mosaic per level, every tile written. Returns the mosaic ids
    /// and the tile count.
    async fn write_levels(
        &self,
        pyramid_id: &str,
        levels: &[PyramidLevelData],
        codec: &dyn RasterCodec,
        upper_left: (f64, f64),
        resolution: (f64, f64),
    ) -> Result<(Vec<String>, usize)> {
        let generation = &self.inner.config.generation;
        let tile_size = generation.tile_size as usize;
        let mut mosaic_ids = Vec::with_capacity(levels.len());
        let mut tiles_written = 0;

        for level in levels {
            let level_raster = &level.raster;
            let columns = level_raster.width().div_ceil(tile_size) as u32;
            let rows = level_raster.height().div_ceil(tile_size) as u32;
            let scale = level.scale as f64;

            let mosaic = self
                .add_mosaic(
                    pyramid_id,
                    &format!("level-{}", level.level),
                    (columns, rows),
                    (generation.tile_size, generation.tile_size),
                    &[upper_left.0, upper_left.1],
                    (resolution.0 * scale, resolution.1 * scale),
                )
                .await?;

            let grid: Vec<(u32, u32)> = (0..rows)
                .flat_map(|row| (0..columns).map(move |col| (col, row)))
                .collect();
            let count = grid.len();
            let target = &mosaic;

            stream::iter(grid)
                .map(Ok::<_, CoverageError>)
                .try_for_each_concurrent(self.inner.config.max_concurrent_tile_reads, |(col, row)| {
                    let tile = level_raster.window(
                        col as usize * tile_size,
                        row as usize * tile_size,
                        tile_size,
                        tile_size,
                        f32::NAN,
                    );
                    async move { self.put_raster(target, codec, col, row, &tile).await }
                })
                .await?;

            debug!(mosaic = %mosaic.id, tiles = count, scale = level.scale, "Wrote pyramid level");
            tiles_written += count;
            mosaic_ids.push(mosaic.id);
        }

        Ok((mosaic_ids, tiles_written))
    }

    async fn put_raster(
        &self,
        mosaic: &Mosaic,
        codec: &dyn RasterCodec,
        col: u32,
        row: u32,
        raster: &RasterBuffer,
    ) -> Result<()> {
        let (tile_w, tile_h) = mosaic.tile_size();
        if raster.width() != tile_w as usize || raster.height() != tile_h as usize {
            return Err(CoverageError::invalid_geometry(format!(
                "raster is {}x{} but tiles of mosaic {} are {}x{}",
                raster.width(),
                raster.height(),
                mosaic.id,
                tile_w,
                tile_h
            )));
        }
        mosaic.check_tile(col, row)?;
        let data = codec.encode(raster)?;
        mosaic
            .write_tile(self.inner.store.as_ref(), col, row, data)
            .await
    }

    /// Pyramid and mosaic from the current snapshot.
    async fn lookup(&self, pyramid_id: &str, mosaic_id: &str) -> Result<(Pyramid, Mosaic)> {
        let snapshot = self.inner.snapshot().await;
        let pyramid = snapshot
            .get(pyramid_id)
            .ok_or_else(|| CoverageError::PyramidNotFound(pyramid_id.to_string()))?;
        let mosaic = pyramid
            .mosaic(mosaic_id)
            .cloned()
            .ok_or_else(|| CoverageError::mosaic_not_found(pyramid_id, mosaic_id))?;
        Ok((pyramid.clone(), mosaic))
    }

    async fn persist(&self, pyramid: &Pyramid) -> Result<()> {
        let bytes = PyramidDescriptor::from_pyramid(pyramid).to_bytes()?;
        self.inner.store.put_descriptor(&pyramid.id, bytes).await?;
        Ok(())
    }
}
