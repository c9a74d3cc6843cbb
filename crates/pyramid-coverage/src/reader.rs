//! Coverage reads.
//!
//! A read resolves the pyramids matching the request, picks one mosaic per
//! pyramid, fetches the tiles covering the request and assembles them into
//! one raster per pyramid. The results form a [`CoverageStack`] ordered by
//! slice.

use std::sync::Arc;

use bytes::Bytes;
use coverage_common::{BoundingBox, CrsCode, Envelope, ReferenceSystem};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, instrument, warn};

use crate::codec::RasterCodec;
use crate::error::{CoverageError, Result};
use crate::model::{Mosaic, Pyramid, PyramidSet, TileRange};
use crate::raster::RasterBuffer;
use crate::resource::ResourceInner;

/// Parameters of a coverage read.
#[derive(Debug, Clone)]
pub struct ReadRequest {
    /// Area of interest in `crs`. With extra axes, their ranges select
    /// slices; a 2-D envelope selects every slice.
    pub envelope: Envelope,
    pub crs: ReferenceSystem,
    /// Desired ground resolution in the dataset CRS; finest when `None`.
    pub resolution: Option<(f64, f64)>,
    /// Bands to return, in order; all when `None`.
    pub bands: Option<Vec<usize>>,
    /// Value for pixels of absent tiles.
    pub background: f32,
}

impl ReadRequest {
    pub fn new(envelope: Envelope, crs: ReferenceSystem) -> Self {
        Self {
            envelope,
            crs,
            resolution: None,
            bands: None,
            background: f32::NAN,
        }
    }

    /// A purely horizontal request: every slice matches.
    pub fn horizontal(bbox: BoundingBox, crs: CrsCode) -> Self {
        Self::new(Envelope::from_bbox(&bbox), ReferenceSystem::horizontal(crs))
    }

    pub fn with_resolution(mut self, res_x: f64, res_y: f64) -> Self {
        self.resolution = Some((res_x, res_y));
        self
    }

    pub fn with_bands(mut self, bands: Vec<usize>) -> Self {
        self.bands = Some(bands);
        self
    }

    pub fn with_background(mut self, background: f32) -> Self {
        self.background = background;
        self
    }
}

/// One assembled raster read from one mosaic.
#[derive(Debug, Clone)]
pub struct GridCoverage {
    pub pyramid_id: String,
    pub mosaic_id: String,
    pub raster: RasterBuffer,
    /// Tile-aligned area actually covered, in the dataset CRS, with the
    /// slice value on extra axes.
    pub envelope: Envelope,
    pub resolution: (f64, f64),
    pub tile_range: TileRange,
    /// Tiles of the range that were absent and filled with background.
    pub missing_tiles: usize,
}

impl GridCoverage {
    pub fn width(&self) -> usize {
        self.raster.width()
    }

    pub fn height(&self) -> usize {
        self.raster.height()
    }

    /// Values on the extra axes.
    pub fn slice(&self) -> &[f64] {
        &self.envelope.lower()[2..]
    }
}

/// Result of reading one pyramid.
#[derive(Debug)]
pub struct SliceCoverage {
    pub slice: Vec<f64>,
    pub pyramid_id: String,
    pub result: Result<GridCoverage>,
}

/// Per-slice coverages, ordered by slice value ascending.
///
/// A slice that failed to read keeps its error here without affecting the
/// others.
#[derive(Debug, Default)]
pub struct CoverageStack {
    entries: Vec<SliceCoverage>,
}

impl CoverageStack {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SliceCoverage] {
        &self.entries
    }

    /// Successfully read coverages, in stack order.
    pub fn coverages(&self) -> impl Iterator<Item = &GridCoverage> {
        self.entries.iter().filter_map(|e| e.result.as_ref().ok())
    }

    /// Slices that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&SliceCoverage, &CoverageError)> {
        self.entries
            .iter()
            .filter_map(|e| e.result.as_ref().err().map(|err| (e, err)))
    }

    /// Coverages at the slice equal or nearest to `value` on the first
    /// extra axis. Several coverages come back when pyramids share that
    /// slice. Without extra axes every coverage is returned.
    pub fn coverages_at(&self, value: f64) -> Vec<&GridCoverage> {
        self.nearest_by(|slice| slice.first().map_or(0.0, |v| (v - value).abs()))
    }

    /// Like [`coverages_at`](Self::coverages_at) over every extra axis,
    /// using Euclidean distance.
    pub fn coverages_at_slice(&self, position: &[f64]) -> Vec<&GridCoverage> {
        self.nearest_by(|slice| {
            slice
                .iter()
                .zip(position.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt()
        })
    }

    fn nearest_by(&self, distance: impl Fn(&[f64]) -> f64) -> Vec<&GridCoverage> {
        let scored: Vec<(f64, &GridCoverage)> = self
            .entries
            .iter()
            .filter_map(|e| e.result.as_ref().ok().map(|c| (distance(&e.slice), c)))
            .collect();

        let Some(best) = scored.iter().map(|(d, _)| *d).min_by(f64::total_cmp) else {
            return Vec::new();
        };
        scored
            .into_iter()
            .filter(|(d, _)| *d <= best)
            .map(|(_, c)| c)
            .collect()
    }

    pub fn into_entries(self) -> Vec<SliceCoverage> {
        self.entries
    }
}

/// Read handle on a [`PyramidResource`](crate::PyramidResource).
#[derive(Clone)]
pub struct CoverageReader {
    inner: Arc<ResourceInner>,
}

/// A request resolved against one metadata snapshot.
struct ResolvedRequest {
    /// Clipped request footprint in the dataset CRS.
    bbox: BoundingBox,
    /// Slice constraint, one range per extra axis.
    slice_ranges: Option<Vec<(f64, f64)>>,
}

impl CoverageReader {
    pub(crate) fn new(inner: Arc<ResourceInner>) -> Self {
        Self { inner }
    }

    /// Envelope of the whole dataset, `None` while it has no mosaics.
    pub async fn envelope(&self) -> Option<Envelope> {
        self.inner.snapshot().await.envelope()
    }

    /// Read the request into a stack of per-slice coverages.
    ///
    /// Fails with `InvalidEnvelope` for inverted or unusable bounds,
    /// `IncompatibleReferenceSystem` when the request CRS cannot be
    /// mapped to the dataset, and `DisjointDomain` when nothing in the
    /// dataset overlaps the request. Failures of individual slices are
    /// recorded in the stack.
    #[instrument(skip_all, fields(crs = %request.crs, resolution = ?request.resolution))]
    pub async fn read(&self, request: &ReadRequest) -> Result<CoverageStack> {
        let snapshot = self.inner.snapshot().await;
        let resolved = self.resolve(&snapshot, request)?;

        let match_crs = ReferenceSystem {
            horizontal: request.crs.horizontal.clone(),
            extra_axes: snapshot.reference_system().extra_axes.clone(),
        };
        let pyramids = snapshot.pyramids_matching(
            &match_crs,
            self.inner.transform.as_ref(),
            resolved.slice_ranges.as_deref(),
            self.inner.config.slice_tolerance,
        );
        debug!(pyramids = pyramids.len(), bbox = ?resolved.bbox, "Resolved read request");

        let mut stack = CoverageStack::default();
        for pyramid in pyramids {
            let Some(mosaic) = pyramid.select_mosaic(request.resolution) else {
                continue;
            };
            let range = mosaic.tile_range(&resolved.bbox);
            if range.is_empty() {
                continue;
            }
            debug!(
                pyramid = %pyramid.id,
                mosaic = %mosaic.id,
                tiles = range.len(),
                "Selected mosaic"
            );

            let result = self.assemble(pyramid, mosaic, range, request).await;
            if let Err(e) = &result {
                warn!(pyramid = %pyramid.id, slice = ?pyramid.slice, error = %e, "Slice read failed");
            }
            stack.entries.push(SliceCoverage {
                slice: pyramid.slice.clone(),
                pyramid_id: pyramid.id.clone(),
                result,
            });
        }

        if stack.is_empty() {
            return Err(CoverageError::disjoint(format!(
                "no tiles cover {:?}",
                resolved.bbox
            )));
        }
        Ok(stack)
    }

    /// Band values at `(x, y)` in the dataset CRS, read from the finest
    /// mosaic of the first pyramid covering the point.
    ///
    /// `slice` narrows the pyramids to those at that position. Returns
    /// `None` where no mosaic covers the point, the tile is absent, or
    /// every band is NaN.
    pub async fn read_point(&self, x: f64, y: f64, slice: Option<&[f64]>) -> Result<Option<Vec<f32>>> {
        if !x.is_finite() || !y.is_finite() {
            return Err(CoverageError::invalid_envelope(format!(
                "point ({}, {}) is not finite",
                x, y
            )));
        }

        let snapshot = self.inner.snapshot().await;
        let ranges: Option<Vec<(f64, f64)>> = slice.map(|s| s.iter().map(|&v| (v, v)).collect());
        let pyramids = snapshot.pyramids_matching(
            snapshot.reference_system(),
            self.inner.transform.as_ref(),
            ranges.as_deref(),
            self.inner.config.slice_tolerance,
        );

        for pyramid in pyramids {
            let Some(mosaic) = pyramid.finest_mosaic() else {
                continue;
            };
            let extent = mosaic.geometry.horizontal_extent();
            if !extent.contains_point(x, y) {
                continue;
            }

            let (x0, y0) = mosaic.geometry.origin();
            let (res_x, res_y) = mosaic.resolution();
            let (px_w, px_h) = mosaic.geometry.pixel_size();
            let px = (((x - x0) / res_x).floor() as u64).min(px_w - 1);
            let py = (((y0 - y) / res_y).floor() as u64).min(px_h - 1);

            let (tile_w, tile_h) = mosaic.tile_size();
            let col = (px / tile_w as u64) as u32;
            let row = (py / tile_h as u64) as u32;

            let Some(bytes) = mosaic.read_tile(self.inner.store.as_ref(), col, row).await? else {
                return Ok(None);
            };
            let tile = self.codec_for(pyramid)?.decode(&bytes)?;
            let values = tile
                .pixel((px % tile_w as u64) as usize, (py % tile_h as u64) as usize)
                .map(|p| p.to_vec());

            return Ok(values.filter(|v| v.iter().any(|s| !s.is_nan())));
        }

        Ok(None)
    }

    /// Validate, clip and reproject the request against the snapshot.
    fn resolve(&self, snapshot: &PyramidSet, request: &ReadRequest) -> Result<ResolvedRequest> {
        let dataset = snapshot.reference_system();
        let envelope = &request.envelope;

        if envelope.dimension() != request.crs.dimension() {
            return Err(CoverageError::invalid_envelope(format!(
                "envelope has {} dimensions but {} has {}",
                envelope.dimension(),
                request.crs,
                request.crs.dimension()
            )));
        }
        if !request.crs.extra_axes.is_empty() && !request.crs.same_extra_axes(dataset) {
            return Err(CoverageError::incompatible_crs(format!(
                "request axes {} do not match dataset axes {}",
                request.crs, dataset
            )));
        }

        let source = &request.crs.horizontal;
        let target = &dataset.horizontal;
        let same_crs = source == target;
        let transform = self.inner.transform.as_ref();
        if !same_crs && !transform.can_transform(source, target) {
            return Err(CoverageError::incompatible_crs(format!(
                "cannot reproject {} to {}",
                source, target
            )));
        }

        if envelope.is_inverted() {
            return Err(CoverageError::invalid_envelope(format!(
                "inverted bounds {:?} .. {:?}",
                envelope.lower(),
                envelope.upper()
            )));
        }

        let Some(domain) = snapshot.envelope() else {
            return Err(CoverageError::disjoint("coverage has no mosaics"));
        };

        // Clip in the request CRS, so NaN and infinite bounds are replaced
        // before any reprojection.
        let domain_horizontal = if same_crs {
            domain.horizontal()
        } else {
            transform.reproject(&domain.horizontal(), target, source)?
        };
        // Slices within tolerance of a domain edge must survive the clip.
        let domain_in_request = if request.crs.extra_axes.is_empty() {
            Envelope::from_bbox(&domain_horizontal)
        } else {
            domain
                .with_horizontal(&domain_horizontal)
                .widen_extra_axes(self.inner.config.slice_tolerance)
        };

        let clipped = envelope.clip_to(&domain_in_request)?;
        if !clipped.is_finite() {
            return Err(CoverageError::invalid_envelope(format!(
                "bounds {:?} .. {:?} are not finite after clipping",
                clipped.lower(),
                clipped.upper()
            )));
        }
        if clipped.is_inverted() {
            return Err(CoverageError::disjoint(format!(
                "{:?} .. {:?} lies outside the dataset",
                envelope.lower(),
                envelope.upper()
            )));
        }

        let bbox = if same_crs {
            clipped.horizontal()
        } else {
            transform.reproject(&clipped.horizontal(), source, target)?
        };
        let slice_ranges = (!request.crs.extra_axes.is_empty())
            .then(|| (0..clipped.extra_dimension()).filter_map(|i| clipped.extra_range(i)).collect());

        Ok(ResolvedRequest { bbox, slice_ranges })
    }

    fn codec_for(&self, pyramid: &Pyramid) -> Result<Arc<dyn RasterCodec>> {
        self.inner.codecs.get(&pyramid.tile_format)
    }

    /// Fetch and stitch every tile of `range`.
    async fn assemble(
        &self,
        pyramid: &Pyramid,
        mosaic: &Mosaic,
        range: TileRange,
        request: &ReadRequest,
    ) -> Result<GridCoverage> {
        let codec = self.codec_for(pyramid)?;
        let store = self.inner.store.as_ref();
        let (tile_w, tile_h) = mosaic.tile_size();

        let tiles: Vec<(u32, u32, Option<RasterBuffer>)> = stream::iter(range.iter())
            .map(|(col, row)| {
                let codec = codec.clone();
                async move {
                    let tile = match mosaic.read_tile(store, col, row).await? {
                        Some(bytes) => Some(decode_tile(codec.as_ref(), &bytes, (tile_w, tile_h))?),
                        None => None,
                    };
                    Ok::<_, CoverageError>((col, row, tile))
                }
            })
            .buffer_unordered(self.inner.config.max_concurrent_tile_reads)
            .try_collect()
            .await?;

        let bands = tiles
            .iter()
            .find_map(|(_, _, t)| t.as_ref().map(RasterBuffer::bands))
            .unwrap_or(1);
        let width = range.columns() as usize * tile_w as usize;
        let height = range.rows() as usize * tile_h as usize;
        let mut raster = RasterBuffer::filled(width, height, bands, request.background);

        let mut missing_tiles = 0;
        for (col, row, tile) in &tiles {
            match tile {
                Some(tile) => {
                    let x = (col - range.col_min) as usize * tile_w as usize;
                    let y = (row - range.row_min) as usize * tile_h as usize;
                    raster.blit(tile, x, y).map_err(|_| {
                        CoverageError::codec(format!(
                            "tile ({}, {}) of mosaic {} has {} band(s), expected {}",
                            col,
                            row,
                            mosaic.id,
                            tile.bands(),
                            bands
                        ))
                    })?;
                }
                None => missing_tiles += 1,
            }
        }
        if missing_tiles > 0 {
            debug!(mosaic = %mosaic.id, missing_tiles, "Filled absent tiles with background");
        }

        if let Some(selection) = &request.bands {
            raster = raster.select_bands(selection)?;
        }

        let slice_ranges: Vec<(f64, f64)> = pyramid.slice.iter().map(|&v| (v, v)).collect();
        let envelope = Envelope::from_bbox_and_ranges(&mosaic.geometry.range_bbox(&range), &slice_ranges);

        Ok(GridCoverage {
            pyramid_id: pyramid.id.clone(),
            mosaic_id: mosaic.id.clone(),
            raster,
            envelope,
            resolution: mosaic.resolution(),
            tile_range: range,
            missing_tiles,
        })
    }
}

/// Decode a tile and check it has the mosaic's tile size.
fn decode_tile(codec: &dyn RasterCodec, bytes: &Bytes, (width, height): (u32, u32)) -> Result<RasterBuffer> {
    let tile = codec.decode(bytes)?;
    if tile.width() != width as usize || tile.height() != height as usize {
        return Err(CoverageError::codec(format!(
            "decoded tile is {}x{}, mosaic tiles are {}x{}",
            tile.width(),
            tile.height(),
            width,
            height
        )));
    }
    Ok(tile)
}
