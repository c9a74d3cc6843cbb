//! One resolution level of a pyramid: a regular grid of tiles.

use bytes::Bytes;
use coverage_common::{BoundingBox, Envelope};
use serde::{Deserialize, Serialize};
use tile_storage::{TileKey, TileStore};
use tracing::debug;

use crate::error::{CoverageError, Result};

/// Values within this distance of an integer tile index snap to it, so a
/// request edge that lands on a tile boundary does not pull in a
/// neighbouring tile through rounding noise.
const INDEX_EPSILON: f64 = 1e-9;

/// Placement and tiling of a mosaic.
///
/// `corner` is the upper-left corner on the spatial axes followed by the
/// pyramid's slice value on every extra axis. Y decreases downward: row 0
/// is the top row of tiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MosaicGeometry {
    pub corner: Vec<f64>,
    /// `(width, height)` of one tile in pixels.
    pub tile_size: (u32, u32),
    /// `(columns, rows)` of tiles.
    pub grid_size: (u32, u32),
    /// Ground distance per pixel on x and y.
    pub resolution: (f64, f64),
}

impl MosaicGeometry {
    pub fn new(
        corner: Vec<f64>,
        grid_size: (u32, u32),
        tile_size: (u32, u32),
        resolution: (f64, f64),
    ) -> Self {
        Self {
            corner,
            tile_size,
            grid_size,
            resolution,
        }
    }

    /// Check sizes are positive and the corner and resolution are finite.
    pub fn validate(&self) -> Result<()> {
        if self.corner.len() < 2 {
            return Err(CoverageError::invalid_geometry(format!(
                "corner needs at least 2 coordinates, got {}",
                self.corner.len()
            )));
        }
        if let Some(bad) = self.corner.iter().find(|v| !v.is_finite()) {
            return Err(CoverageError::invalid_geometry(format!(
                "corner coordinate {} is not finite",
                bad
            )));
        }
        if self.tile_size.0 == 0 || self.tile_size.1 == 0 {
            return Err(CoverageError::invalid_geometry(format!(
                "tile size {}x{} must be positive",
                self.tile_size.0, self.tile_size.1
            )));
        }
        if self.grid_size.0 == 0 || self.grid_size.1 == 0 {
            return Err(CoverageError::invalid_geometry(format!(
                "grid size {}x{} must be positive",
                self.grid_size.0, self.grid_size.1
            )));
        }
        let (rx, ry) = self.resolution;
        if !(rx.is_finite() && ry.is_finite() && rx > 0.0 && ry > 0.0) {
            return Err(CoverageError::invalid_geometry(format!(
                "resolution ({}, {}) must be positive and finite",
                rx, ry
            )));
        }
        Ok(())
    }

    /// Upper-left x and y.
    pub fn origin(&self) -> (f64, f64) {
        (self.corner[0], self.corner[1])
    }

    /// Coordinates on the extra axes.
    pub fn slice(&self) -> &[f64] {
        &self.corner[2..]
    }

    /// Ground size of one tile on x and y.
    pub fn tile_span(&self) -> (f64, f64) {
        (
            self.tile_size.0 as f64 * self.resolution.0,
            self.tile_size.1 as f64 * self.resolution.1,
        )
    }

    /// Total size in pixels.
    pub fn pixel_size(&self) -> (u64, u64) {
        (
            self.grid_size.0 as u64 * self.tile_size.0 as u64,
            self.grid_size.1 as u64 * self.tile_size.1 as u64,
        )
    }

    /// Area covered on the spatial axes.
    pub fn horizontal_extent(&self) -> BoundingBox {
        let (x0, y0) = self.origin();
        let (span_x, span_y) = self.tile_span();
        BoundingBox::new(
            x0,
            y0 - self.grid_size.1 as f64 * span_y,
            x0 + self.grid_size.0 as f64 * span_x,
            y0,
        )
    }

    /// Extent on every axis; extra axes collapse to the slice value.
    pub fn extent(&self) -> Envelope {
        let ranges: Vec<(f64, f64)> = self.slice().iter().map(|&v| (v, v)).collect();
        Envelope::from_bbox_and_ranges(&self.horizontal_extent(), &ranges)
    }

    /// Tiles intersecting `bbox`, clamped to the grid.
    ///
    /// Returns an empty range when `bbox` is disjoint from the mosaic,
    /// only touches its edge, or has non-finite bounds.
    pub fn tile_range(&self, bbox: &BoundingBox) -> TileRange {
        if !bbox.is_finite() {
            return TileRange::EMPTY;
        }

        let (x0, y0) = self.origin();
        let (span_x, span_y) = self.tile_span();
        let (columns, rows) = self.grid_size;

        let col_min = snap((bbox.min_x - x0) / span_x).floor();
        let col_max = snap((bbox.max_x - x0) / span_x).ceil();
        let row_min = snap((y0 - bbox.max_y) / span_y).floor();
        let row_max = snap((y0 - bbox.min_y) / span_y).ceil();

        let clamp_col = |v: f64| v.clamp(0.0, columns as f64) as u32;
        let clamp_row = |v: f64| v.clamp(0.0, rows as f64) as u32;

        let range = TileRange {
            col_min: clamp_col(col_min),
            col_max: clamp_col(col_max),
            row_min: clamp_row(row_min),
            row_max: clamp_row(row_max),
        };
        if range.is_empty() {
            TileRange::EMPTY
        } else {
            range
        }
    }

    /// Area covered by a single tile.
    pub fn tile_bbox(&self, col: u32, row: u32) -> BoundingBox {
        self.range_bbox(&TileRange {
            col_min: col,
            col_max: col + 1,
            row_min: row,
            row_max: row + 1,
        })
    }

    /// Area covered by a block of tiles.
    pub fn range_bbox(&self, range: &TileRange) -> BoundingBox {
        let (x0, y0) = self.origin();
        let (span_x, span_y) = self.tile_span();
        BoundingBox::new(
            x0 + range.col_min as f64 * span_x,
            y0 - range.row_max as f64 * span_y,
            x0 + range.col_max as f64 * span_x,
            y0 - range.row_min as f64 * span_y,
        )
    }

    pub fn contains_tile(&self, col: u32, row: u32) -> bool {
        col < self.grid_size.0 && row < self.grid_size.1
    }
}

/// Round to the nearest integer when within [`INDEX_EPSILON`] of it.
fn snap(value: f64) -> f64 {
    let rounded = value.round();
    if (value - rounded).abs() < INDEX_EPSILON {
        rounded
    } else {
        value
    }
}

/// Block of tile indices; maxima are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRange {
    pub col_min: u32,
    pub col_max: u32,
    pub row_min: u32,
    pub row_max: u32,
}

impl TileRange {
    pub const EMPTY: TileRange = TileRange {
        col_min: 0,
        col_max: 0,
        row_min: 0,
        row_max: 0,
    };

    pub fn is_empty(&self) -> bool {
        self.col_min >= self.col_max || self.row_min >= self.row_max
    }

    pub fn columns(&self) -> u32 {
        self.col_max.saturating_sub(self.col_min)
    }

    pub fn rows(&self) -> u32 {
        self.row_max.saturating_sub(self.row_min)
    }

    /// Number of tiles in the range.
    pub fn len(&self) -> usize {
        self.columns() as usize * self.rows() as usize
    }

    /// `(col, row)` pairs, row by row.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> {
        let (col_min, col_max) = (self.col_min, self.col_max);
        (self.row_min..self.row_max).flat_map(move |row| (col_min..col_max).map(move |col| (col, row)))
    }
}

/// A resolution level inside a pyramid.
#[derive(Debug, Clone, PartialEq)]
pub struct Mosaic {
    pub id: String,
    pub pyramid_id: String,
    pub geometry: MosaicGeometry,
}

impl Mosaic {
    pub fn new(id: impl Into<String>, pyramid_id: impl Into<String>, geometry: MosaicGeometry) -> Self {
        Self {
            id: id.into(),
            pyramid_id: pyramid_id.into(),
            geometry,
        }
    }

    pub fn resolution(&self) -> (f64, f64) {
        self.geometry.resolution
    }

    pub fn tile_size(&self) -> (u32, u32) {
        self.geometry.tile_size
    }

    pub fn grid_size(&self) -> (u32, u32) {
        self.geometry.grid_size
    }

    pub fn extent(&self) -> Envelope {
        self.geometry.extent()
    }

    pub fn tile_range(&self, bbox: &BoundingBox) -> TileRange {
        self.geometry.tile_range(bbox)
    }

    pub fn tile_key(&self, col: u32, row: u32) -> TileKey {
        TileKey::new(self.pyramid_id.as_str(), self.id.as_str(), col, row)
    }

    /// Fail with `OutOfRange` unless `(col, row)` is inside the grid.
    pub fn check_tile(&self, col: u32, row: u32) -> Result<()> {
        if self.geometry.contains_tile(col, row) {
            Ok(())
        } else {
            Err(CoverageError::OutOfRange {
                mosaic: self.id.clone(),
                col,
                row,
                columns: self.geometry.grid_size.0,
                rows: self.geometry.grid_size.1,
            })
        }
    }

    /// Read one tile. `Ok(None)` means the tile is absent.
    pub async fn read_tile<S>(&self, store: &S, col: u32, row: u32) -> Result<Option<Bytes>>
    where
        S: TileStore + ?Sized,
    {
        self.check_tile(col, row)?;
        let data = store.get(&self.tile_key(col, row)).await?;
        debug!(
            pyramid = %self.pyramid_id,
            mosaic = %self.id,
            col,
            row,
            present = data.is_some(),
            "Read tile"
        );
        Ok(data)
    }

    /// Write one tile, replacing whatever was there.
    pub async fn write_tile<S>(&self, store: &S, col: u32, row: u32, data: Bytes) -> Result<()>
    where
        S: TileStore + ?Sized,
    {
        self.check_tile(col, row)?;
        store.put(&self.tile_key(col, row), data).await?;
        Ok(())
    }
}
