//! A pyramid: every resolution level of one slice.

use chrono::{DateTime, Utc};
use coverage_common::{Envelope, ReferenceSystem};

use crate::error::{CoverageError, Result};
use crate::model::mosaic::{Mosaic, MosaicGeometry};
use crate::selection::{compare_resolution, finest_mosaic, same_resolution, select_mosaic};

/// Mosaics sharing one reference system and one slice position.
///
/// Mosaics are kept finest first. No two share a resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Pyramid {
    pub id: String,
    pub reference_system: ReferenceSystem,
    /// Value on every extra axis of the reference system.
    pub slice: Vec<f64>,
    /// Codec format of the tiles.
    pub tile_format: String,
    pub created_at: DateTime<Utc>,
    mosaics: Vec<Mosaic>,
}

impl Pyramid {
    /// An empty pyramid. Fails when `slice` does not have one value per
    /// extra axis or holds a non-finite value.
    pub fn new(
        id: impl Into<String>,
        reference_system: ReferenceSystem,
        slice: Vec<f64>,
        tile_format: impl Into<String>,
    ) -> Result<Self> {
        let extra = reference_system.extra_axes.len();
        if slice.len() != extra {
            return Err(CoverageError::invalid_geometry(format!(
                "reference system {} has {} extra axis(es) but the slice has {} value(s)",
                reference_system,
                extra,
                slice.len()
            )));
        }
        if slice.iter().any(|v| !v.is_finite()) {
            return Err(CoverageError::invalid_geometry(format!(
                "slice {:?} is not finite",
                slice
            )));
        }
        Ok(Self {
            id: id.into(),
            reference_system,
            slice,
            tile_format: tile_format.into(),
            created_at: Utc::now(),
            mosaics: Vec::new(),
        })
    }

    pub fn mosaics(&self) -> &[Mosaic] {
        &self.mosaics
    }

    pub fn mosaic(&self, id: &str) -> Option<&Mosaic> {
        self.mosaics.iter().find(|m| m.id == id)
    }

    pub fn mosaic_with_resolution(&self, resolution: (f64, f64)) -> Option<&Mosaic> {
        self.mosaics
            .iter()
            .find(|m| same_resolution(m.resolution(), resolution))
    }

    /// Full corner for this pyramid from a 2-D or full-dimension corner.
    ///
    /// A 2-D corner is extended with the slice; a full corner must already
    /// carry it.
    pub fn complete_corner(&self, corner: &[f64]) -> Result<Vec<f64>> {
        let dimension = self.reference_system.dimension();
        if corner.len() == 2 {
            let mut full = corner.to_vec();
            full.extend_from_slice(&self.slice);
            return Ok(full);
        }
        if corner.len() != dimension {
            return Err(CoverageError::invalid_geometry(format!(
                "corner has {} coordinates, expected 2 or {}",
                corner.len(),
                dimension
            )));
        }
        if corner[2..] != self.slice[..] {
            return Err(CoverageError::invalid_geometry(format!(
                "corner slice {:?} differs from pyramid {} slice {:?}",
                &corner[2..],
                self.id,
                self.slice
            )));
        }
        Ok(corner.to_vec())
    }

    /// Build a mosaic with `geometry` and add it.
    pub fn add_mosaic(&mut self, id: impl Into<String>, geometry: MosaicGeometry) -> Result<&Mosaic> {
        let id = id.into();
        geometry.validate()?;

        if geometry.corner.len() != self.reference_system.dimension()
            || geometry.slice() != &self.slice[..]
        {
            return Err(CoverageError::invalid_geometry(format!(
                "mosaic corner {:?} does not match pyramid {} slice {:?}",
                geometry.corner, self.id, self.slice
            )));
        }
        if self.mosaic(&id).is_some() {
            return Err(CoverageError::invalid_geometry(format!(
                "pyramid {} already has a mosaic {}",
                self.id, id
            )));
        }
        if self.mosaic_with_resolution(geometry.resolution).is_some() {
            return Err(CoverageError::DuplicateResolution {
                pyramid: self.id.clone(),
                res_x: geometry.resolution.0,
                res_y: geometry.resolution.1,
            });
        }

        let mosaic = Mosaic::new(id, self.id.as_str(), geometry);
        let position = self
            .mosaics
            .partition_point(|m| compare_resolution(m.resolution(), mosaic.resolution()).is_lt());
        self.mosaics.insert(position, mosaic);
        Ok(&self.mosaics[position])
    }

    pub fn remove_mosaic(&mut self, id: &str) -> Option<Mosaic> {
        let index = self.mosaics.iter().position(|m| m.id == id)?;
        Some(self.mosaics.remove(index))
    }

    pub fn finest_mosaic(&self) -> Option<&Mosaic> {
        finest_mosaic(&self.mosaics)
    }

    /// Mosaic serving a read at `requested` resolution (finest when `None`).
    pub fn select_mosaic(&self, requested: Option<(f64, f64)>) -> Option<&Mosaic> {
        select_mosaic(&self.mosaics, requested)
    }

    /// Union of every mosaic extent; `None` without mosaics.
    pub fn envelope(&self) -> Option<Envelope> {
        let mut extents = self.mosaics.iter().map(Mosaic::extent);
        let mut envelope = extents.next()?;
        for extent in extents {
            // All extents share the pyramid's dimension.
            if envelope.expand_to_include(&extent).is_err() {
                return None;
            }
        }
        Some(envelope)
    }
}
