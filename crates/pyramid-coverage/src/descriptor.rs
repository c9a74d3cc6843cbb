//! Persisted pyramid metadata.
//!
//! One JSON document per pyramid, stored through a `DescriptorStore`. A
//! descriptor carries everything needed to rebuild the pyramid model
//! without reading any tile.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use coverage_common::ReferenceSystem;
use serde::{Deserialize, Serialize};

use crate::error::{CoverageError, Result};
use crate::model::{Mosaic, MosaicGeometry, Pyramid};

/// Current descriptor layout version.
pub const DESCRIPTOR_VERSION: u32 = 1;

/// Serialized form of a [`Pyramid`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PyramidDescriptor {
    pub version: u32,
    pub id: String,
    pub reference_system: ReferenceSystem,
    pub slice: Vec<f64>,
    pub tile_format: String,
    pub created_at: DateTime<Utc>,
    pub mosaics: Vec<MosaicDescriptor>,
}

/// Serialized form of a [`Mosaic`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MosaicDescriptor {
    pub id: String,
    pub corner: Vec<f64>,
    pub tile_size: [u32; 2],
    pub grid_size: [u32; 2],
    pub resolution: [f64; 2],
}

impl From<&Mosaic> for MosaicDescriptor {
    fn from(mosaic: &Mosaic) -> Self {
        let g = &mosaic.geometry;
        Self {
            id: mosaic.id.clone(),
            corner: g.corner.clone(),
            tile_size: [g.tile_size.0, g.tile_size.1],
            grid_size: [g.grid_size.0, g.grid_size.1],
            resolution: [g.resolution.0, g.resolution.1],
        }
    }
}

impl MosaicDescriptor {
    pub fn geometry(&self) -> MosaicGeometry {
        MosaicGeometry::new(
            self.corner.clone(),
            (self.grid_size[0], self.grid_size[1]),
            (self.tile_size[0], self.tile_size[1]),
            (self.resolution[0], self.resolution[1]),
        )
    }
}

impl PyramidDescriptor {
    pub fn from_pyramid(pyramid: &Pyramid) -> Self {
        Self {
            version: DESCRIPTOR_VERSION,
            id: pyramid.id.clone(),
            reference_system: pyramid.reference_system.clone(),
            slice: pyramid.slice.clone(),
            tile_format: pyramid.tile_format.clone(),
            created_at: pyramid.created_at,
            mosaics: pyramid.mosaics().iter().map(MosaicDescriptor::from).collect(),
        }
    }

    /// Rebuild the pyramid, re-running every validation.
    pub fn into_pyramid(self) -> Result<Pyramid> {
        if self.version != DESCRIPTOR_VERSION {
            return Err(CoverageError::invalid_metadata(format!(
                "pyramid {}: unsupported descriptor version {}",
                self.id, self.version
            )));
        }

        let id = self.id.clone();
        let invalid = |e: CoverageError| CoverageError::invalid_metadata(format!("pyramid {}: {}", id, e));

        let mut pyramid = Pyramid::new(self.id.as_str(), self.reference_system, self.slice, self.tile_format)
            .map_err(&invalid)?;
        pyramid.created_at = self.created_at;

        for mosaic in self.mosaics {
            let geometry = mosaic.geometry();
            pyramid.add_mosaic(mosaic.id, geometry).map_err(&invalid)?;
        }
        Ok(pyramid)
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec_pretty(self)?))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}
