//! Reprojection collaborator.
//!
//! The storage engine never does projection math itself; it asks a
//! [`CrsTransform`] to move a request footprint into the dataset CRS.

use std::f64::consts::PI;

use crate::bbox::BoundingBox;
use crate::crs::CrsCode;
use crate::error::ProjectionError;

/// Semi-major axis of the WGS84 ellipsoid used by Web Mercator.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Latitude where Web Mercator's square world ends.
const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// Moves 2-D footprints between horizontal reference systems.
pub trait CrsTransform: Send + Sync {
    /// Whether `reproject` can succeed for this pair.
    fn can_transform(&self, source: &CrsCode, target: &CrsCode) -> bool;

    /// Reproject `bbox` from `source` into `target`, returning the
    /// bounding box of the transformed footprint.
    fn reproject(
        &self,
        bbox: &BoundingBox,
        source: &CrsCode,
        target: &CrsCode,
    ) -> Result<BoundingBox, ProjectionError>;
}

/// Only accepts identical reference systems.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl CrsTransform for IdentityTransform {
    fn can_transform(&self, source: &CrsCode, target: &CrsCode) -> bool {
        source == target
    }

    fn reproject(
        &self,
        bbox: &BoundingBox,
        source: &CrsCode,
        target: &CrsCode,
    ) -> Result<BoundingBox, ProjectionError> {
        if source == target {
            Ok(*bbox)
        } else {
            Err(unsupported(source, target))
        }
    }
}

/// Geographic (EPSG:4326 / EPSG:4269) <-> Web Mercator (EPSG:3857).
///
/// EPSG:4269 is treated as EPSG:4326; the datum shift is below a meter.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercatorTransform;

impl WebMercatorTransform {
    /// Geographic degrees to Web Mercator meters.
    pub fn forward(lon: f64, lat: f64) -> (f64, f64) {
        let lat = lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
        let x = EARTH_RADIUS_M * lon.to_radians();
        let y = EARTH_RADIUS_M * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
        (x, y)
    }

    /// Web Mercator meters to geographic degrees.
    pub fn inverse(x: f64, y: f64) -> (f64, f64) {
        let lon = (x / EARTH_RADIUS_M).to_degrees();
        let lat = (y / EARTH_RADIUS_M).sinh().atan().to_degrees();
        (lon, lat)
    }
}

impl CrsTransform for WebMercatorTransform {
    fn can_transform(&self, source: &CrsCode, target: &CrsCode) -> bool {
        source == target
            || (source.is_geographic() && target.is_geographic())
            || (source.is_geographic() && *target == CrsCode::Epsg3857)
            || (*source == CrsCode::Epsg3857 && target.is_geographic())
    }

    fn reproject(
        &self,
        bbox: &BoundingBox,
        source: &CrsCode,
        target: &CrsCode,
    ) -> Result<BoundingBox, ProjectionError> {
        if !self.can_transform(source, target) {
            return Err(unsupported(source, target));
        }
        if source == target || (source.is_geographic() && target.is_geographic()) {
            return Ok(*bbox);
        }

        // Both directions are monotonic per axis, so the corners bound the result.
        let convert: fn(f64, f64) -> (f64, f64) = if source.is_geographic() {
            Self::forward
        } else {
            Self::inverse
        };
        let (min_x, min_y) = convert(bbox.min_x, bbox.min_y);
        let (max_x, max_y) = convert(bbox.max_x, bbox.max_y);
        let result = BoundingBox::new(min_x, min_y, max_x, max_y);

        if !result.is_finite() {
            return Err(ProjectionError::NonFinite(format!("{:?}", bbox)));
        }
        Ok(result)
    }
}

fn unsupported(source: &CrsCode, target: &CrsCode) -> ProjectionError {
    ProjectionError::Unsupported {
        source_crs: source.to_string(),
        target_crs: target.to_string(),
    }
}
