//! Reference datasets shared by the coverage tests.
//!
//! The scenario is a single pyramid with two mosaics sharing the
//! upper-left corner (-180, 90): a coarse one at one unit per pixel and
//! a fine one at half a unit per pixel.

/// Geometry of a mosaic in fixture form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MosaicLayout {
    pub upper_left: (f64, f64),
    pub grid_cols: u32,
    pub grid_rows: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub resolution: (f64, f64),
}

impl MosaicLayout {
    /// Total mosaic width in pixels.
    pub fn pixel_width(&self) -> usize {
        (self.grid_cols * self.tile_width) as usize
    }

    /// Total mosaic height in pixels.
    pub fn pixel_height(&self) -> usize {
        (self.grid_rows * self.tile_height) as usize
    }

    /// `(min_x, min_y, max_x, max_y)` covered by the mosaic.
    pub fn extent(&self) -> (f64, f64, f64, f64) {
        let (x0, y0) = self.upper_left;
        (
            x0,
            y0 - self.pixel_height() as f64 * self.resolution.1,
            x0 + self.pixel_width() as f64 * self.resolution.0,
            y0,
        )
    }
}

/// Mosaics of the reference pyramid.
pub mod mosaics {
    use super::MosaicLayout;

    /// 2x2 tiles of 10x10 pixels at resolution 1.
    pub const COARSE: MosaicLayout = MosaicLayout {
        upper_left: (-180.0, 90.0),
        grid_cols: 2,
        grid_rows: 2,
        tile_width: 10,
        tile_height: 10,
        resolution: (1.0, 1.0),
    };

    /// 4x3 tiles of 10x10 pixels at resolution 0.5.
    pub const FINE: MosaicLayout = MosaicLayout {
        upper_left: (-180.0, 90.0),
        grid_cols: 4,
        grid_rows: 3,
        tile_width: 10,
        tile_height: 10,
        resolution: (0.5, 0.5),
    };
}

/// Horizontal envelope of the reference pyramid: the coarse mosaic
/// contains the fine one.
pub const EXPECTED_ENVELOPE: (f64, f64, f64, f64) = (-180.0, 70.0, -160.0, 90.0);

/// Slice values of the multi-slice scenario, on the first extra axis.
pub mod slices {
    pub const LOWER: f64 = -15.0;
    pub const UPPER: f64 = 46.58;
    pub const ALL: [f64; 2] = [LOWER, UPPER];
}

/// CRS identifiers used in tests.
pub mod crs {
    pub const WGS84: &str = "EPSG:4326";
    pub const WGS84_URN_ALIAS: &str = "CRS:84";
    pub const WEB_MERCATOR: &str = "EPSG:3857";
    pub const NAD83: &str = "EPSG:4269";
    pub const UNKNOWN: &str = "EPSG:32633";
}

/// Request extents around the reference dataset.
pub mod bbox {
    /// Entirely inside the fine mosaic.
    pub const INSIDE: (f64, f64, f64, f64) = (-178.0, 80.0, -172.0, 88.0);

    /// Wider than the dataset on every side.
    pub const COVERING: (f64, f64, f64, f64) = (-200.0, 50.0, -140.0, 100.0);

    /// Entirely outside the dataset.
    pub const DISJOINT: (f64, f64, f64, f64) = (0.0, 0.0, 10.0, 10.0);

    /// Invalid bbox (min > max)
    pub const INVERTED: (f64, f64, f64, f64) = (-160.0, 90.0, -180.0, 70.0);
}
