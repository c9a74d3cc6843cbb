//! Raster generators with predictable sample patterns.
//!
//! Every generator returns row-major, pixel-interleaved `f32` samples so
//! tests can recompute the expected value of any pixel independently.

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// This makes it easy to verify that data is being read/written correctly
/// by checking that grid[row][col] == col * 1000 + row.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50); // 10 * 5
/// assert_eq!(grid[0], 0.0);   // col=0, row=0 -> 0*1000 + 0
/// assert_eq!(grid[1], 1000.0); // col=1, row=0 -> 1*1000 + 0
/// assert_eq!(grid[10], 1.0);  // col=0, row=1 -> 0*1000 + 1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Value of band `band` at global pixel `(col, row)` in [`create_multiband_grid`].
pub fn multiband_value(col: usize, row: usize, band: usize) -> f32 {
    (band * 100_000 + col * 1000 + row) as f32
}

/// Pixel-interleaved multi-band grid following [`multiband_value`].
pub fn create_multiband_grid(width: usize, height: usize, bands: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height * bands);
    for row in 0..height {
        for col in 0..width {
            for band in 0..bands {
                data.push(multiband_value(col, row, band));
            }
        }
    }
    data
}

/// Value stored at pixel `(x, y)` of tile `(tile_col, tile_row)` by
/// [`create_tile_pattern`].
///
/// Encodes the global pixel position so a mosaicked read can be checked
/// pixel by pixel: `global_col * 1000 + global_row + offset`.
pub fn tile_pattern_value(
    tile_col: u32,
    tile_row: u32,
    tile_width: usize,
    tile_height: usize,
    x: usize,
    y: usize,
    offset: f32,
) -> f32 {
    let global_col = tile_col as usize * tile_width + x;
    let global_row = tile_row as usize * tile_height + y;
    (global_col * 1000 + global_row) as f32 + offset
}

/// Single-band tile whose samples follow [`tile_pattern_value`].
pub fn create_tile_pattern(
    tile_col: u32,
    tile_row: u32,
    tile_width: usize,
    tile_height: usize,
    offset: f32,
) -> Vec<f32> {
    let mut data = Vec::with_capacity(tile_width * tile_height);
    for y in 0..tile_height {
        for x in 0..tile_width {
            data.push(tile_pattern_value(
                tile_col,
                tile_row,
                tile_width,
                tile_height,
                x,
                y,
                offset,
            ));
        }
    }
    data
}

/// Creates a grid with all values set to a constant.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Creates a grid with NaN values at specified positions.
///
/// Positions are `(col, row)`; other cells follow [`create_test_grid`].
pub fn create_grid_with_nans(
    width: usize,
    height: usize,
    nan_positions: &[(usize, usize)],
) -> Vec<f32> {
    let mut data = create_test_grid(width, height);
    for &(col, row) in nan_positions {
        if col < width && row < height {
            data[row * width + col] = f32::NAN;
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_grid() {
        let grid = create_test_grid(10, 5);
        assert_eq!(grid.len(), 50);
        assert_eq!(grid[0], 0.0);
        assert_eq!(grid[1], 1000.0);
        assert_eq!(grid[10], 1.0);
        assert_eq!(grid[11], 1001.0);
    }

    #[test]
    fn test_multiband_interleaving() {
        let grid = create_multiband_grid(3, 2, 2);
        assert_eq!(grid.len(), 12);
        // pixel (1, 0): bands 0 and 1 sit next to each other
        assert_eq!(grid[2], multiband_value(1, 0, 0));
        assert_eq!(grid[3], multiband_value(1, 0, 1));
        assert_eq!(grid[3], 101_000.0);
    }

    #[test]
    fn test_tile_pattern_encodes_global_position() {
        let tile = create_tile_pattern(1, 2, 10, 10, 0.0);
        assert_eq!(tile.len(), 100);
        assert_eq!(tile[0], (10 * 1000 + 20) as f32);
        assert_eq!(tile[10 * 3 + 4], (14 * 1000 + 23) as f32);
    }

    #[test]
    fn test_create_grid_with_nans() {
        let grid = create_grid_with_nans(10, 10, &[(0, 0), (5, 5), (100, 0)]);
        assert!(grid[0].is_nan());
        assert!(grid[55].is_nan());
        assert!(!grid[1].is_nan());
    }

    #[test]
    fn test_create_constant_grid() {
        let grid = create_constant_grid(4, 4, 7.5);
        assert!(grid.iter().all(|&v| v == 7.5));
    }
}
