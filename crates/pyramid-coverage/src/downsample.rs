//! Downsampling for generating pyramid levels.
//!
//! Each level halves the resolution of the previous one. Odd dimensions
//! round up: the last row or column of blocks is partial, and the missing
//! samples count as NaN.

use serde::{Deserialize, Serialize};

use crate::raster::RasterBuffer;

/// Method used to reduce a 2x2 block to one sample.
///
/// - **Mean**: continuous data
/// - **Max**: peak/threshold data where maxima must survive
/// - **Nearest**: fast, preserves exact values, good for categorical data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownsampleMethod {
    /// Average of the valid samples in the block
    #[default]
    Mean,
    /// Largest valid sample in the block
    Max,
    /// Top-left sample of the block
    Nearest,
}

impl DownsampleMethod {
    /// Parse from string (case-insensitive), falling back to `Mean`.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "max" => Self::Max,
            "nearest" => Self::Nearest,
            _ => Self::Mean,
        }
    }
}

/// Downsample every band of a raster by a factor of 2.
pub fn downsample_2x(raster: &RasterBuffer, method: DownsampleMethod) -> RasterBuffer {
    let (width, height, bands) = (raster.width(), raster.height(), raster.bands());
    let new_width = width.div_ceil(2);
    let new_height = height.div_ceil(2);

    let mut output = RasterBuffer::filled(new_width, new_height, bands, f32::NAN);
    let sample = |x: usize, y: usize, band: usize| raster.get(x, y, band).unwrap_or(f32::NAN);

    for out_y in 0..new_height {
        for out_x in 0..new_width {
            let in_x = out_x * 2;
            let in_y = out_y * 2;

            for band in 0..bands {
                let block = [
                    sample(in_x, in_y, band),
                    sample(in_x + 1, in_y, band),
                    sample(in_x, in_y + 1, band),
                    sample(in_x + 1, in_y + 1, band),
                ];

                let value = match method {
                    DownsampleMethod::Mean => mean_of_block(&block),
                    DownsampleMethod::Max => max_of_block(&block),
                    DownsampleMethod::Nearest => block[0],
                };
                output.set(out_x, out_y, band, value);
            }
        }
    }

    output
}

/// Mean of the non-NaN values; NaN when all are NaN.
#[inline]
fn mean_of_block(values: &[f32; 4]) -> f32 {
    let mut sum = 0.0f32;
    let mut count = 0;

    for &v in values {
        if !v.is_nan() {
            sum += v;
            count += 1;
        }
    }

    if count == 0 {
        f32::NAN
    } else {
        sum / count as f32
    }
}

/// Maximum of the non-NaN values; NaN when all are NaN.
#[inline]
fn max_of_block(values: &[f32; 4]) -> f32 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<f32>, v| Some(acc.map_or(v, |m| m.max(v))))
        .unwrap_or(f32::NAN)
}

/// One generated pyramid level.
#[derive(Debug, Clone)]
pub struct PyramidLevelData {
    pub raster: RasterBuffer,
    /// Level index (0 = native, 1 = 2x downsampled, etc.)
    pub level: u32,
    /// Scale factor relative to native (1, 2, 4, 8, ...)
    pub scale: u32,
}

/// Number of levels [`generate_pyramid`] produces for a raster size,
/// including the native level.
pub fn count_levels(width: usize, height: usize, min_dimension: usize) -> usize {
    let mut levels = 1;
    let (mut w, mut h) = (width, height);
    while w > 1 && h > 1 {
        w = w.div_ceil(2);
        h = h.div_ceil(2);
        if w.min(h) < min_dimension {
            break;
        }
        levels += 1;
    }
    levels
}

/// Generate all pyramid levels for a raster.
///
/// Level 0 is the input itself. Downsampling repeats while the smaller
/// dimension of the next level stays at or above `min_dimension`.
pub fn generate_pyramid(
    raster: &RasterBuffer,
    min_dimension: usize,
    method: DownsampleMethod,
) -> Vec<PyramidLevelData> {
    let num_levels = count_levels(raster.width(), raster.height(), min_dimension);
    let mut levels = Vec::with_capacity(num_levels);

    levels.push(PyramidLevelData {
        raster: raster.clone(),
        level: 0,
        scale: 1,
    });

    for level in 1..num_levels as u32 {
        let previous = &levels[levels.len() - 1].raster;
        let next = downsample_2x(previous, method);
        levels.push(PyramidLevelData {
            raster: next,
            level,
            scale: 1 << level,
        });
    }

    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{create_constant_grid, create_grid_with_nans};

    fn grid_1_to_16() -> RasterBuffer {
        // 4x4 grid with values 1-16
        RasterBuffer::single_band(4, 4, (1..=16).map(|x| x as f32).collect()).unwrap()
    }

    #[test]
    fn test_downsample_2x_mean() {
        let result = downsample_2x(&grid_1_to_16(), DownsampleMethod::Mean);

        assert_eq!(result.width(), 2);
        assert_eq!(result.height(), 2);

        // Top-left 2x2 block: 1,2,5,6 -> mean = 3.5
        assert!((result.get(0, 0, 0).unwrap() - 3.5).abs() < 0.001);
        // Top-right 2x2 block: 3,4,7,8 -> mean = 5.5
        assert!((result.get(1, 0, 0).unwrap() - 5.5).abs() < 0.001);
    }

    #[test]
    fn test_downsample_2x_max() {
        let result = downsample_2x(&grid_1_to_16(), DownsampleMethod::Max);

        // Top-left 2x2 block: 1,2,5,6 -> max = 6
        assert_eq!(result.get(0, 0, 0), Some(6.0));
        // Bottom-right 2x2 block: 11,12,15,16 -> max = 16
        assert_eq!(result.get(1, 1, 0), Some(16.0));
    }

    #[test]
    fn test_downsample_2x_nearest() {
        let result = downsample_2x(&grid_1_to_16(), DownsampleMethod::Nearest);

        // Top-left of each 2x2 block
        assert_eq!(result.get(0, 0, 0), Some(1.0));
        assert_eq!(result.get(1, 0, 0), Some(3.0));
    }

    #[test]
    fn test_downsample_handles_nan() {
        let raster = RasterBuffer::single_band(2, 2, vec![1.0, f32::NAN, 3.0, 4.0]).unwrap();
        let result = downsample_2x(&raster, DownsampleMethod::Mean);

        // Mean of 1, 3, 4 (ignoring NaN)
        assert!((result.get(0, 0, 0).unwrap() - 8.0 / 3.0).abs() < 0.001);

        let all_nan = RasterBuffer::filled(2, 2, 1, f32::NAN);
        assert!(downsample_2x(&all_nan, DownsampleMethod::Max)
            .get(0, 0, 0)
            .unwrap()
            .is_nan());
    }

    #[test]
    fn test_nan_cells_skipped_per_block() {
        // Whole top-left block plus one corner cell are NaN.
        let nans = [(0, 0), (1, 0), (0, 1), (1, 1), (3, 3)];
        let raster = RasterBuffer::single_band(4, 4, create_grid_with_nans(4, 4, &nans)).unwrap();

        let mean = downsample_2x(&raster, DownsampleMethod::Mean);
        assert!(mean.get(0, 0, 0).unwrap().is_nan());
        assert!((mean.get(1, 0, 0).unwrap() - 2500.5).abs() < 0.01);
        assert!((mean.get(1, 1, 0).unwrap() - 7007.0 / 3.0).abs() < 0.01);

        let max = downsample_2x(&raster, DownsampleMethod::Max);
        assert_eq!(max.get(1, 1, 0), Some(3002.0));
    }

    #[test]
    fn test_constant_grid_stays_constant_at_every_level() {
        let raster = RasterBuffer::single_band(16, 16, create_constant_grid(16, 16, 7.5)).unwrap();

        for method in [DownsampleMethod::Mean, DownsampleMethod::Max, DownsampleMethod::Nearest] {
            for level in generate_pyramid(&raster, 2, method) {
                assert!(
                    level.raster.data().iter().all(|&v| v == 7.5),
                    "{:?} level {}",
                    method,
                    level.level
                );
            }
        }
    }

    #[test]
    fn test_odd_dimensions_round_up() {
        let raster = RasterBuffer::single_band(3, 3, (1..=9).map(|x| x as f32).collect()).unwrap();
        let result = downsample_2x(&raster, DownsampleMethod::Mean);

        assert_eq!((result.width(), result.height()), (2, 2));
        // Right column block holds 3 and 6 only
        assert!((result.get(1, 0, 0).unwrap() - 4.5).abs() < 0.001);
        // Corner block holds 9 only
        assert_eq!(result.get(1, 1, 0), Some(9.0));
    }

    #[test]
    fn test_bands_downsampled_independently() {
        let data: Vec<f32> = (0..16).flat_map(|i| [i as f32, -(i as f32)]).collect();
        let raster = RasterBuffer::new(4, 4, 2, data).unwrap();
        let result = downsample_2x(&raster, DownsampleMethod::Max);

        assert_eq!(result.bands(), 2);
        assert_eq!(result.get(0, 0, 0), Some(5.0));
        assert_eq!(result.get(0, 0, 1), Some(0.0));
    }

    #[test]
    fn test_generate_pyramid() {
        let raster = RasterBuffer::filled(16, 16, 1, 1.0);
        let levels = generate_pyramid(&raster, 4, DownsampleMethod::Mean);

        // 16x16, 8x8, 4x4; 2x2 would be below min_dimension
        assert_eq!(levels.len(), 3);
        assert_eq!(count_levels(16, 16, 4), 3);

        assert_eq!(levels[0].raster.width(), 16);
        assert_eq!(levels[0].scale, 1);
        assert_eq!(levels[1].raster.width(), 8);
        assert_eq!(levels[1].level, 1);
        assert_eq!(levels[1].scale, 2);
        assert_eq!(levels[2].raster.height(), 4);
        assert_eq!(levels[2].scale, 4);
    }

    #[test]
    fn test_small_raster_has_native_level_only() {
        assert_eq!(count_levels(100, 100, 256), 1);
        assert_eq!(count_levels(1, 1, 1), 1);
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!(DownsampleMethod::from_str("MAX"), DownsampleMethod::Max);
        assert_eq!(DownsampleMethod::from_str("nearest"), DownsampleMethod::Nearest);
        assert_eq!(DownsampleMethod::from_str("bogus"), DownsampleMethod::Mean);
    }
}
