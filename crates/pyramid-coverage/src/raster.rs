//! In-memory raster buffers.

use crate::error::{CoverageError, Result};

/// A `width x height` raster of `f32` samples with one or more bands.
///
/// Samples are row-major and pixel-interleaved: the bands of pixel
/// `(x, y)` are `data[(y * width + x) * bands..][..bands]`. Row 0 is the
/// northern (top) edge.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterBuffer {
    width: usize,
    height: usize,
    bands: usize,
    data: Vec<f32>,
}

impl RasterBuffer {
    /// Wrap existing samples, checking the length matches the shape.
    pub fn new(width: usize, height: usize, bands: usize, data: Vec<f32>) -> Result<Self> {
        if bands == 0 {
            return Err(CoverageError::invalid_geometry("raster needs at least one band"));
        }
        let expected = width * height * bands;
        if data.len() != expected {
            return Err(CoverageError::invalid_geometry(format!(
                "{}x{}x{} raster needs {} samples, got {}",
                width,
                height,
                bands,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            bands,
            data,
        })
    }

    /// Single-band raster from row-major samples.
    pub fn single_band(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        Self::new(width, height, 1, data)
    }

    /// Raster with every sample set to `value`.
    pub fn filled(width: usize, height: usize, bands: usize, value: f32) -> Self {
        Self {
            width,
            height,
            bands: bands.max(1),
            data: vec![value; width * height * bands.max(1)],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// All bands of one pixel.
    pub fn pixel(&self, x: usize, y: usize) -> Option<&[f32]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y * self.width + x) * self.bands;
        Some(&self.data[start..start + self.bands])
    }

    pub fn get(&self, x: usize, y: usize, band: usize) -> Option<f32> {
        if band >= self.bands {
            return None;
        }
        self.pixel(x, y).map(|p| p[band])
    }

    pub fn set(&mut self, x: usize, y: usize, band: usize, value: f32) {
        if x < self.width && y < self.height && band < self.bands {
            self.data[(y * self.width + x) * self.bands + band] = value;
        }
    }

    /// Copy `src` into this raster with its top-left at `(dst_x, dst_y)`.
    ///
    /// Parts of `src` falling outside this raster are dropped.
    pub fn blit(&mut self, src: &RasterBuffer, dst_x: usize, dst_y: usize) -> Result<()> {
        if src.bands != self.bands {
            return Err(CoverageError::invalid_geometry(format!(
                "cannot copy a {}-band raster into a {}-band raster",
                src.bands, self.bands
            )));
        }
        if dst_x >= self.width || dst_y >= self.height {
            return Ok(());
        }

        let copy_w = src.width.min(self.width - dst_x);
        let copy_h = src.height.min(self.height - dst_y);
        let row_len = copy_w * self.bands;

        for y in 0..copy_h {
            let src_start = y * src.width * src.bands;
            let dst_start = ((dst_y + y) * self.width + dst_x) * self.bands;
            self.data[dst_start..dst_start + row_len]
                .copy_from_slice(&src.data[src_start..src_start + row_len]);
        }
        Ok(())
    }

    /// A `width x height` window starting at `(x, y)`.
    ///
    /// Pixels beyond this raster's edge are set to `background`.
    pub fn window(&self, x: usize, y: usize, width: usize, height: usize, background: f32) -> Self {
        let mut out = Self::filled(width, height, self.bands, background);
        if x >= self.width || y >= self.height {
            return out;
        }

        let copy_w = width.min(self.width - x);
        let copy_h = height.min(self.height - y);
        let row_len = copy_w * self.bands;

        for row in 0..copy_h {
            let src_start = ((y + row) * self.width + x) * self.bands;
            let dst_start = row * width * self.bands;
            out.data[dst_start..dst_start + row_len]
                .copy_from_slice(&self.data[src_start..src_start + row_len]);
        }
        out
    }

    /// Keep only the listed bands, in the listed order.
    pub fn select_bands(&self, bands: &[usize]) -> Result<Self> {
        if bands.is_empty() {
            return Err(CoverageError::InvalidBands(
                "band selection is empty".to_string(),
            ));
        }
        if let Some(&bad) = bands.iter().find(|&&b| b >= self.bands) {
            return Err(CoverageError::InvalidBands(format!(
                "band {} requested but the coverage has {} band(s)",
                bad, self.bands
            )));
        }

        let mut data = Vec::with_capacity(self.width * self.height * bands.len());
        for pixel in self.data.chunks_exact(self.bands) {
            data.extend(bands.iter().map(|&b| pixel[b]));
        }
        Ok(Self {
            width: self.width,
            height: self.height,
            bands: bands.len(),
            data,
        })
    }
}
