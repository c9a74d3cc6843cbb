//! Configuration for pyramid storage and reads.

use serde::{Deserialize, Serialize};

use crate::codec::CodecRegistry;
use crate::downsample::DownsampleMethod;
use crate::error::{CoverageError, Result};

/// Configuration for a pyramid resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PyramidConfig {
    /// Memory budget for the tile cache in megabytes (0 disables it).
    pub tile_cache_size_mb: usize,

    /// Upper bound on tile fetches in flight during one assembly.
    pub max_concurrent_tile_reads: usize,

    /// Reject a second pyramid at an already occupied slice.
    pub enforce_unique_slices: bool,

    /// Tolerance when comparing slice values on extra axes.
    pub slice_tolerance: f64,

    /// Codec format for newly created pyramids.
    pub tile_format: String,

    /// Settings for generating pyramids from full-resolution rasters.
    pub generation: GenerationConfig,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            tile_cache_size_mb: 256,
            max_concurrent_tile_reads: 16,
            enforce_unique_slices: false,
            slice_tolerance: 1e-9,
            tile_format: "deflate".to_string(),
            generation: GenerationConfig::default(),
        }
    }
}

impl PyramidConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PYRAMID_TILE_CACHE_MB") {
            if let Ok(size) = val.parse() {
                config.tile_cache_size_mb = size;
            }
        }

        if let Ok(val) = std::env::var("PYRAMID_MAX_CONCURRENT_READS") {
            if let Ok(n) = val.parse() {
                config.max_concurrent_tile_reads = n;
            }
        }

        if let Ok(val) = std::env::var("PYRAMID_UNIQUE_SLICES") {
            config.enforce_unique_slices = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("PYRAMID_SLICE_TOLERANCE") {
            if let Ok(tol) = val.parse() {
                config.slice_tolerance = tol;
            }
        }

        if let Ok(val) = std::env::var("PYRAMID_TILE_FORMAT") {
            config.tile_format = val.to_lowercase();
        }

        config.generation = GenerationConfig::from_env();
        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_tile_reads == 0 {
            return Err(CoverageError::config("max_concurrent_tile_reads must be > 0"));
        }

        if !self.slice_tolerance.is_finite() || self.slice_tolerance < 0.0 {
            return Err(CoverageError::config(
                "slice_tolerance must be a finite non-negative number",
            ));
        }

        if self.tile_format.is_empty() {
            return Err(CoverageError::config("tile_format must not be empty"));
        }

        self.generation.validate()
    }

    /// Validate, and check the tile format has a codec.
    pub fn validate_with(&self, codecs: &CodecRegistry) -> Result<()> {
        self.validate()?;
        if !codecs.contains(&self.tile_format) {
            return Err(CoverageError::config(format!(
                "tile_format '{}' has no registered codec (available: {:?})",
                self.tile_format,
                codecs.formats()
            )));
        }
        Ok(())
    }

    /// Get the tile cache size in bytes.
    pub fn tile_cache_size_bytes(&self) -> usize {
        self.tile_cache_size_mb * 1024 * 1024
    }
}

/// Configuration for multi-resolution pyramid generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Square tile size in pixels for generated mosaics.
    pub tile_size: u32,

    /// Stop adding levels when the smaller dimension of the next level
    /// would fall below this value.
    pub min_dimension: usize,

    /// Downsampling method between levels.
    pub method: DownsampleMethod,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            tile_size: 256,
            min_dimension: 256,
            method: DownsampleMethod::Mean,
        }
    }
}

impl GenerationConfig {
    /// Load generation configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PYRAMID_TILE_SIZE") {
            if let Ok(size) = val.parse() {
                config.tile_size = size;
            }
        }

        if let Ok(val) = std::env::var("PYRAMID_MIN_DIMENSION") {
            if let Ok(size) = val.parse() {
                config.min_dimension = size;
            }
        }

        if let Ok(val) = std::env::var("PYRAMID_DOWNSAMPLE_METHOD") {
            config.method = DownsampleMethod::from_str(&val);
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(CoverageError::config("generation tile_size must be > 0"));
        }

        if self.min_dimension == 0 {
            return Err(CoverageError::config("generation min_dimension must be > 0"));
        }

        Ok(())
    }
}
