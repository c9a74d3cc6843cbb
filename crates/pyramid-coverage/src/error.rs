//! Error types for pyramid storage and coverage reads.

use coverage_common::{CrsParseError, EnvelopeError, ProjectionError};
use thiserror::Error;
use tile_storage::StorageError;

/// Errors returned by the coverage reader, writer and resource.
///
/// Every failure is returned by value and nothing is retried. An absent
/// tile is not an error.
#[derive(Error, Debug)]
pub enum CoverageError {
    /// The request CRS cannot be brought into the dataset CRS.
    #[error("incompatible reference system: {0}")]
    IncompatibleReferenceSystem(String),

    /// The request does not overlap the coverage domain.
    #[error("request is disjoint from the coverage domain: {0}")]
    DisjointDomain(String),

    /// The request envelope is unusable even after clipping.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Non-positive or non-finite mosaic geometry, or a raster that does
    /// not fit its tile.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A pyramid already exists at this slice (only when uniqueness is enforced)
    /// or under this id.
    #[error("duplicate pyramid: {0}")]
    DuplicatePyramid(String),

    #[error("pyramid {pyramid} already has a mosaic at resolution ({res_x}, {res_y})")]
    DuplicateResolution {
        pyramid: String,
        res_x: f64,
        res_y: f64,
    },

    /// Tile index outside the mosaic grid.
    #[error("tile ({col}, {row}) outside the {columns}x{rows} grid of mosaic {mosaic}")]
    OutOfRange {
        mosaic: String,
        col: u32,
        row: u32,
        columns: u32,
        rows: u32,
    },

    /// Backend failure.
    #[error("I/O error: {0}")]
    Io(#[from] StorageError),

    #[error("pyramid not found: {0}")]
    PyramidNotFound(String),

    #[error("mosaic {mosaic} not found in pyramid {pyramid}")]
    MosaicNotFound { pyramid: String, mosaic: String },

    /// Tile encode/decode failure, or an unknown tile format.
    #[error("codec error: {0}")]
    Codec(String),

    /// Malformed persisted descriptor.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Band selection references a band the coverage does not have.
    #[error("invalid band selection: {0}")]
    InvalidBands(String),

    /// Pyramid or mosaic id that cannot be used as a storage path segment.
    #[error("invalid id: {0:?}")]
    InvalidId(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CoverageError {
    pub fn incompatible_crs(msg: impl Into<String>) -> Self {
        Self::IncompatibleReferenceSystem(msg.into())
    }

    pub fn disjoint(msg: impl Into<String>) -> Self {
        Self::DisjointDomain(msg.into())
    }

    pub fn invalid_envelope(msg: impl Into<String>) -> Self {
        Self::InvalidEnvelope(msg.into())
    }

    /// Create an InvalidGeometry error.
    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn mosaic_not_found(pyramid: impl Into<String>, mosaic: impl Into<String>) -> Self {
        Self::MosaicNotFound {
            pyramid: pyramid.into(),
            mosaic: mosaic.into(),
        }
    }
}

impl From<serde_json::Error> for CoverageError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidMetadata(err.to_string())
    }
}

impl From<EnvelopeError> for CoverageError {
    fn from(err: EnvelopeError) -> Self {
        Self::InvalidEnvelope(err.to_string())
    }
}

impl From<ProjectionError> for CoverageError {
    fn from(err: ProjectionError) -> Self {
        Self::IncompatibleReferenceSystem(err.to_string())
    }
}

impl From<CrsParseError> for CoverageError {
    fn from(err: CrsParseError) -> Self {
        Self::IncompatibleReferenceSystem(err.to_string())
    }
}

/// Result type for coverage operations.
pub type Result<T> = std::result::Result<T, CoverageError>;
