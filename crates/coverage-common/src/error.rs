//! Error types for reference systems, envelopes and transforms.

use thiserror::Error;

/// Failure reported by a [`CrsTransform`](crate::CrsTransform).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("no transform from {source_crs} to {target_crs}")]
    Unsupported {
        source_crs: String,
        target_crs: String,
    },

    #[error("transform produced non-finite coordinates for {0}")]
    NonFinite(String),
}

/// Misuse of [`Envelope`](crate::Envelope) operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvelopeError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("envelope needs at least 2 dimensions, got {0}")]
    TooFewDimensions(usize),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}
