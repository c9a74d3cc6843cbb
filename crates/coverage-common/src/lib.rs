//! Common types shared by the pyramid coverage crates.
//!
//! - [`BoundingBox`]: the 2-D spatial footprint used for tile arithmetic
//! - [`Envelope`]: the N-dimensional extent over spatial and extra axes
//! - [`ReferenceSystem`]: horizontal CRS plus the extra (slice) axes
//! - [`CrsTransform`]: the reprojection collaborator

pub mod bbox;
pub mod crs;
pub mod envelope;
pub mod error;
pub mod transform;

pub use bbox::BoundingBox;
pub use crs::{AxisKind, CrsCode, DimensionAxis, ReferenceSystem};
pub use envelope::Envelope;
pub use error::{CrsParseError, EnvelopeError, ProjectionError};
pub use transform::{CrsTransform, IdentityTransform, WebMercatorTransform};
