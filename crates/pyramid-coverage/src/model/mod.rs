//! Pyramid data model.
//!
//! Plain data: a [`PyramidSet`] owns [`Pyramid`]s by id, a pyramid owns its
//! [`Mosaic`]s. Tile bytes live in a `TileStore`.

pub mod mosaic;
pub mod pyramid;
pub mod pyramid_set;

pub use mosaic::{Mosaic, MosaicGeometry, TileRange};
pub use pyramid::Pyramid;
pub use pyramid_set::PyramidSet;
