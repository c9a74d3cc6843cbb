//! Tile addressing and the storage path layout.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{StorageError, StorageResult};

/// Address of one tile: (pyramid, mosaic, column, row).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub pyramid_id: String,
    pub mosaic_id: String,
    pub col: u32,
    pub row: u32,
}

impl TileKey {
    pub fn new(
        pyramid_id: impl Into<String>,
        mosaic_id: impl Into<String>,
        col: u32,
        row: u32,
    ) -> Self {
        Self {
            pyramid_id: pyramid_id.into(),
            mosaic_id: mosaic_id.into(),
            col,
            row,
        }
    }

    /// Whether this tile belongs to `pyramid_id` (and `mosaic_id`, if given).
    pub fn belongs_to(&self, pyramid_id: &str, mosaic_id: Option<&str>) -> bool {
        self.pyramid_id == pyramid_id && mosaic_id.map_or(true, |m| self.mosaic_id == m)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.pyramid_id, self.mosaic_id, self.col, self.row
        )
    }
}

/// Check that an id can be used as a single path segment.
///
/// Allowed: ASCII alphanumerics plus `-`, `_` and `.`, not `.` or `..`.
pub fn validate_id(id: &str) -> StorageResult<()> {
    let valid = !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidId(id.to_string()))
    }
}

/// Path builder for consistent storage layout.
pub struct StoragePath;

impl StoragePath {
    const ROOT: &'static str = "pyramids";
    const DESCRIPTOR: &'static str = "descriptor.json";

    /// Format: pyramids/{pyramid}/tiles/{mosaic}/{col}_{row}.tile
    pub fn tile(key: &TileKey) -> String {
        format!(
            "{}/{}/tiles/{}/{}_{}.tile",
            Self::ROOT,
            key.pyramid_id,
            key.mosaic_id,
            key.col,
            key.row
        )
    }

    /// Format: pyramids/{pyramid}/tiles/ or pyramids/{pyramid}/tiles/{mosaic}/
    pub fn tiles_prefix(pyramid_id: &str, mosaic_id: Option<&str>) -> String {
        match mosaic_id {
            Some(mosaic) => format!("{}/{}/tiles/{}", Self::ROOT, pyramid_id, mosaic),
            None => format!("{}/{}/tiles", Self::ROOT, pyramid_id),
        }
    }

    /// Format: pyramids/{pyramid}/descriptor.json
    pub fn descriptor(pyramid_id: &str) -> String {
        format!("{}/{}/{}", Self::ROOT, pyramid_id, Self::DESCRIPTOR)
    }

    /// Root under which every pyramid lives.
    pub fn root() -> &'static str {
        Self::ROOT
    }

    /// Extract the pyramid id from a descriptor path, if it is one.
    pub fn pyramid_of_descriptor(path: &str) -> Option<&str> {
        let rest = path.strip_prefix(Self::ROOT)?.strip_prefix('/')?;
        let (pyramid, file) = rest.split_once('/')?;
        (file == Self::DESCRIPTOR).then_some(pyramid)
    }
}
