//! Coordinate Reference System types.
//!
//! A dataset's [`ReferenceSystem`] is a horizontal CRS (two spatial axes)
//! followed by zero or more extra axes such as elevation or time. Extra
//! axes are the "slice" axes a pyramid is pinned to.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CrsParseError;

/// Well-known horizontal CRS codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    Epsg4326,
    /// Web Mercator (meters)
    Epsg3857,
    /// NAD83 Geographic
    Epsg4269,
    /// Any other authority code, kept verbatim (upper-cased).
    Other(String),
}

impl CrsCode {
    /// Parse a CRS identifier.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326"
    /// - "epsg:3857"
    /// - "CRS:84" (equivalent to EPSG:4326 with lon/lat axis order)
    /// - any other "AUTHORITY:CODE" pair, kept as [`CrsCode::Other`]
    pub fn parse(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.trim().to_uppercase();

        match normalized.as_str() {
            "EPSG:4326" | "CRS:84" | "OGC:CRS84" => Ok(CrsCode::Epsg4326),
            "EPSG:3857" | "EPSG:900913" => Ok(CrsCode::Epsg3857),
            "EPSG:4269" => Ok(CrsCode::Epsg4269),
            other => match other.split_once(':') {
                Some((authority, code)) if !authority.is_empty() && !code.is_empty() => {
                    Ok(CrsCode::Other(other.to_string()))
                }
                _ => Err(CrsParseError::UnsupportedCrs(s.to_string())),
            },
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326 | CrsCode::Epsg4269)
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrsCode::Epsg4326 => write!(f, "EPSG:4326"),
            CrsCode::Epsg3857 => write!(f, "EPSG:3857"),
            CrsCode::Epsg4269 => write!(f, "EPSG:4269"),
            CrsCode::Other(code) => write!(f, "{}", code),
        }
    }
}

impl TryFrom<String> for CrsCode {
    type Error = CrsParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CrsCode::parse(&value)
    }
}

impl From<CrsCode> for String {
    fn from(code: CrsCode) -> Self {
        code.to_string()
    }
}

/// What an extra axis measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisKind {
    Vertical,
    Temporal,
    Other,
}

/// One non-spatial axis of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DimensionAxis {
    pub name: String,
    pub kind: AxisKind,
    /// Unit of measure, e.g. "m" or "s". Informational only.
    #[serde(default)]
    pub unit: String,
}

impl DimensionAxis {
    pub fn new(name: impl Into<String>, kind: AxisKind, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            unit: unit.into(),
        }
    }

    pub fn elevation() -> Self {
        Self::new("elevation", AxisKind::Vertical, "m")
    }

    pub fn time() -> Self {
        Self::new("time", AxisKind::Temporal, "s")
    }
}

/// Compound reference system: horizontal CRS plus extra axes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceSystem {
    pub horizontal: CrsCode,
    #[serde(default)]
    pub extra_axes: Vec<DimensionAxis>,
}

impl ReferenceSystem {
    /// A purely two-dimensional reference system.
    pub fn horizontal(code: CrsCode) -> Self {
        Self {
            horizontal: code,
            extra_axes: Vec::new(),
        }
    }

    /// Add an extra axis after the two spatial axes.
    pub fn with_axis(mut self, axis: DimensionAxis) -> Self {
        self.extra_axes.push(axis);
        self
    }

    /// Total number of axes (2 spatial + extras).
    pub fn dimension(&self) -> usize {
        2 + self.extra_axes.len()
    }

    /// Same horizontal CRS and identical extra axes.
    pub fn is_equivalent(&self, other: &ReferenceSystem) -> bool {
        self.horizontal == other.horizontal && self.extra_axes == other.extra_axes
    }

    /// Extra axes agree, so the two systems differ at most horizontally.
    pub fn same_extra_axes(&self, other: &ReferenceSystem) -> bool {
        self.extra_axes == other.extra_axes
    }
}

impl fmt::Display for ReferenceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.horizontal)?;
        for axis in &self.extra_axes {
            write!(f, " + {}", axis.name)?;
        }
        Ok(())
    }
}
