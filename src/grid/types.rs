//! Core types for the degree-grid addressing scheme.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of one grid cell in degrees, both axes.
pub const TILE_SIZE_DEG: f64 = 10.0;

/// Hemisphere of a latitude band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LatDir {
    North,
    South,
}

impl LatDir {
    /// Single-letter uppercase form used in tile ids.
    pub fn as_char(&self) -> char {
        match self {
            LatDir::North => 'N',
            LatDir::South => 'S',
        }
    }
}

/// Hemisphere of a longitude band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LonDir {
    East,
    West,
}

impl LonDir {
    /// Single-letter uppercase form used in tile ids.
    pub fn as_char(&self) -> char {
        match self {
            LonDir::East => 'E',
            LonDir::West => 'W',
        }
    }
}

/// Errors from tile id encoding or decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    /// The string does not match the `##N_###E` tile id pattern.
    #[error("invalid tile id: {0:?}")]
    InvalidTileId(String),

    /// Latitude degree value cannot be represented in the grid.
    #[error("latitude {0}° outside grid range 0-80")]
    LatitudeOutOfRange(u8),

    /// Longitude degree value cannot be represented in the grid.
    #[error("longitude {0}° outside grid range 0-180")]
    LongitudeOutOfRange(u16),
}

/// Identifier of one 10°×10° grid cell, e.g. `"00N_000E"` or `"10S_120W"`.
///
/// The canonical form is uppercase: two latitude digits, hemisphere letter,
/// underscore, three longitude digits, hemisphere letter. Every id in the
/// valid alphabet decodes to exactly one axis-aligned bounds rectangle, and
/// [`encode`](crate::grid::encode) inverts that mapping.
///
/// Ids order lexicographically, which the pipeline uses as its canonical
/// deterministic ordering throughout.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(String);

impl TileId {
    /// Wraps an already-canonical id string without validation.
    ///
    /// Callers outside this module should go through
    /// [`TileId::parse`](crate::grid) or [`encode`](crate::grid::encode).
    pub(crate) fn from_canonical(s: String) -> Self {
        TileId(s)
    }

    /// The canonical id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Axis-aligned geographic rectangle in WGS84 degrees.
///
/// Invariant for grid tiles: `minx < maxx`, `miny < maxy`, and both extents
/// equal [`TILE_SIZE_DEG`]. Arbitrary request bounding boxes share the
/// ordering invariant but may have any extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileBounds {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl TileBounds {
    /// Creates bounds without validation.
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Self {
            minx,
            miny,
            maxx,
            maxy,
        }
    }

    /// Extent along the x axis in degrees.
    pub fn width(&self) -> f64 {
        self.maxx - self.minx
    }

    /// Extent along the y axis in degrees.
    pub fn height(&self) -> f64 {
        self.maxy - self.miny
    }

    /// Half-open rectangle intersection test.
    ///
    /// Rectangles that merely share an edge do not intersect; a tile whose
    /// eastern edge equals the bbox's western edge contributes no pixels to
    /// the requested area.
    pub fn intersects(&self, other: &TileBounds) -> bool {
        !(self.maxx <= other.minx
            || self.minx >= other.maxx
            || self.maxy <= other.miny
            || self.miny >= other.maxy)
    }

    /// Componentwise min/max union of two rectangles.
    pub fn union(&self, other: &TileBounds) -> TileBounds {
        TileBounds {
            minx: self.minx.min(other.minx),
            miny: self.miny.min(other.miny),
            maxx: self.maxx.max(other.maxx),
            maxy: self.maxy.max(other.maxy),
        }
    }
}

impl fmt::Display for TileBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.minx, self.miny, self.maxx, self.maxy
        )
    }
}
