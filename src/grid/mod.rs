//! Degree-grid tile addressing.
//!
//! The source dataset is published on a fixed lat/lon grid where every tile
//! covers a 10°×10° WGS84 cell. Tiles are named by the coordinates of a
//! reference corner plus hemisphere letters:
//!
//! - Latitude bands: `00N`, `10N`, ..., `80N` and `10S`, ..., `80S`
//! - Longitude bands: `000E`, `010E`, ..., `180E` and `010W`, ..., `180W`
//!
//! `encode` and `TileId::bounds` form a bijection between ids in the valid
//! alphabet and bounds rectangles, so lexicographic id order doubles as a
//! canonical order over tiles.

mod types;

pub use types::{GridError, LatDir, LonDir, TileBounds, TileId, TILE_SIZE_DEG};

use regex::Regex;
use std::sync::OnceLock;

/// Tile id pattern: two latitude digits, N/S, underscore, three longitude
/// digits, E/W. Deliberately no range check beyond the digit counts; ids
/// such as `87N_000E` decode to (empty-in-practice) bounds rather than
/// erroring, matching the dataset's own naming rules.
fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{2})([NS])_(\d{3})([EW])$").unwrap())
}

/// Encodes grid coordinates into a canonical tile id.
///
/// # Arguments
///
/// * `lat_deg` - Latitude band origin in whole degrees (0 to 80)
/// * `lat_dir` - North or South
/// * `lon_deg` - Longitude band origin in whole degrees (0 to 180)
/// * `lon_dir` - East or West
///
/// # Errors
///
/// Returns `GridError` if either degree value falls outside the grid.
pub fn encode(
    lat_deg: u8,
    lat_dir: LatDir,
    lon_deg: u16,
    lon_dir: LonDir,
) -> Result<TileId, GridError> {
    if lat_deg > 80 {
        return Err(GridError::LatitudeOutOfRange(lat_deg));
    }
    if lon_deg > 180 {
        return Err(GridError::LongitudeOutOfRange(lon_deg));
    }

    Ok(TileId::from_canonical(format!(
        "{:02}{}_{:03}{}",
        lat_deg,
        lat_dir.as_char(),
        lon_deg,
        lon_dir.as_char()
    )))
}

impl TileId {
    /// Parses a tile id string, accepting any letter case.
    ///
    /// The input is upper-cased before matching, so `"10s_010w"` parses to
    /// the canonical `10S_010W`.
    ///
    /// # Errors
    ///
    /// Returns `GridError::InvalidTileId` when the string does not match
    /// the id pattern.
    pub fn parse(s: &str) -> Result<TileId, GridError> {
        let canonical = s.trim().to_uppercase();
        if !id_pattern().is_match(&canonical) {
            return Err(GridError::InvalidTileId(s.to_string()));
        }
        Ok(TileId::from_canonical(canonical))
    }

    /// Computes the geographic bounds of this tile.
    ///
    /// The id names the corner of the cell nearest the equator/prime
    /// meridian: a northern band extends 10° north of its latitude value,
    /// a southern band 10° further south, and likewise for east/west.
    pub fn bounds(&self) -> TileBounds {
        let caps = id_pattern()
            .captures(self.as_str())
            .expect("TileId is always canonical");

        // Digit groups cannot fail to parse once the pattern matched.
        let lat_deg: f64 = caps[1].parse().unwrap();
        let lon_deg: f64 = caps[3].parse().unwrap();

        let (miny, maxy) = match &caps[2] {
            "N" => (lat_deg, lat_deg + TILE_SIZE_DEG),
            _ => (-lat_deg - TILE_SIZE_DEG, -lat_deg),
        };
        let (minx, maxx) = match &caps[4] {
            "E" => (lon_deg, lon_deg + TILE_SIZE_DEG),
            _ => (-lon_deg - TILE_SIZE_DEG, -lon_deg),
        };

        TileBounds::new(minx, miny, maxx, maxy)
    }
}
