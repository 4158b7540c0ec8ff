//! Reference-list parsing.
//!
//! Each layer publishes a plain-text reference list, one artifact filename
//! per line, with the tile id embedded in the name:
//!
//! ```text
//! Hansen_GFC-2024-v1.12_lossyear_00N_000E.tif
//! Hansen_GFC-2024-v1.12_lossyear_10N_010E.tif
//! ```
//!
//! The parser extracts the id token from every line and derives bounds from
//! the id alone, so a tile's bounds are identical regardless of which
//! layer's list mentioned it first.

use std::collections::BTreeMap;

use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, trace};

use crate::grid::{TileBounds, TileId};

/// Embedded tile id token: latitude band limited to `0-8` tens of degrees
/// (the dataset reaches 80N/80S), longitude band three digits.
fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([0-8]\d[NS])_(\d{3}[EW])").unwrap())
}

/// Parses one reference list into a map of tile ids to bounds.
///
/// Lines with no embedded id token are skipped (trace-logged); duplicate
/// ids keep the first entry, which is harmless since bounds derive purely
/// from the id.
pub fn parse_reference_list(text: &str) -> BTreeMap<TileId, TileBounds> {
    let mut tiles = BTreeMap::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(caps) = token_pattern().captures(line) else {
            trace!(line, "skipping line with no tile id token");
            continue;
        };

        let token = format!("{}_{}", &caps[1], &caps[2]);
        // The token pattern is a strict subset of the id pattern.
        let id = TileId::parse(&token).expect("captured token is a valid tile id");
        let bounds = id.bounds();
        tiles.entry(id).or_insert(bounds);
    }

    debug!(tiles = tiles.len(), "parsed reference list");
    tiles
}
