//! Bounding-box to tile-set resolution.
//!
//! Given a requested WGS84 bounding box and the inventory of tiles the
//! dataset actually publishes, `resolve` returns the sorted set of tile ids
//! whose cells overlap the request. Overlap is half-open: a tile that only
//! touches the bbox along an edge contributes no pixels and is excluded.
//!
//! An empty result is returned as `Ok(vec![])`; deciding whether that is
//! fatal belongs to the pipeline layer, which reports it as `NoTilesFound`.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::grid::{TileBounds, TileId};

/// Errors from bounding-box validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoverageError {
    /// min/max coordinates are not strictly ordered.
    #[error("invalid bbox {0}: min must be strictly less than max on both axes")]
    Degenerate(TileBounds),

    /// Coordinates fall outside the WGS84 value range.
    #[error("bbox {0} outside WGS84 range (lon -180..180, lat -90..90)")]
    OutOfRange(TileBounds),
}

/// Validates a requested bounding box before any I/O happens.
///
/// # Errors
///
/// `CoverageError::Degenerate` when `minx >= maxx` or `miny >= maxy`,
/// `CoverageError::OutOfRange` when any coordinate leaves WGS84.
pub fn validate_bbox(bbox: &TileBounds) -> Result<(), CoverageError> {
    if bbox.minx >= bbox.maxx || bbox.miny >= bbox.maxy {
        return Err(CoverageError::Degenerate(*bbox));
    }

    let lon_ok = (-180.0..=180.0).contains(&bbox.minx) && (-180.0..=180.0).contains(&bbox.maxx);
    let lat_ok = (-90.0..=90.0).contains(&bbox.miny) && (-90.0..=90.0).contains(&bbox.maxy);
    if !lon_ok || !lat_ok {
        return Err(CoverageError::OutOfRange(*bbox));
    }

    Ok(())
}

/// Resolves the tile ids from `inventory` that overlap `bbox`.
///
/// The result is sorted lexicographically by id. Since id order is the
/// canonical tile order, the same bbox and inventory always produce the
/// same output sequence.
///
/// # Errors
///
/// Returns `CoverageError` when the bbox fails validation; resolution
/// itself cannot fail, only come back empty.
pub fn resolve(
    bbox: &TileBounds,
    inventory: &BTreeMap<TileId, TileBounds>,
) -> Result<Vec<TileId>, CoverageError> {
    validate_bbox(bbox)?;

    // BTreeMap iteration is already id-sorted, so the collected order is
    // the canonical one.
    let overlapping: Vec<TileId> = inventory
        .iter()
        .filter(|(_, tile_bounds)| tile_bounds.intersects(bbox))
        .map(|(id, _)| id.clone())
        .collect();

    debug!(
        bbox = %bbox,
        matched = overlapping.len(),
        available = inventory.len(),
        "resolved bbox coverage"
    );

    Ok(overlapping)
}
