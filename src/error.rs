//! Pipeline-level fatal errors.
//!
//! Only errors that abort a whole run live here. Per-tile fetch and stack
//! failures are not errors at this level; they are recovered from and
//! reported in the run's [`FailureReport`](crate::report::FailureReport).

use thiserror::Error;

use crate::coverage::CoverageError;
use crate::fetch::FetchError;
use crate::grid::{GridError, TileBounds};
use crate::mosaic::MosaicError;
use crate::session::Stage;

/// A fatal pipeline error. Any variant aborts the run with no descriptor
/// emitted.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request bounding box was degenerate or outside WGS84 range.
    #[error("invalid bounding box: {0}")]
    InvalidBBox(#[from] CoverageError),

    /// A tile id could not be parsed or encoded.
    #[error("invalid tile id: {0}")]
    InvalidTileId(#[from] GridError),

    /// A reference tile inventory could not be retrieved. Unlike per-tile
    /// artifact fetches, inventory loss means coverage cannot be resolved
    /// at all.
    #[error(transparent)]
    InventoryFetch(#[from] FetchError),

    /// The bounding box was valid but intersected no inventoried tile.
    #[error("no tiles found for bounding box {0}")]
    NoTilesFound(TileBounds),

    /// Every resolved tile was lost to fetch or stack failures, or the
    /// descriptor could not be written.
    #[error("mosaic build failed: {0}")]
    MosaicBuild(#[from] MosaicError),

    /// The run was cancelled before the named stage completed.
    #[error("cancelled during {0}")]
    Cancelled(Stage),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_tiles_message_includes_bbox() {
        let err = PipelineError::NoTilesFound(TileBounds::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(err.to_string(), "no tiles found for bounding box [0, 0, 1, 1]");
    }

    #[test]
    fn test_coverage_errors_convert() {
        let err: PipelineError =
            CoverageError::Degenerate(TileBounds::new(5.0, 0.0, 5.0, 1.0)).into();
        assert!(matches!(err, PipelineError::InvalidBBox(_)));
        assert!(err.to_string().starts_with("invalid bounding box"));
    }
}
