//! Run outcome reporting.
//!
//! Every pipeline run produces a structured outcome: which tiles were
//! resolved, which failed at fetch or stack time, and the shape of the
//! mosaic that came out the other end. All types serialize to JSON so a
//! run can leave a machine-readable sidecar next to its descriptor.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::grid::{TileBounds, TileId};
use crate::layer::Layer;

/// Tiles dropped by the partial-failure policy, split by the stage that
/// dropped them. Disjoint lists: a tile that never fetched is never
/// reported again as a stack failure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FailureReport {
    pub fetch_failed: Vec<TileId>,
    pub stack_failed: Vec<TileId>,
}

impl FailureReport {
    pub fn is_empty(&self) -> bool {
        self.fetch_failed.is_empty() && self.stack_failed.is_empty()
    }

    /// Total tiles dropped across both stages.
    pub fn total(&self) -> usize {
        self.fetch_failed.len() + self.stack_failed.len()
    }
}

/// Shape of a built mosaic, reported alongside its descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct MosaicSummary {
    pub tile_ids: Vec<TileId>,
    pub width: u32,
    pub height: u32,
    pub crs: String,
}

/// Full account of one region run: the request, what survived each stage,
/// and where the descriptor landed.
#[derive(Debug, Clone, Serialize)]
pub struct RegionOutcome {
    pub bbox: TileBounds,
    pub resolved: Vec<TileId>,
    /// Tiles with at least one layer fetched, including partially-fetched
    /// tiles later dropped at stack time.
    pub fetched: Vec<TileId>,
    pub mosaic: MosaicSummary,
    pub failures: FailureReport,
    pub descriptor_path: PathBuf,
    /// Human-readable band labels keyed by one-based band index.
    pub band_labels: BTreeMap<usize, String>,
}

impl RegionOutcome {
    /// Standard band labels in stacking order.
    pub fn band_labels() -> BTreeMap<usize, String> {
        Layer::ALL
            .iter()
            .map(|layer| (layer.band_index(), layer.description().to_string()))
            .collect()
    }
}

/// A named region in a batch request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedRegion {
    pub name: String,
    pub bbox: TileBounds,
}

/// A named collection of regions processed as one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionCollection {
    pub name: String,
    pub regions: Vec<NamedRegion>,
}

/// One region's slot in a batch outcome. Regions fail independently; a
/// batch carries both successes and the errors of everything that did not
/// make it.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRegionOutcome {
    pub collection: String,
    pub region: String,
    #[serde(flatten)]
    pub result: BatchRegionResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchRegionResult {
    Built {
        outcome: RegionOutcome,
        descriptor_copy: PathBuf,
    },
    Failed {
        error: String,
    },
}

/// Outcome of a whole batch of region collections.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub regions: Vec<BatchRegionOutcome>,
}

impl BatchOutcome {
    pub fn built(&self) -> usize {
        self.regions
            .iter()
            .filter(|r| matches!(r.result, BatchRegionResult::Built { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.regions.len() - self.built()
    }
}
