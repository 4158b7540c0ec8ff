//! End-to-end mosaic session orchestration.
//!
//! A [`MosaicSession`] walks one bounding box through the full pipeline:
//!
//! ```text
//! bbox ──► coverage ──► fetch ──► stack ──► mosaic descriptor
//!            │            │         │
//!         inventory    partial   partial
//!         (cached)     failures  failures
//! ```
//!
//! Per-tile failures at the fetch and stack stages are recovered from and
//! reported; fatal errors (bad bbox, unreachable inventory, empty
//! coverage, nothing left to mosaic) abort the run. Cancellation is
//! checked between stages and inside the batch stages; a cancelled run
//! never writes a descriptor.
//!
//! The tile inventory is loaded once per session and reused across runs;
//! `reset` drops it for long-lived sessions that need to pick up dataset
//! changes.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::SessionConfig;
use crate::coverage;
use crate::error::PipelineError;
use crate::fetch::{AsyncHttpClient, HttpError, ReqwestClient, TileFetcher};
use crate::grid::{TileBounds, TileId};
use crate::mosaic::MosaicIndexBuilder;
use crate::raster::RasterIo;
use crate::report::{
    BatchOutcome, BatchRegionOutcome, BatchRegionResult, FailureReport, RegionCollection,
    RegionOutcome,
};
use crate::stack::BandStacker;
use crate::telemetry::{PipelineMetrics, TelemetrySnapshot};

/// Pipeline stage names, used in cancellation errors and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Inventory,
    Coverage,
    Fetch,
    Stack,
    Mosaic,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Inventory => "inventory",
            Stage::Coverage => "coverage",
            Stage::Fetch => "fetch",
            Stage::Stack => "stack",
            Stage::Mosaic => "mosaic",
        };
        f.write_str(name)
    }
}

/// One mosaic pipeline over a shared configuration.
///
/// Generic over the HTTP client so tests can script responses; production
/// code uses [`ReqwestClient`](crate::fetch::ReqwestClient).
pub struct MosaicSession<C: AsyncHttpClient> {
    config: SessionConfig,
    fetcher: TileFetcher<C>,
    stacker: BandStacker,
    builder: MosaicIndexBuilder,
    metrics: Arc<PipelineMetrics>,
    inventory: Option<BTreeMap<TileId, TileBounds>>,
}

impl MosaicSession<ReqwestClient> {
    /// Creates a session over a real HTTP client built from the config,
    /// honoring `timeout_secs`.
    ///
    /// # Errors
    ///
    /// `HttpError::Build` when the underlying client cannot be constructed.
    pub fn connect(config: SessionConfig, io: Arc<dyn RasterIo>) -> Result<Self, HttpError> {
        let client = ReqwestClient::with_timeout(config.timeout_secs)?;
        Ok(Self::new(config, Arc::new(client), io))
    }
}

impl<C: AsyncHttpClient + 'static> MosaicSession<C> {
    /// Creates a session over the given HTTP client and raster backend.
    pub fn new(config: SessionConfig, client: Arc<C>, io: Arc<dyn RasterIo>) -> Self {
        let metrics = Arc::new(PipelineMetrics::new());
        let fetcher =
            TileFetcher::new(config.clone(), client).with_metrics(Arc::clone(&metrics));
        let stacker = BandStacker::new(config.clone(), io).with_metrics(Arc::clone(&metrics));
        let builder = MosaicIndexBuilder::new(&config.output_folder);

        Self {
            config,
            fetcher,
            stacker,
            builder,
            metrics,
            inventory: None,
        }
    }

    /// Point-in-time copy of the session's pipeline counters.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.metrics.snapshot()
    }

    /// Drops the cached tile inventory; the next run reloads it.
    pub fn reset(&mut self) {
        self.inventory = None;
    }

    /// Runs the full pipeline for one bounding box.
    pub async fn run(&mut self, bbox: &TileBounds) -> Result<RegionOutcome, PipelineError> {
        self.run_cancellable(bbox, &CancellationToken::new()).await
    }

    /// Runs the full pipeline for one bounding box with cooperative
    /// cancellation.
    ///
    /// # Errors
    ///
    /// Fatal errors only; per-tile losses surface in the outcome's
    /// [`FailureReport`] instead. A cancelled run returns
    /// `PipelineError::Cancelled` naming the stage it was interrupted in
    /// and leaves no descriptor behind.
    #[instrument(skip(self, bbox, cancel), fields(bbox = %bbox))]
    pub async fn run_cancellable(
        &mut self,
        bbox: &TileBounds,
        cancel: &CancellationToken,
    ) -> Result<RegionOutcome, PipelineError> {
        info!("mosaic run starting");

        // Validate before any network traffic happens.
        coverage::validate_bbox(bbox)?;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled(Stage::Inventory));
        }

        if self.inventory.is_none() {
            self.inventory = Some(self.fetcher.load_inventory().await?);
        }
        let inventory = self.inventory.as_ref().expect("inventory just loaded");

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled(Stage::Coverage));
        }

        let resolved = coverage::resolve(bbox, inventory)?;
        if resolved.is_empty() {
            return Err(PipelineError::NoTilesFound(*bbox));
        }
        info!(tiles = resolved.len(), "coverage resolved");

        let (fetched, fetch_failed) = self.fetcher.fetch_all(&resolved, cancel).await;
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled(Stage::Fetch));
        }
        if !fetch_failed.is_empty() {
            warn!(
                failed = fetch_failed.len(),
                "continuing without unfetchable tiles"
            );
        }

        let fetched_ids: Vec<TileId> = fetched.keys().cloned().collect();

        let (stacked, stack_failed) = self.stacker.stack_all(&fetched, cancel).await;
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled(Stage::Stack));
        }

        let (descriptor, mosaic) = self.builder.build(&stacked)?;
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled(Stage::Mosaic));
        }
        let descriptor_path = self.builder.write(&descriptor)?;

        let outcome = RegionOutcome {
            bbox: *bbox,
            resolved,
            fetched: fetched_ids,
            mosaic,
            failures: FailureReport {
                fetch_failed,
                stack_failed,
            },
            descriptor_path,
            band_labels: RegionOutcome::band_labels(),
        };
        self.write_summary(&outcome)?;

        info!(
            tiles = outcome.mosaic.tile_ids.len(),
            dropped = outcome.failures.total(),
            telemetry = %self.metrics.snapshot(),
            "mosaic run complete"
        );
        Ok(outcome)
    }

    /// Processes named region collections as one batch.
    ///
    /// Regions fail independently: a fatal error in one is recorded in the
    /// batch outcome and the next region still runs. Each successful
    /// region's descriptor is copied to
    /// `<output_folder>/<collection>/<region>.vrt`.
    pub async fn run_collections(
        &mut self,
        collections: &[RegionCollection],
        cancel: &CancellationToken,
    ) -> Result<BatchOutcome, PipelineError> {
        let mut batch = BatchOutcome::default();

        for collection in collections {
            let collection_dir = self.config.output_folder.join(&collection.name);

            for region in &collection.regions {
                info!(
                    collection = %collection.name,
                    region = %region.name,
                    bbox = %region.bbox,
                    "processing region"
                );

                let result = match self.run_cancellable(&region.bbox, cancel).await {
                    Ok(outcome) => {
                        match copy_descriptor(&collection_dir, &region.name, &outcome.descriptor_path)
                        {
                            Ok(copy) => BatchRegionResult::Built {
                                outcome,
                                descriptor_copy: copy,
                            },
                            // A copy failure is as per-region as a pipeline
                            // failure; the remaining regions still run.
                            Err(e) => {
                                warn!(
                                    collection = %collection.name,
                                    region = %region.name,
                                    error = %e,
                                    "descriptor copy failed, continuing batch"
                                );
                                BatchRegionResult::Failed {
                                    error: e.to_string(),
                                }
                            }
                        }
                    }
                    Err(PipelineError::Cancelled(stage)) => {
                        // Cancellation is batch-wide, not a per-region failure.
                        return Err(PipelineError::Cancelled(stage));
                    }
                    Err(e) => {
                        warn!(
                            collection = %collection.name,
                            region = %region.name,
                            error = %e,
                            "region failed, continuing batch"
                        );
                        BatchRegionResult::Failed {
                            error: e.to_string(),
                        }
                    }
                };

                batch.regions.push(BatchRegionOutcome {
                    collection: collection.name.clone(),
                    region: region.name.clone(),
                    result,
                });
            }
        }

        info!(
            built = batch.built(),
            failed = batch.failed(),
            "batch complete"
        );
        Ok(batch)
    }

    /// Writes the run's JSON summary next to its descriptor.
    fn write_summary(&self, outcome: &RegionOutcome) -> Result<(), PipelineError> {
        let path = outcome.descriptor_path.with_extension("json");
        let json = serde_json::to_string_pretty(outcome).map_err(std::io::Error::other)?;
        fs::write(&path, json)?;
        Ok(())
    }
}

/// Copies a region's descriptor into its collection folder, creating the
/// folder on first use.
fn copy_descriptor(
    collection_dir: &Path,
    region_name: &str,
    descriptor: &Path,
) -> std::io::Result<PathBuf> {
    fs::create_dir_all(collection_dir)?;
    let copy = collection_dir.join(format!("{}.vrt", region_name));
    fs::copy(descriptor, &copy)?;
    Ok(copy)
}
