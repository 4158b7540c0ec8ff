//! Tile artifact fetching and caching.
//!
//! The fetcher owns two responsibilities:
//!
//! - **Inventory**: download each layer's reference list and union them into
//!   one map of available tiles. A missing list is fatal; a partial
//!   inventory would silently under-report coverage.
//! - **Artifacts**: download per-tile per-layer rasters into the local data
//!   folder. The folder doubles as the cache: an existing file is reused
//!   without any network call. Individual failures are tolerated, logged,
//!   and accumulated; they never abort the batch.
//!
//! Batch downloads run in a bounded worker pool (`Semaphore` + `JoinSet`).
//! The exists→skip check is racy between workers in principle, but both
//! would download identical bytes and files only become visible after a
//! complete write and rename, so the last writer wins without corruption.

mod http;
mod inventory;

pub use http::{AsyncHttpClient, HttpError, ReqwestClient};
pub use inventory::parse_reference_list;

#[cfg(test)]
pub use http::tests::MockHttpClient;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::SessionConfig;
use crate::grid::{TileBounds, TileId};
use crate::layer::Layer;
use crate::telemetry::PipelineMetrics;

/// Layer name → local artifact path for one tile. May be partial; only
/// tiles with all three layers are stackable downstream.
pub type LayerPaths = BTreeMap<Layer, PathBuf>;

/// Fatal fetch errors. Per-tile and per-layer failures are not errors;
/// they are reported through the batch result instead.
#[derive(Debug, Error)]
pub enum FetchError {
    /// A layer's reference list could not be retrieved.
    #[error("failed to fetch reference list for layer {layer}: {source}")]
    InventoryFetch { layer: Layer, source: HttpError },
}

/// Downloads and caches tile artifacts.
///
/// Cloning is cheap; clones share the HTTP client and metrics and are used
/// to move the fetcher into batch worker tasks.
pub struct TileFetcher<C: AsyncHttpClient> {
    config: SessionConfig,
    client: Arc<C>,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl<C: AsyncHttpClient> Clone for TileFetcher<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            client: Arc::clone(&self.client),
            metrics: self.metrics.clone(),
        }
    }
}

impl<C: AsyncHttpClient + 'static> TileFetcher<C> {
    /// Creates a fetcher over the given HTTP client.
    pub fn new(config: SessionConfig, client: Arc<C>) -> Self {
        Self {
            config,
            client,
            metrics: None,
        }
    }

    /// Attaches a metrics collector.
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Downloads every layer's reference list and unions them into one
    /// inventory of available tiles.
    ///
    /// Duplicate ids across layers keep the first-computed bounds, which
    /// are identical anyway since bounds derive purely from the id.
    ///
    /// # Errors
    ///
    /// `FetchError::InventoryFetch` as soon as any list is unreachable.
    pub async fn load_inventory(&self) -> Result<BTreeMap<TileId, TileBounds>, FetchError> {
        let mut all_tiles = BTreeMap::new();

        for layer in Layer::ALL {
            let url = self.config.reference_list_url(layer);
            debug!(%layer, url, "downloading reference list");

            let body = self
                .client
                .get(&url)
                .await
                .map_err(|source| FetchError::InventoryFetch { layer, source })?;

            let text = String::from_utf8_lossy(&body);
            let tiles = parse_reference_list(&text);
            info!(%layer, tiles = tiles.len(), "downloaded reference list");

            for (id, bounds) in tiles {
                all_tiles.entry(id).or_insert(bounds);
            }
        }

        info!(total = all_tiles.len(), "tile inventory assembled");
        Ok(all_tiles)
    }

    /// Fetches all layers for one tile, reusing cached files.
    ///
    /// Returns whatever layers ended up available locally; a failed layer is
    /// logged and omitted, never propagated. The result may therefore hold
    /// zero to three entries.
    pub async fn fetch_tile(&self, id: &TileId) -> LayerPaths {
        let mut layers = LayerPaths::new();

        for layer in Layer::ALL {
            match self.fetch_layer(id, layer).await {
                Some(path) => {
                    layers.insert(layer, path);
                }
                None => {
                    warn!(tile = %id, %layer, "layer unavailable, omitting");
                }
            }
        }

        layers
    }

    /// Fetches a single layer artifact, or returns `None` on any failure.
    async fn fetch_layer(&self, id: &TileId, layer: Layer) -> Option<PathBuf> {
        let path = self.config.artifact_path(id, layer);

        // Cache hit: presence of the file is the cache key.
        if path.exists() {
            debug!(tile = %id, %layer, path = %path.display(), "artifact cached");
            if let Some(m) = &self.metrics {
                m.cache_hit();
            }
            return Some(path);
        }

        let url = self.config.artifact_url(id, layer);
        debug!(tile = %id, %layer, url, "downloading artifact");

        let body = match self.client.get(&url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(tile = %id, %layer, error = %e, "artifact download failed");
                if let Some(m) = &self.metrics {
                    m.layer_failed();
                }
                return None;
            }
        };

        match write_artifact(&path, &body).await {
            Ok(()) => {
                debug!(tile = %id, %layer, bytes = body.len(), "artifact downloaded");
                if let Some(m) = &self.metrics {
                    m.layer_downloaded(body.len() as u64);
                }
                Some(path)
            }
            Err(e) => {
                warn!(tile = %id, %layer, error = %e, "artifact write failed");
                if let Some(m) = &self.metrics {
                    m.layer_failed();
                }
                None
            }
        }
    }

    /// Fetches a batch of tiles with bounded concurrency.
    ///
    /// Returns the per-tile layer maps and the ids that failed outright.
    /// A tile counts as failed only when it ends up with zero usable
    /// layers; tiles with some-but-not-all layers are still returned and
    /// left for the stacker to reject.
    ///
    /// Cancellation stops issuing new fetches and classifies every tile
    /// that did not complete as failed.
    #[instrument(skip(self, ids, cancel), fields(tiles = ids.len()))]
    pub async fn fetch_all(
        &self,
        ids: &[TileId],
        cancel: &CancellationToken,
    ) -> (BTreeMap<TileId, LayerPaths>, Vec<TileId>) {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_fetches.max(1)));
        let failed = Arc::new(Mutex::new(Vec::new()));
        let mut workers = JoinSet::new();

        for id in ids {
            if cancel.is_cancelled() {
                failed.lock().push(id.clone());
                continue;
            }

            let fetcher = self.clone();
            let id = id.clone();
            let semaphore = Arc::clone(&semaphore);
            let failed = Arc::clone(&failed);
            let cancel = cancel.clone();

            workers.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore never closed");

                if cancel.is_cancelled() {
                    failed.lock().push(id);
                    return None;
                }

                let layers = fetcher.fetch_tile(&id).await;
                if layers.is_empty() {
                    failed.lock().push(id);
                    None
                } else {
                    Some((id, layers))
                }
            });
        }

        let mut fetched = BTreeMap::new();
        while let Some(result) = workers.join_next().await {
            match result {
                Ok(Some((id, layers))) => {
                    if let Some(m) = &self.metrics {
                        m.tile_fetched();
                    }
                    fetched.insert(id, layers);
                }
                Ok(None) => {
                    if let Some(m) = &self.metrics {
                        m.tile_failed();
                    }
                }
                Err(join_err) => {
                    // A panicked worker loses its tile; the id was already
                    // recorded only if the task got far enough, so surface
                    // the panic loudly.
                    warn!(error = %join_err, "fetch worker panicked");
                }
            }
        }

        let mut failed_ids = failed.lock().clone();
        failed_ids.sort();

        info!(
            fetched = fetched.len(),
            failed = failed_ids.len(),
            "batch fetch complete"
        );
        (fetched, failed_ids)
    }
}

/// Writes an artifact atomically: parent dir, temp file, fsync, rename.
///
/// A file only becomes visible at its final path after a complete write, so
/// the exists→skip cache check can never observe a torn artifact. On error
/// the temp file is removed.
async fn write_artifact(path: &PathBuf, body: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension("part");
    let result = async {
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}
