//! Per-tile band stacking.
//!
//! A tile becomes stackable once all three layer artifacts exist locally.
//! The stacker reads each layer's single band, takes the first layer's
//! georeferencing metadata as the template, and writes one composite with
//! the bands in fixed [`Layer::ALL`] order. Raw layer files are left
//! untouched; composites land at `<data_folder>/stacked_<id>.<ext>`.
//!
//! Stacking is per-tile all-or-nothing and failure-tolerant: a tile with
//! missing layers or a failed read/write is dropped (logged, recorded),
//! never an error for the batch.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::SessionConfig;
use crate::fetch::LayerPaths;
use crate::grid::{TileBounds, TileId};
use crate::layer::Layer;
use crate::raster::{RasterIo, RasterMeta};
use crate::telemetry::PipelineMetrics;

/// One on-disk composite raster combining a tile's three layers.
///
/// Carries the georeferencing of the template layer; `bounds` is derived
/// from it once at stack time. The file must outlive any mosaic descriptor
/// that references it.
#[derive(Debug, Clone, Serialize)]
pub struct StackedTile {
    pub id: TileId,
    pub path: PathBuf,
    pub meta: RasterMeta,
    pub bounds: TileBounds,
}

/// Stacks fetched layer artifacts into composite tiles.
pub struct BandStacker {
    config: SessionConfig,
    io: Arc<dyn RasterIo>,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl Clone for BandStacker {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            io: Arc::clone(&self.io),
            metrics: self.metrics.clone(),
        }
    }
}

impl BandStacker {
    /// Creates a stacker writing through the given raster backend.
    pub fn new(config: SessionConfig, io: Arc<dyn RasterIo>) -> Self {
        Self {
            config,
            io,
            metrics: None,
        }
    }

    /// Attaches a metrics collector.
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Stacks one tile's layers into a composite.
    ///
    /// Returns `None` when the tile has to be dropped: a required layer is
    /// missing from `layers`, or any read/write fails. Band order in the
    /// output is always [`Layer::ALL`], independent of how `layers` was
    /// assembled.
    pub fn stack(&self, id: &TileId, layers: &LayerPaths) -> Option<StackedTile> {
        let missing: Vec<Layer> = Layer::ALL
            .iter()
            .copied()
            .filter(|layer| !layers.contains_key(layer))
            .collect();
        if !missing.is_empty() {
            debug!(tile = %id, ?missing, "tile missing layers, skipping stack");
            return None;
        }

        let mut template: Option<RasterMeta> = None;
        let mut bands: Vec<Vec<u8>> = Vec::with_capacity(Layer::ALL.len());

        for layer in Layer::ALL {
            let path = &layers[&layer];
            match self.io.read_band(path, 0) {
                Ok((meta, band)) => {
                    // The first successfully opened layer provides the
                    // georeferencing template for the composite.
                    if template.is_none() {
                        template = Some(meta);
                    }
                    bands.push(band);
                }
                Err(e) => {
                    warn!(tile = %id, %layer, error = %e, "failed to read layer, dropping tile");
                    return None;
                }
            }
        }

        let meta = template.expect("at least one layer was read");
        let path = self.config.stacked_path(id, self.io.stacked_extension());

        if let Err(e) = self.io.write_stacked(&path, &meta, &bands) {
            warn!(tile = %id, error = %e, "failed to write stacked tile, dropping");
            return None;
        }

        let bounds = meta.bounds();
        debug!(tile = %id, path = %path.display(), "stacked tile written");

        Some(StackedTile {
            id: id.clone(),
            path,
            meta,
            bounds,
        })
    }

    /// Stacks a batch of fetched tiles on blocking workers.
    ///
    /// Returns the surviving composites and the sorted ids that were
    /// dropped. Cancellation stops scheduling new tiles and counts the
    /// remainder as failed.
    #[instrument(skip(self, fetched, cancel), fields(tiles = fetched.len()))]
    pub async fn stack_all(
        &self,
        fetched: &BTreeMap<TileId, LayerPaths>,
        cancel: &CancellationToken,
    ) -> (BTreeMap<TileId, StackedTile>, Vec<TileId>) {
        let failed = Arc::new(Mutex::new(Vec::new()));
        let mut workers = JoinSet::new();

        for (id, layers) in fetched {
            if cancel.is_cancelled() {
                failed.lock().push(id.clone());
                continue;
            }

            let stacker = self.clone();
            let id = id.clone();
            let layers = layers.clone();
            let failed = Arc::clone(&failed);
            let cancel = cancel.clone();

            workers.spawn_blocking(move || {
                if cancel.is_cancelled() {
                    failed.lock().push(id);
                    return None;
                }
                match stacker.stack(&id, &layers) {
                    Some(stacked) => Some((id, stacked)),
                    None => {
                        failed.lock().push(id);
                        None
                    }
                }
            });
        }

        let mut stacked = BTreeMap::new();
        while let Some(result) = workers.join_next().await {
            match result {
                Ok(Some((id, tile))) => {
                    if let Some(m) = &self.metrics {
                        m.tile_stacked();
                    }
                    stacked.insert(id, tile);
                }
                Ok(None) => {
                    if let Some(m) = &self.metrics {
                        m.stack_failed();
                    }
                }
                Err(join_err) => {
                    warn!(error = %join_err, "stack worker panicked");
                }
            }
        }

        let mut failed_ids = failed.lock().clone();
        failed_ids.sort();

        info!(
            stacked = stacked.len(),
            failed = failed_ids.len(),
            "batch stacking complete"
        );
        (stacked, failed_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{FlatRasterIo, GeoTransform};
    use std::fs;
    use tempfile::tempdir;

    fn tile_meta(bounds: TileBounds) -> RasterMeta {
        RasterMeta {
            transform: GeoTransform::north_up(bounds.minx, bounds.maxy, 0.1, 0.1),
            crs: "EPSG:4326".to_string(),
            width: 100,
            height: 100,
        }
    }

    /// Writes one layer artifact filled with a constant value and returns
    /// its path.
    fn write_layer(
        config: &SessionConfig,
        id: &TileId,
        layer: Layer,
        value: u8,
    ) -> std::path::PathBuf {
        let meta = tile_meta(id.bounds());
        let band = vec![value; (meta.width * meta.height) as usize];
        let bytes = FlatRasterIo::encode_single(&meta, &band).unwrap();

        let path = config.artifact_path(id, layer);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, bytes).unwrap();
        path
    }

    fn stacker(dir: &std::path::Path) -> (BandStacker, SessionConfig) {
        let config = SessionConfig::new(dir, dir.join("out"));
        (
            BandStacker::new(config.clone(), Arc::new(FlatRasterIo)),
            config,
        )
    }

    fn full_layer_set(config: &SessionConfig, id: &TileId) -> LayerPaths {
        let mut layers = LayerPaths::new();
        // Distinct fill values per layer so band order is observable.
        layers.insert(
            Layer::DataMask,
            write_layer(config, id, Layer::DataMask, 3),
        );
        layers.insert(
            Layer::TreeCover2000,
            write_layer(config, id, Layer::TreeCover2000, 1),
        );
        layers.insert(Layer::LossYear, write_layer(config, id, Layer::LossYear, 2));
        layers
    }

    #[test]
    fn test_stack_produces_fixed_band_order() {
        let dir = tempdir().unwrap();
        let (stacker, config) = stacker(dir.path());
        let id = TileId::parse("00N_000E").unwrap();
        let layers = full_layer_set(&config, &id);

        let stacked = stacker.stack(&id, &layers).expect("tile should stack");
        assert!(stacked.path.exists());

        // Band 1 = treecover2000 (1), band 2 = lossyear (2), band 3 = datamask (3).
        for (index, value) in [(0usize, 1u8), (1, 2), (2, 3)] {
            let (_, band) = FlatRasterIo.read_band(&stacked.path, index).unwrap();
            assert!(band.iter().all(|&v| v == value), "band {} wrong", index + 1);
        }
    }

    #[test]
    fn test_stack_carries_template_georeferencing() {
        let dir = tempdir().unwrap();
        let (stacker, config) = stacker(dir.path());
        let id = TileId::parse("10N_010E").unwrap();
        let layers = full_layer_set(&config, &id);

        let stacked = stacker.stack(&id, &layers).unwrap();
        assert_eq!(stacked.bounds, id.bounds());
        assert_eq!(stacked.meta.crs, "EPSG:4326");
        assert_eq!(stacked.meta.width, 100);
    }

    #[test]
    fn test_missing_layer_drops_tile() {
        let dir = tempdir().unwrap();
        let (stacker, config) = stacker(dir.path());
        let id = TileId::parse("00N_000E").unwrap();

        let mut layers = full_layer_set(&config, &id);
        layers.remove(&Layer::DataMask);

        assert!(stacker.stack(&id, &layers).is_none());
        assert!(!config.stacked_path(&id, "rst").exists());
    }

    #[test]
    fn test_unreadable_layer_drops_tile() {
        let dir = tempdir().unwrap();
        let (stacker, config) = stacker(dir.path());
        let id = TileId::parse("00N_000E").unwrap();

        let layers = full_layer_set(&config, &id);
        // Corrupt one layer on disk.
        fs::write(&layers[&Layer::LossYear], b"corrupt").unwrap();

        assert!(stacker.stack(&id, &layers).is_none());
    }

    #[test]
    fn test_raw_layer_files_left_untouched() {
        let dir = tempdir().unwrap();
        let (stacker, config) = stacker(dir.path());
        let id = TileId::parse("00N_000E").unwrap();
        let layers = full_layer_set(&config, &id);

        stacker.stack(&id, &layers).unwrap();
        for path in layers.values() {
            assert!(path.exists(), "raw layer must survive stacking");
        }
    }

    #[tokio::test]
    async fn test_stack_all_drops_partial_tiles_and_reports_them() {
        let dir = tempdir().unwrap();
        let (stacker, config) = stacker(dir.path());

        let good = TileId::parse("00N_000E").unwrap();
        let partial = TileId::parse("10N_000E").unwrap();

        let mut fetched = BTreeMap::new();
        fetched.insert(good.clone(), full_layer_set(&config, &good));
        let mut partial_layers = full_layer_set(&config, &partial);
        partial_layers.remove(&Layer::TreeCover2000);
        fetched.insert(partial.clone(), partial_layers);

        let cancel = CancellationToken::new();
        let (stacked, failed) = stacker.stack_all(&fetched, &cancel).await;

        assert_eq!(stacked.len(), 1);
        assert!(stacked.contains_key(&good));
        assert_eq!(failed, vec![partial]);
    }

    #[tokio::test]
    async fn test_stack_all_cancelled_reports_all_failed() {
        let dir = tempdir().unwrap();
        let (stacker, config) = stacker(dir.path());
        let id = TileId::parse("00N_000E").unwrap();

        let mut fetched = BTreeMap::new();
        fetched.insert(id.clone(), full_layer_set(&config, &id));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let (stacked, failed) = stacker.stack_all(&fetched, &cancel).await;
        assert!(stacked.is_empty());
        assert_eq!(failed, vec![id]);
    }
}
