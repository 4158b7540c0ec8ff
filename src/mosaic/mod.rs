//! Virtual-mosaic descriptor construction.
//!
//! The builder reduces a set of stacked tiles to a [`MosaicDescriptor`]:
//! the union extent, a pixel grid derived from one reference tile, and for
//! each of the three fixed bands an id-sorted list of source windows into
//! the stacked files. The descriptor owns no pixel data; the stacked tiles
//! must outlive any descriptor that references them.
//!
//! Two behaviors are carried over from the source dataset tooling on
//! purpose, because changing them would change observable mosaic
//! dimensions:
//!
//! - all tiles are assumed to share the reference tile's CRS and pixel
//!   size; this is not verified,
//! - mosaic width/height truncate (never round) the extent divided by the
//!   pixel size, while per-tile destination offsets round.

mod vrt;

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::Local;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::grid::{TileBounds, TileId};
use crate::layer::Layer;
use crate::report::MosaicSummary;
use crate::stack::StackedTile;

/// Errors from mosaic construction.
#[derive(Debug, Error)]
pub enum MosaicError {
    /// No stacked tiles survived to the build stage.
    #[error("no stacked tiles to build a mosaic from")]
    Empty,

    /// Writing the descriptor artifact failed.
    #[error("failed to write mosaic descriptor: {0}")]
    Io(#[from] std::io::Error),
}

/// A rectangular pixel window within a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelWindow {
    pub x_off: u32,
    pub y_off: u32,
    pub x_size: u32,
    pub y_size: u32,
}

/// One stacked tile's contribution to one mosaic band.
#[derive(Debug, Clone, Serialize)]
pub struct BandSource {
    pub tile_id: TileId,
    pub path: PathBuf,
    /// One-based band index in the stacked source file.
    pub band: usize,
    /// Window read from the source: always the tile's full extent.
    pub src_window: PixelWindow,
    /// Window written into the mosaic pixel grid.
    pub dst_window: PixelWindow,
}

/// One mosaic band: a layer plus its id-sorted source list.
#[derive(Debug, Clone, Serialize)]
pub struct MosaicBand {
    pub layer: Layer,
    pub sources: Vec<BandSource>,
}

/// Lazy index over stacked tiles: extent, pixel grid, and per-band source
/// windows. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct MosaicDescriptor {
    pub bounds: TileBounds,
    pub pixel_width: f64,
    /// Signed y pixel size; negative for north-up mosaics.
    pub pixel_height: f64,
    pub width: u32,
    pub height: u32,
    pub crs: String,
    pub bands: Vec<MosaicBand>,
}

impl MosaicDescriptor {
    /// Ids of the tiles this descriptor references, in canonical order.
    pub fn tile_ids(&self) -> Vec<TileId> {
        // Every band references the same tiles; read them off the first.
        self.bands
            .first()
            .map(|band| band.sources.iter().map(|s| s.tile_id.clone()).collect())
            .unwrap_or_default()
    }
}

/// Builds mosaic descriptors and serializes them to disk.
#[derive(Debug, Clone)]
pub struct MosaicIndexBuilder {
    output_folder: PathBuf,
}

impl MosaicIndexBuilder {
    /// Creates a builder writing descriptors under `output_folder`.
    pub fn new(output_folder: impl Into<PathBuf>) -> Self {
        Self {
            output_folder: output_folder.into(),
        }
    }

    /// Computes the mosaic descriptor and its summary from stacked tiles.
    ///
    /// Iteration is id-sorted throughout, so the same input set always
    /// produces an identical descriptor. The reference tile for pixel size
    /// and CRS is the lexicographically first id.
    ///
    /// # Errors
    ///
    /// `MosaicError::Empty` when `stacked` has no entries.
    pub fn build(
        &self,
        stacked: &BTreeMap<TileId, StackedTile>,
    ) -> Result<(MosaicDescriptor, MosaicSummary), MosaicError> {
        let reference = stacked.values().next().ok_or(MosaicError::Empty)?;

        let bounds = stacked
            .values()
            .map(|tile| tile.bounds)
            .reduce(|acc, b| acc.union(&b))
            .expect("stacked is non-empty");

        // Uniform-resolution assumption: every tile is presumed to share
        // the reference tile's pixel size and CRS.
        let pixel_width = reference.meta.transform.pixel_width();
        let pixel_height = reference.meta.transform.pixel_height();
        let crs = reference.meta.crs.clone();

        // Truncation, not rounding.
        let width = (bounds.width() / pixel_width) as u32;
        let height = (bounds.height() / pixel_height.abs()) as u32;

        debug!(
            %bounds,
            width,
            height,
            pixel_width,
            pixel_height,
            "computed mosaic pixel grid"
        );

        let bands = Layer::ALL
            .iter()
            .map(|&layer| MosaicBand {
                layer,
                sources: stacked
                    .values()
                    .map(|tile| band_source(tile, layer, &bounds, pixel_width, pixel_height))
                    .collect(),
            })
            .collect();

        let descriptor = MosaicDescriptor {
            bounds,
            pixel_width,
            pixel_height,
            width,
            height,
            crs: crs.clone(),
            bands,
        };

        let summary = MosaicSummary {
            tile_ids: stacked.keys().cloned().collect(),
            width,
            height,
            crs,
        };

        Ok((descriptor, summary))
    }

    /// Serializes the descriptor to a timestamped VRT file and returns its
    /// path. The artifact is an index only; it stays small regardless of
    /// mosaic size.
    pub fn write(&self, descriptor: &MosaicDescriptor) -> Result<PathBuf, MosaicError> {
        fs::create_dir_all(&self.output_folder)?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = self.output_folder.join(format!("mosaic_{}.vrt", timestamp));
        fs::write(&path, vrt::render(descriptor))?;

        info!(
            path = %path.display(),
            width = descriptor.width,
            height = descriptor.height,
            tiles = descriptor.tile_ids().len(),
            "wrote mosaic descriptor"
        );
        Ok(path)
    }
}

/// Computes one tile's source entry for one band.
///
/// The source window is the tile's full pixel extent; the destination
/// offset places the tile's top-left corner on the mosaic grid, rounding
/// to the nearest pixel.
fn band_source(
    tile: &StackedTile,
    layer: Layer,
    overall: &TileBounds,
    pixel_width: f64,
    pixel_height: f64,
) -> BandSource {
    let dst_x = ((tile.bounds.minx - overall.minx) / pixel_width).round() as u32;
    let dst_y = ((overall.maxy - tile.bounds.maxy) / pixel_height.abs()).round() as u32;

    let full = PixelWindow {
        x_off: 0,
        y_off: 0,
        x_size: tile.meta.width,
        y_size: tile.meta.height,
    };

    BandSource {
        tile_id: tile.id.clone(),
        path: tile.path.clone(),
        band: layer.band_index(),
        src_window: full,
        dst_window: PixelWindow {
            x_off: dst_x,
            y_off: dst_y,
            x_size: tile.meta.width,
            y_size: tile.meta.height,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{GeoTransform, RasterMeta};
    use tempfile::tempdir;

    /// Stacked-tile stand-in with 0.1° pixels (100×100 per 10° tile).
    fn stacked_tile(id: &str) -> StackedTile {
        stacked_tile_with_pixel(id, 0.1)
    }

    fn stacked_tile_with_pixel(id: &str, pixel: f64) -> StackedTile {
        let id = TileId::parse(id).unwrap();
        let bounds = id.bounds();
        let size = (crate::grid::TILE_SIZE_DEG / pixel) as u32;
        let meta = RasterMeta {
            transform: GeoTransform::north_up(bounds.minx, bounds.maxy, pixel, pixel),
            crs: "EPSG:4326".to_string(),
            width: size,
            height: size,
        };
        StackedTile {
            path: PathBuf::from(format!("/data/stacked_{}.rst", id)),
            bounds: meta.bounds(),
            id,
            meta,
        }
    }

    fn stacked_map(ids: &[&str]) -> BTreeMap<TileId, StackedTile> {
        ids.iter()
            .map(|id| {
                let tile = stacked_tile(id);
                (tile.id.clone(), tile)
            })
            .collect()
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let builder = MosaicIndexBuilder::new("/tmp/out");
        assert!(matches!(
            builder.build(&BTreeMap::new()),
            Err(MosaicError::Empty)
        ));
    }

    #[test]
    fn test_single_tile_grid_matches_tile() {
        let builder = MosaicIndexBuilder::new("/tmp/out");
        let (descriptor, summary) = builder.build(&stacked_map(&["00N_000E"])).unwrap();

        assert_eq!(descriptor.width, 100);
        assert_eq!(descriptor.height, 100);
        assert_eq!(descriptor.bounds, TileBounds::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(summary.crs, "EPSG:4326");

        for band in &descriptor.bands {
            assert_eq!(band.sources.len(), 1);
            let window = band.sources[0].dst_window;
            assert_eq!((window.x_off, window.y_off), (0, 0));
        }
    }

    #[test]
    fn test_adjacent_tiles_widths_add() {
        // Two 100px tiles side by side along longitude: 200px wide, 100px tall.
        let builder = MosaicIndexBuilder::new("/tmp/out");
        let (descriptor, _) = builder
            .build(&stacked_map(&["00N_000E", "00N_010E"]))
            .unwrap();

        assert_eq!(descriptor.width, 200);
        assert_eq!(descriptor.height, 100);

        let band = &descriptor.bands[0];
        assert_eq!(band.sources[0].dst_window.x_off, 0);
        assert_eq!(band.sources[1].dst_window.x_off, 100);
        assert_eq!(band.sources[1].dst_window.y_off, 0);
    }

    #[test]
    fn test_vertical_offset_measured_from_top() {
        let builder = MosaicIndexBuilder::new("/tmp/out");
        let (descriptor, _) = builder
            .build(&stacked_map(&["00N_000E", "10N_000E"]))
            .unwrap();

        // 10N_000E is the upper tile: y offset 0; 00N_000E sits below it.
        let band = &descriptor.bands[0];
        let by_id: BTreeMap<&str, u32> = band
            .sources
            .iter()
            .map(|s| (s.tile_id.as_str(), s.dst_window.y_off))
            .collect();
        assert_eq!(by_id["10N_000E"], 0);
        assert_eq!(by_id["00N_000E"], 100);
    }

    #[test]
    fn test_band_entries_are_id_sorted_and_fixed_order() {
        let builder = MosaicIndexBuilder::new("/tmp/out");
        let (descriptor, _) = builder
            .build(&stacked_map(&["10N_010E", "00N_000E", "00N_010E"]))
            .unwrap();

        assert_eq!(descriptor.bands.len(), 3);
        for (i, layer) in Layer::ALL.iter().enumerate() {
            let band = &descriptor.bands[i];
            assert_eq!(band.layer, *layer);
            let ids: Vec<&str> = band.sources.iter().map(|s| s.tile_id.as_str()).collect();
            assert_eq!(ids, ["00N_000E", "00N_010E", "10N_010E"]);
            assert!(band.sources.iter().all(|s| s.band == layer.band_index()));
        }
    }

    #[test]
    fn test_dimensions_truncate_not_round() {
        // 0.3° pixels over a 10° tile: 10/0.3 = 33.33… → 33, not 34.
        let tile = stacked_tile_with_pixel("00N_000E", 0.3);
        let mut stacked = BTreeMap::new();
        stacked.insert(tile.id.clone(), tile);

        let builder = MosaicIndexBuilder::new("/tmp/out");
        let (descriptor, _) = builder.build(&stacked).unwrap();
        assert_eq!(descriptor.width, 33);
        assert_eq!(descriptor.height, 33);
    }

    #[test]
    fn test_descriptor_is_deterministic() {
        let builder = MosaicIndexBuilder::new("/tmp/out");
        let stacked = stacked_map(&["00N_000E", "10N_010E"]);

        let (a, _) = builder.build(&stacked).unwrap();
        let (b, _) = builder.build(&stacked).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_write_emits_small_timestamped_vrt() {
        let dir = tempdir().unwrap();
        let builder = MosaicIndexBuilder::new(dir.path());
        let (descriptor, _) = builder.build(&stacked_map(&["00N_000E"])).unwrap();

        let path = builder.write(&descriptor).unwrap();
        assert!(path.exists());

        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("mosaic_") && name.ends_with(".vrt"));

        // Index artifact must stay small: no pixel data inside.
        let len = std::fs::metadata(&path).unwrap().len();
        assert!(len < 16 * 1024, "descriptor unexpectedly large: {} bytes", len);
    }

    #[test]
    fn test_summary_lists_all_tiles() {
        let builder = MosaicIndexBuilder::new("/tmp/out");
        let (_, summary) = builder
            .build(&stacked_map(&["00N_000E", "00N_010E"]))
            .unwrap();

        let ids: Vec<&str> = summary.tile_ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, ["00N_000E", "00N_010E"]);
        assert_eq!((summary.width, summary.height), (200, 100));
    }
}
