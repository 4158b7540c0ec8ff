//! Raster metadata types and the raster I/O seam.
//!
//! The mosaic engine never interprets pixel encodings itself; it only needs
//! georeferencing metadata and the ability to move single bands in and out
//! of files. Both are behind the [`RasterIo`] trait so the format backend is
//! swappable: production deployments plug in a GeoTIFF-capable
//! implementation, while [`FlatRasterIo`] ships with the crate as a simple
//! self-describing codec that the test suite (and any consumer without a
//! GDAL stack) can use end to end.

mod flat;

pub use flat::FlatRasterIo;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::TileBounds;

/// Errors from raster I/O backends.
#[derive(Debug, Error)]
pub enum RasterError {
    /// Underlying file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file exists but could not be decoded by this backend.
    #[error("failed to decode raster {path}: {reason}")]
    Decode { path: String, reason: String },

    /// The requested band index does not exist in the file.
    #[error("band {band} out of range for raster {path} ({count} bands)")]
    BandOutOfRange {
        path: String,
        band: usize,
        count: usize,
    },

    /// Band data does not match the metadata dimensions.
    #[error("band size mismatch: expected {expected} pixels, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Affine georeferencing transform in rasterio order.
///
/// `a` is the x pixel size, `e` the (negative) y pixel size, `c`/`f` the
/// coordinates of the top-left corner. `b` and `d` are shear terms, always
/// zero for north-up degree-grid tiles but carried for fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    /// North-up transform with origin at (`minx`, `maxy`) and the given
    /// pixel sizes (`pixel_height` positive).
    pub fn north_up(minx: f64, maxy: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            a: pixel_width,
            b: 0.0,
            c: minx,
            d: 0.0,
            e: -pixel_height,
            f: maxy,
        }
    }

    /// X pixel size in CRS units.
    pub fn pixel_width(&self) -> f64 {
        self.a
    }

    /// Y pixel size in CRS units (signed; negative for north-up rasters).
    pub fn pixel_height(&self) -> f64 {
        self.e
    }
}

/// Georeferencing metadata carried by every raster artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterMeta {
    pub transform: GeoTransform,
    /// CRS identifier string, e.g. `"EPSG:4326"`.
    pub crs: String,
    /// Raster width in pixels.
    pub width: u32,
    /// Raster height in pixels.
    pub height: u32,
}

impl RasterMeta {
    /// Geographic bounds covered by the pixel grid.
    ///
    /// Mirrors rasterio's `array_bounds`: the transform places the top-left
    /// corner, width/height extend it right and down.
    pub fn bounds(&self) -> TileBounds {
        let minx = self.transform.c;
        let maxy = self.transform.f;
        let maxx = minx + self.transform.a * self.width as f64;
        let miny = maxy + self.transform.e * self.height as f64;
        TileBounds::new(minx, miny, maxx, maxy)
    }
}

/// Format backend for reading layer bands and writing stacked composites.
///
/// Implementations must be cheap to share (`Send + Sync`); the stacker calls
/// them from blocking worker tasks. All methods are synchronous: raster I/O
/// here is bulk file work, not something to interleave on the async runtime.
pub trait RasterIo: Send + Sync {
    /// Reads one band (zero-based) and the file's metadata.
    fn read_band(&self, path: &Path, band: usize) -> Result<(RasterMeta, Vec<u8>), RasterError>;

    /// Writes a multi-band raster; `bands` are full-resolution planes in
    /// output band order. All-or-nothing: implementations must not leave a
    /// readable partial file behind on error.
    fn write_stacked(
        &self,
        path: &Path,
        meta: &RasterMeta,
        bands: &[Vec<u8>],
    ) -> Result<(), RasterError>;

    /// File extension (without dot) for stacked composites this backend
    /// writes, e.g. `"tif"` for a GeoTIFF backend.
    fn stacked_extension(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_north_up_transform_pixel_sizes() {
        let gt = GeoTransform::north_up(0.0, 10.0, 0.1, 0.1);
        assert_eq!(gt.pixel_width(), 0.1);
        assert_eq!(gt.pixel_height(), -0.1);
        assert_eq!(gt.c, 0.0);
        assert_eq!(gt.f, 10.0);
    }

    #[test]
    fn test_meta_bounds_roundtrip() {
        // A 10°×10° tile at 0.1° resolution: 100×100 pixels.
        let meta = RasterMeta {
            transform: GeoTransform::north_up(10.0, 20.0, 0.1, 0.1),
            crs: "EPSG:4326".to_string(),
            width: 100,
            height: 100,
        };

        let bounds = meta.bounds();
        assert_eq!(bounds, TileBounds::new(10.0, 10.0, 20.0, 20.0));
    }
}
