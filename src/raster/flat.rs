//! Flat raster codec: the crate's default `RasterIo` backend.
//!
//! A flat raster file is a bincode-encoded [`FlatRaster`]: metadata followed
//! by one full byte plane per band. It carries exactly the information the
//! mosaic pipeline needs and nothing else, which keeps the test suite and
//! GDAL-free consumers independent of any geo format library.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{RasterError, RasterIo, RasterMeta};

/// On-disk representation of a flat raster file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FlatRaster {
    pub meta: RasterMeta,
    pub bands: Vec<Vec<u8>>,
}

/// `RasterIo` backend using the flat raster codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatRasterIo;

impl FlatRasterIo {
    /// Encodes a single-band raster to bytes, as a remote layer artifact
    /// would arrive over the wire.
    pub fn encode_single(meta: &RasterMeta, band: &[u8]) -> Result<Vec<u8>, RasterError> {
        check_band_size(meta, band)?;
        let raster = FlatRaster {
            meta: meta.clone(),
            bands: vec![band.to_vec()],
        };
        bincode::serialize(&raster).map_err(|e| RasterError::Decode {
            path: "<memory>".to_string(),
            reason: e.to_string(),
        })
    }

    fn load(path: &Path) -> Result<FlatRaster, RasterError> {
        let bytes = fs::read(path)?;
        bincode::deserialize(&bytes).map_err(|e| RasterError::Decode {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

fn check_band_size(meta: &RasterMeta, band: &[u8]) -> Result<(), RasterError> {
    let expected = meta.width as usize * meta.height as usize;
    if band.len() != expected {
        return Err(RasterError::SizeMismatch {
            expected,
            actual: band.len(),
        });
    }
    Ok(())
}

impl RasterIo for FlatRasterIo {
    fn read_band(&self, path: &Path, band: usize) -> Result<(RasterMeta, Vec<u8>), RasterError> {
        let raster = Self::load(path)?;
        let count = raster.bands.len();
        let data = raster
            .bands
            .into_iter()
            .nth(band)
            .ok_or_else(|| RasterError::BandOutOfRange {
                path: path.display().to_string(),
                band,
                count,
            })?;
        trace!(path = %path.display(), band, "read flat raster band");
        Ok((raster.meta, data))
    }

    fn write_stacked(
        &self,
        path: &Path,
        meta: &RasterMeta,
        bands: &[Vec<u8>],
    ) -> Result<(), RasterError> {
        for band in bands {
            check_band_size(meta, band)?;
        }

        let raster = FlatRaster {
            meta: meta.clone(),
            bands: bands.to_vec(),
        };
        let bytes = bincode::serialize(&raster).map_err(|e| RasterError::Decode {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        // Write to a sibling temp file and rename so a crash mid-write never
        // leaves a readable partial composite.
        let tmp = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;

        trace!(path = %path.display(), bands = bands.len(), "wrote stacked flat raster");
        Ok(())
    }

    fn stacked_extension(&self) -> &'static str {
        "rst"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GeoTransform;
    use tempfile::tempdir;

    fn test_meta(width: u32, height: u32) -> RasterMeta {
        RasterMeta {
            transform: GeoTransform::north_up(0.0, 10.0, 0.1, 0.1),
            crs: "EPSG:4326".to_string(),
            width,
            height,
        }
    }

    #[test]
    fn test_encode_single_then_read_band() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("layer.rst");

        let meta = test_meta(4, 4);
        let band: Vec<u8> = (0..16).collect();
        let bytes = FlatRasterIo::encode_single(&meta, &band).unwrap();
        fs::write(&path, bytes).unwrap();

        let (read_meta, read_band) = FlatRasterIo.read_band(&path, 0).unwrap();
        assert_eq!(read_meta, meta);
        assert_eq!(read_band, band);
    }

    #[test]
    fn test_write_stacked_then_read_each_band() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stacked.rst");

        let meta = test_meta(2, 3);
        let bands = vec![vec![1u8; 6], vec![2u8; 6], vec![3u8; 6]];
        FlatRasterIo.write_stacked(&path, &meta, &bands).unwrap();

        for (i, expected) in bands.iter().enumerate() {
            let (_, band) = FlatRasterIo.read_band(&path, i).unwrap();
            assert_eq!(&band, expected);
        }
    }

    #[test]
    fn test_band_out_of_range() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("one.rst");

        let meta = test_meta(2, 2);
        FlatRasterIo
            .write_stacked(&path, &meta, &[vec![0u8; 4]])
            .unwrap();

        let err = FlatRasterIo.read_band(&path, 3).unwrap_err();
        assert!(matches!(err, RasterError::BandOutOfRange { band: 3, .. }));
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let meta = test_meta(4, 4);
        let err = FlatRasterIo::encode_single(&meta, &[0u8; 3]).unwrap_err();
        assert!(matches!(
            err,
            RasterError::SizeMismatch {
                expected: 16,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_garbage_file_is_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.rst");
        fs::write(&path, b"not a raster").unwrap();

        let err = FlatRasterIo.read_band(&path, 0).unwrap_err();
        assert!(matches!(err, RasterError::Decode { .. }));
    }

    #[test]
    fn test_no_partial_file_left_on_failed_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.rst");

        let meta = test_meta(4, 4);
        // Wrong band size fails validation before anything touches disk.
        let err = FlatRasterIo.write_stacked(&path, &meta, &[vec![0u8; 2]]);
        assert!(err.is_err());
        assert!(!path.exists());
    }
}
