//! Dataset layers and the fixed composite band order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One raster layer of the forest change dataset.
///
/// Every tile is published as three single-band rasters; stacked composites
/// always carry them in the order of [`Layer::ALL`]:
///
/// 1. `treecover2000` — tree canopy cover in year 2000 (0-100%)
/// 2. `lossyear` — year of cover loss (0 = no loss, 1-N = year index)
/// 3. `datamask` — data mask (0 = no data, 1 = mapped land)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    #[serde(rename = "treecover2000")]
    TreeCover2000,
    #[serde(rename = "lossyear")]
    LossYear,
    #[serde(rename = "datamask")]
    DataMask,
}

impl Layer {
    /// All layers in fixed composite band order.
    pub const ALL: [Layer; 3] = [Layer::TreeCover2000, Layer::LossYear, Layer::DataMask];

    /// The layer name as it appears in remote filenames and reference lists.
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::TreeCover2000 => "treecover2000",
            Layer::LossYear => "lossyear",
            Layer::DataMask => "datamask",
        }
    }

    /// One-based band index of this layer in a stacked composite.
    pub fn band_index(&self) -> usize {
        match self {
            Layer::TreeCover2000 => 1,
            Layer::LossYear => 2,
            Layer::DataMask => 3,
        }
    }

    /// Human-readable value description, surfaced in summaries.
    pub fn description(&self) -> &'static str {
        match self {
            Layer::TreeCover2000 => "Tree cover in year 2000 (0-100%)",
            Layer::LossYear => "Year of loss (0=no loss, 1-N=loss year)",
            Layer::DataMask => "Data mask (0=invalid, 1=valid)",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_band_order() {
        let names: Vec<&str> = Layer::ALL.iter().map(|l| l.as_str()).collect();
        assert_eq!(names, ["treecover2000", "lossyear", "datamask"]);
    }

    #[test]
    fn test_band_indices_match_order() {
        for (i, layer) in Layer::ALL.iter().enumerate() {
            assert_eq!(layer.band_index(), i + 1);
        }
    }
}
