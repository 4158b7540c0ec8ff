//! Session configuration.
//!
//! `SessionConfig` gathers everything a mosaic session needs to run:
//! remote dataset location, local folders, and fetch tuning. Defaults match
//! the published forest change dataset layout.

use std::path::PathBuf;

use crate::grid::TileId;
use crate::layer::Layer;

/// Default remote base URL for dataset artifacts and reference lists.
pub const DEFAULT_BASE_URL: &str = "https://storage.googleapis.com/earthenginepartners-hansen";

/// Default dataset version segment, part of every artifact URL and filename.
pub const DEFAULT_VERSION: &str = "GFC-2024-v1.12";

/// Default per-request download timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default cap on concurrent layer downloads across a batch.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Configuration for a mosaic session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote base URL; layer reference lists live at
    /// `<base_url>/<version>/<layer>.txt` and artifacts alongside them.
    pub base_url: String,

    /// Dataset version segment, e.g. `"GFC-2024-v1.12"`.
    pub version: String,

    /// Local folder for raw per-layer artifacts and stacked composites.
    pub data_folder: PathBuf,

    /// Local folder for mosaic descriptors and summaries.
    pub output_folder: PathBuf,

    /// Per-request download timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum number of layer downloads in flight at once.
    pub max_concurrent_fetches: usize,
}

impl SessionConfig {
    /// Creates a config with dataset defaults and the given folders.
    pub fn new(data_folder: impl Into<PathBuf>, output_folder: impl Into<PathBuf>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            version: DEFAULT_VERSION.to_string(),
            data_folder: data_folder.into(),
            output_folder: output_folder.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }

    /// Remote URL of a layer's tile reference list.
    pub fn reference_list_url(&self, layer: Layer) -> String {
        format!("{}/{}/{}.txt", self.base_url, self.version, layer)
    }

    /// Remote filename of one tile's layer artifact, e.g.
    /// `Hansen_GFC-2024-v1.12_lossyear_00N_000E.tif`.
    pub fn artifact_name(&self, id: &TileId, layer: Layer) -> String {
        format!("Hansen_{}_{}_{}.tif", self.version, layer, id)
    }

    /// Remote URL of one tile's layer artifact.
    pub fn artifact_url(&self, id: &TileId, layer: Layer) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            self.version,
            self.artifact_name(id, layer)
        )
    }

    /// Local cache path of one tile's layer artifact:
    /// `<data_folder>/<tile_id>/<artifact_name>`.
    pub fn artifact_path(&self, id: &TileId, layer: Layer) -> PathBuf {
        self.data_folder
            .join(id.as_str())
            .join(self.artifact_name(id, layer))
    }

    /// Local path of one tile's stacked composite:
    /// `<data_folder>/stacked_<tile_id>.<ext>`.
    pub fn stacked_path(&self, id: &TileId, extension: &str) -> PathBuf {
        self.data_folder
            .join(format!("stacked_{}.{}", id, extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileId;

    fn test_config() -> SessionConfig {
        SessionConfig::new("/data/tiles", "/data/output")
    }

    #[test]
    fn test_reference_list_url() {
        let config = test_config();
        assert_eq!(
            config.reference_list_url(Layer::LossYear),
            "https://storage.googleapis.com/earthenginepartners-hansen/GFC-2024-v1.12/lossyear.txt"
        );
    }

    #[test]
    fn test_artifact_naming() {
        let config = test_config();
        let id = TileId::parse("10S_010W").unwrap();

        assert_eq!(
            config.artifact_name(&id, Layer::TreeCover2000),
            "Hansen_GFC-2024-v1.12_treecover2000_10S_010W.tif"
        );
        assert_eq!(
            config.artifact_path(&id, Layer::TreeCover2000),
            PathBuf::from("/data/tiles/10S_010W/Hansen_GFC-2024-v1.12_treecover2000_10S_010W.tif")
        );
    }

    #[test]
    fn test_stacked_path() {
        let config = test_config();
        let id = TileId::parse("00N_000E").unwrap();
        assert_eq!(
            config.stacked_path(&id, "rst"),
            PathBuf::from("/data/tiles/stacked_00N_000E.rst")
        );
    }
}
