//! tilemosaic - Degree-grid tile addressing and virtual mosaic construction
//!
//! This library resolves WGS84 bounding boxes against a 10°x10° global tile
//! grid, fetches per-tile forest change layer artifacts with local caching,
//! stacks each tile's layers into a composite raster, and builds a small
//! virtual mosaic descriptor (VRT) over the composites without merging any
//! pixel data.
//!
//! # High-Level API
//!
//! For most use cases, the [`session`] module provides the full pipeline:
//!
//! ```ignore
//! use std::sync::Arc;
//! use tilemosaic::config::SessionConfig;
//! use tilemosaic::grid::TileBounds;
//! use tilemosaic::raster::FlatRasterIo;
//! use tilemosaic::session::MosaicSession;
//!
//! let config = SessionConfig::new("data", "output");
//! let mut session = MosaicSession::connect(config, Arc::new(FlatRasterIo::default()))?;
//!
//! let outcome = session.run(&TileBounds::new(-75.0, -15.0, -50.0, 5.0)).await?;
//! println!("descriptor at {}", outcome.descriptor_path.display());
//! ```
//!
//! Individual stages are usable on their own: [`grid`] for id/bounds
//! conversion, [`coverage`] for bbox resolution, [`fetch`] for cached
//! downloads, [`stack`] for band stacking, and [`mosaic`] for descriptor
//! construction.

pub mod config;
pub mod coverage;
pub mod error;
pub mod fetch;
pub mod grid;
pub mod layer;
pub mod logging;
pub mod mosaic;
pub mod raster;
pub mod report;
pub mod session;
pub mod stack;
pub mod telemetry;

pub use error::PipelineError;
pub use grid::{TileBounds, TileId};
pub use layer::Layer;
pub use session::MosaicSession;
