//! Terrain Pyramid Construction and Lookup
//!
//! This crate turns the tiles of a terrain into a multi-resolution pyramid
//! and serves its levels on demand:
//!
//! ```text
//! get_pyramid(terrain, zoom, metric)
//!      │
//!      ├─► PyramidStore::get_level ── hit ──► return values
//!      │
//!      └─► miss
//!            │
//!            ├─► TileStore::list_tiles
//!            ├─► assemble_grid      (level 0)
//!            ├─► build_pyramid      (levels 1..=root, 2x2 reduction)
//!            ├─► PyramidStore::put_levels (atomic, insert-if-absent)
//!            └─► re-read requested level
//! ```
//!
//! # Example
//!
//! ```ignore
//! use pyramid::PyramidService;
//!
//! let service = PyramidService::new(pyramid_store, tile_store);
//! let level = service.get_pyramid(1, 2, "maximum").await?;
//! ```

pub mod assemble;
pub mod downsample;
pub mod service;
pub mod stats;

pub use assemble::assemble_grid;
pub use downsample::{build_pyramid, downsample_2x, reduce_block};
pub use service::PyramidService;
pub use stats::{tile_statistics, TileStatistics};
