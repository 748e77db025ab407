//! Common types and utilities shared across all terrain pyramid crates.

pub mod error;
pub mod grid;
pub mod metric;
pub mod terrain;

pub use error::{TerrainError, TerrainResult};
pub use grid::Grid;
pub use metric::Metric;
pub use terrain::{PyramidLevel, TerrainSummary, Tile, TileRecord};
