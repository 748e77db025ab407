//! Storage abstractions for terrain services.
//!
//! Provides unified interfaces for:
//! - PostgreSQL for the terrain/tile catalog and persisted pyramid levels
//! - Tile arrays on the local filesystem or behind remote URLs
//! - In-memory stores for tests and demo deployments

pub mod catalog;
pub mod memory;
pub mod repository;
pub mod store;
pub mod tile_arrays;

pub use catalog::{Catalog, CatalogTileStore};
pub use memory::{MemoryPyramidStore, MemoryTileStore};
pub use store::{PyramidStore, TileStore};
pub use tile_arrays::{parse_tile_array, TileArrayStore};
