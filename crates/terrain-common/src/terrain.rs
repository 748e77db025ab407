//! Terrain, tile and pyramid level records.

use serde::{Deserialize, Serialize};

use crate::{Grid, Metric};

/// A terrain as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainSummary {
    pub id: i64,
    pub name: String,
    /// Number of tiles registered for this terrain
    pub tile_count: i64,
}

/// Catalog row for one tile. The array itself lives in a file.
///
/// Tiles are positioned in a larger grid by `pos_x` / `pos_y`, with the
/// origin (0, 0) in the upper left corner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRecord {
    pub id: i64,
    pub terrain_id: i64,
    /// Relative to the tile data directory, or a URL when `is_remote`
    pub path: String,
    pub is_remote: bool,
    pub pos_x: u32,
    pub pos_y: u32,
}

/// A tile with its raw values loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub id: Option<i64>,
    pub pos_x: u32,
    pub pos_y: u32,
    pub data: Grid,
}

impl Tile {
    pub fn new(pos_x: u32, pos_y: u32, data: Grid) -> Self {
        Self {
            id: None,
            pos_x,
            pos_y,
            data,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

/// One persisted level of a terrain pyramid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PyramidLevel {
    pub terrain_id: i64,
    /// 0 = full resolution, increasing = coarser
    pub zoom_level: u32,
    pub metric: Metric,
    pub values: Grid,
}
