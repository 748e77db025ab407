//! Basic statistics over a single tile.

use serde::{Deserialize, Serialize};

use terrain_common::{TerrainError, TerrainResult, Tile};

/// Summary statistics of one tile's values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileStatistics {
    pub pos_x: u32,
    pub pos_y: u32,
    pub rows: usize,
    pub columns: usize,
    pub average: f64,
    pub max_per_row: Vec<f64>,
    pub min_per_col: Vec<f64>,
}

/// Compute statistics for a tile.
///
/// Fails with `InconsistentTileShape` for a tile without values.
pub fn tile_statistics(tile: &Tile) -> TerrainResult<TileStatistics> {
    let data = &tile.data;
    if data.is_empty() {
        return Err(TerrainError::InconsistentTileShape(format!(
            "tile ({}, {}) has no values",
            tile.pos_x, tile.pos_y
        )));
    }

    let average = data.values().iter().sum::<f64>() / data.len() as f64;

    let max_per_row = (0..data.height())
        .map(|r| data.row(r).iter().copied().fold(f64::NEG_INFINITY, f64::max))
        .collect();

    let mut min_per_col = data.row(0).to_vec();
    for r in 1..data.height() {
        for (min, &v) in min_per_col.iter_mut().zip(data.row(r)) {
            *min = min.min(v);
        }
    }

    Ok(TileStatistics {
        pos_x: tile.pos_x,
        pos_y: tile.pos_y,
        rows: data.height(),
        columns: data.width(),
        average,
        max_per_row,
        min_per_col,
    })
}
