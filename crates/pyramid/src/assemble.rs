//! Composition of a terrain's tiles into one contiguous grid.

use std::collections::HashMap;

use terrain_common::{Grid, TerrainError, TerrainResult, Tile};

/// Compose tiles into the full-resolution terrain grid (pyramid level 0).
///
/// Tile (x, y) occupies rows `y*h..(y+1)*h` and columns `x*w..(x+1)*w`, where
/// `h x w` is the shared tile shape. The origin is the upper left corner.
///
/// # Errors
/// * `IncompleteGrid` if any position in `[0, max_x] x [0, max_y]` has no tile
///   (also returned for an empty tile set, reporting position (0, 0))
/// * `OverlappingTiles` if two tiles claim the same position
/// * `InconsistentTileShape` if tiles differ in shape
pub fn assemble_grid(tiles: &[Tile]) -> TerrainResult<Grid> {
    let Some(first) = tiles.first() else {
        return Err(TerrainError::IncompleteGrid {
            missing_x: 0,
            missing_y: 0,
        });
    };

    let (tile_height, tile_width) = first.data.shape();
    let mut by_position: HashMap<(u32, u32), &Tile> = HashMap::with_capacity(tiles.len());
    let (mut max_x, mut max_y) = (0u32, 0u32);

    for tile in tiles {
        if tile.data.shape() != (tile_height, tile_width) {
            return Err(TerrainError::InconsistentTileShape(format!(
                "tile ({}, {}) is {}x{}, expected {}x{}",
                tile.pos_x,
                tile.pos_y,
                tile.data.height(),
                tile.data.width(),
                tile_height,
                tile_width
            )));
        }
        if by_position.insert((tile.pos_x, tile.pos_y), tile).is_some() {
            return Err(TerrainError::OverlappingTiles {
                pos_x: tile.pos_x,
                pos_y: tile.pos_y,
            });
        }
        max_x = max_x.max(tile.pos_x);
        max_y = max_y.max(tile.pos_y);
    }

    // A bounding rectangle too large to count cannot be covered either.
    let positions = (u64::from(max_x) + 1).checked_mul(u64::from(max_y) + 1);
    if positions != Some(by_position.len() as u64) {
        let (missing_x, missing_y) = (0..=max_y)
            .flat_map(|y| (0..=max_x).map(move |x| (x, y)))
            .find(|pos| !by_position.contains_key(pos))
            .unwrap_or((0, 0));
        return Err(TerrainError::IncompleteGrid {
            missing_x,
            missing_y,
        });
    }

    let tiles_x = max_x as usize + 1;
    let tiles_y = max_y as usize + 1;
    let mut grid = Grid::filled(tiles_x * tile_width, tiles_y * tile_height, 0.0);
    for ((x, y), tile) in by_position {
        let col0 = x as usize * tile_width;
        let row0 = y as usize * tile_height;
        for r in 0..tile_height {
            grid.row_mut(row0 + r)[col0..col0 + tile_width].copy_from_slice(tile.data.row(r));
        }
    }

    Ok(grid)
}
