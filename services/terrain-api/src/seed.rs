//! Demo terrains for local runs.
//!
//! Two small terrains with complete tile grids, registered either in the
//! in-memory store or in an empty catalog.

use tracing::info;

use storage::{Catalog, MemoryTileStore, TileArrayStore};
use terrain_common::{Grid, TerrainResult, Tile};

/// Rows and columns of every demo tile.
const TILE_SIZE: usize = 4;

/// (name, tiles across, tiles down)
const DEMO_TERRAINS: [(&str, u32, u32); 2] = [("wonderland", 2, 2), ("dreamscape", 1, 1)];

/// Deterministic elevation for a cell of the assembled terrain.
fn elevation(seed: u64, row: usize, col: usize) -> f64 {
    let h = (row as u64 * 7 + col as u64 * 13 + seed * 31) % 17;
    h as f64 * 10.0
}

/// Tiles of one demo terrain.
pub fn demo_tiles(seed: u64, tiles_x: u32, tiles_y: u32) -> Vec<Tile> {
    let mut tiles = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for pos_y in 0..tiles_y {
        for pos_x in 0..tiles_x {
            let mut data = Grid::filled(TILE_SIZE, TILE_SIZE, 0.0);
            for r in 0..TILE_SIZE {
                for c in 0..TILE_SIZE {
                    let row = pos_y as usize * TILE_SIZE + r;
                    let col = pos_x as usize * TILE_SIZE + c;
                    data.set(r, c, elevation(seed, row, col));
                }
            }
            tiles.push(Tile::new(pos_x, pos_y, data));
        }
    }
    tiles
}

/// Register the demo terrains in a memory store, using ids 1, 2, ...
pub async fn seed_memory(store: &MemoryTileStore) -> TerrainResult<()> {
    for (i, (name, tiles_x, tiles_y)) in DEMO_TERRAINS.iter().enumerate() {
        let terrain_id = i as i64 + 1;
        store.add_terrain(terrain_id, *name).await;
        for tile in demo_tiles(terrain_id as u64, *tiles_x, *tiles_y) {
            store.add_tile(terrain_id, tile).await?;
        }
    }
    Ok(())
}

/// Register the demo terrains in the catalog and write their tile arrays
/// below the data directory. Does nothing if the catalog already has terrains.
pub async fn seed_catalog(catalog: &Catalog, arrays: &TileArrayStore) -> TerrainResult<()> {
    if !catalog.is_empty().await? {
        info!("Catalog already has terrains; skipping demo seed");
        return Ok(());
    }

    for (name, tiles_x, tiles_y) in DEMO_TERRAINS {
        let terrain_id = catalog.create_terrain(name).await?;
        for tile in demo_tiles(terrain_id as u64, tiles_x, tiles_y) {
            let path = format!("tile/{:02}_{:02}_{:02}.json", terrain_id, tile.pos_x, tile.pos_y);
            arrays.store_local(&path, &tile.data).await?;
            catalog
                .register_tile(terrain_id, &path, false, tile.pos_x, tile.pos_y)
                .await?;
        }
        info!(terrain_id, name, tiles = tiles_x * tiles_y, "Seeded demo terrain");
    }
    Ok(())
}
