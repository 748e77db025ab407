//! In-memory tile and pyramid stores.
//!
//! Used by tests and by the `--in-memory` demo mode of the API service.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};

use terrain_common::{Grid, Metric, TerrainError, TerrainResult, TerrainSummary, Tile};

use crate::store::{PyramidStore, TileStore};

struct MemoryTerrain {
    name: String,
    tiles: Vec<Tile>,
}

/// Tile store holding terrains and tile values in memory.
#[derive(Default)]
pub struct MemoryTileStore {
    terrains: RwLock<BTreeMap<i64, MemoryTerrain>>,
    next_tile_id: AtomicI64,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a terrain. Re-registering keeps its tiles and renames it.
    pub async fn add_terrain(&self, terrain_id: i64, name: impl Into<String>) {
        let name = name.into();
        let mut terrains = self.terrains.write().await;
        terrains
            .entry(terrain_id)
            .and_modify(|t| t.name = name.clone())
            .or_insert(MemoryTerrain {
                name,
                tiles: Vec::new(),
            });
    }

    /// Add a tile to a registered terrain, assigning an id if it has none.
    /// Returns the tile id.
    pub async fn add_tile(&self, terrain_id: i64, mut tile: Tile) -> TerrainResult<i64> {
        let mut terrains = self.terrains.write().await;
        let terrain = terrains
            .get_mut(&terrain_id)
            .ok_or(TerrainError::TerrainNotFound(terrain_id))?;

        let id = match tile.id {
            Some(id) => id,
            None => self.next_tile_id.fetch_add(1, Ordering::Relaxed) + 1,
        };
        tile.id = Some(id);
        terrain.tiles.push(tile);
        Ok(id)
    }
}

#[async_trait]
impl TileStore for MemoryTileStore {
    async fn list_terrains(&self) -> TerrainResult<Vec<TerrainSummary>> {
        let terrains = self.terrains.read().await;
        Ok(terrains
            .iter()
            .map(|(id, t)| TerrainSummary {
                id: *id,
                name: t.name.clone(),
                tile_count: t.tiles.len() as i64,
            })
            .collect())
    }

    async fn list_tiles(&self, terrain_id: i64) -> TerrainResult<Vec<Tile>> {
        let terrains = self.terrains.read().await;
        Ok(terrains
            .get(&terrain_id)
            .map(|t| t.tiles.clone())
            .unwrap_or_default())
    }

    async fn get_tile(&self, tile_id: i64) -> TerrainResult<Option<Tile>> {
        let terrains = self.terrains.read().await;
        Ok(terrains
            .values()
            .flat_map(|t| t.tiles.iter())
            .find(|tile| tile.id == Some(tile_id))
            .cloned())
    }
}

/// Pyramid store holding levels in memory.
///
/// `put_levels` checks and inserts under a single lock, which makes it an
/// atomic insert-if-absent per (terrain, metric).
#[derive(Default)]
pub struct MemoryPyramidStore {
    pyramids: Mutex<HashMap<(i64, Metric), Vec<Grid>>>,
    put_calls: AtomicU64,
}

impl MemoryPyramidStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put_levels` calls so far, successful or not.
    pub fn put_calls(&self) -> u64 {
        self.put_calls.load(Ordering::Relaxed)
    }

    /// Number of stored pyramids.
    pub async fn pyramid_count(&self) -> usize {
        self.pyramids.lock().await.len()
    }
}

#[async_trait]
impl PyramidStore for MemoryPyramidStore {
    async fn get_level(
        &self,
        terrain_id: i64,
        zoom_level: u32,
        metric: Metric,
    ) -> TerrainResult<Option<Grid>> {
        let pyramids = self.pyramids.lock().await;
        Ok(pyramids
            .get(&(terrain_id, metric))
            .and_then(|levels| levels.get(zoom_level as usize))
            .cloned())
    }

    async fn max_zoom_level(&self, terrain_id: i64, metric: Metric) -> TerrainResult<Option<u32>> {
        let pyramids = self.pyramids.lock().await;
        Ok(pyramids
            .get(&(terrain_id, metric))
            .map(|levels| levels.len().saturating_sub(1) as u32))
    }

    async fn put_levels(
        &self,
        terrain_id: i64,
        metric: Metric,
        levels: &[Grid],
    ) -> TerrainResult<()> {
        self.put_calls.fetch_add(1, Ordering::Relaxed);

        if levels.is_empty() {
            return Err(TerrainError::InternalError(
                "refusing to persist an empty pyramid".to_string(),
            ));
        }

        let mut pyramids = self.pyramids.lock().await;
        if pyramids.contains_key(&(terrain_id, metric)) {
            return Err(TerrainError::DuplicatePyramid {
                terrain_id,
                metric: metric.to_string(),
            });
        }
        pyramids.insert((terrain_id, metric), levels.to_vec());
        Ok(())
    }
}
