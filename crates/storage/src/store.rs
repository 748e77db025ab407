//! Collaborator traits consumed by the pyramid service.

use async_trait::async_trait;

use terrain_common::{Grid, Metric, TerrainResult, TerrainSummary, Tile};

/// Source of terrains and their tiles with raw values loaded.
#[async_trait]
pub trait TileStore: Send + Sync {
    /// List all terrains with their tile counts.
    async fn list_terrains(&self) -> TerrainResult<Vec<TerrainSummary>>;

    /// Load every tile of a terrain. Order is unspecified.
    ///
    /// Returns an empty list for unknown terrains.
    async fn list_tiles(&self, terrain_id: i64) -> TerrainResult<Vec<Tile>>;

    /// Load a single tile by id.
    async fn get_tile(&self, tile_id: i64) -> TerrainResult<Option<Tile>>;
}

/// Persistence for pyramid levels keyed by (terrain, zoom level, metric).
///
/// Levels are written once per (terrain, metric) and never updated.
#[async_trait]
pub trait PyramidStore: Send + Sync {
    /// Look up one level. Pure lookup, no computation.
    async fn get_level(
        &self,
        terrain_id: i64,
        zoom_level: u32,
        metric: Metric,
    ) -> TerrainResult<Option<Grid>>;

    /// Highest stored zoom level for (terrain, metric), or `None` if no
    /// pyramid has been persisted yet.
    async fn max_zoom_level(&self, terrain_id: i64, metric: Metric) -> TerrainResult<Option<u32>>;

    /// Persist a complete pyramid, level 0 first.
    ///
    /// Either every level becomes visible or none does. Fails with
    /// `TerrainError::DuplicatePyramid` if levels already exist for
    /// (terrain, metric); existing rows are never overwritten.
    async fn put_levels(&self, terrain_id: i64, metric: Metric, levels: &[Grid])
        -> TerrainResult<()>;

    /// Check that the backing store is reachable.
    async fn ping(&self) -> TerrainResult<()> {
        Ok(())
    }
}
