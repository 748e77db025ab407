//! Cached pyramid queries.
//!
//! The `PyramidService` answers `(terrain, zoom level, metric)` requests from
//! the pyramid store and builds the whole pyramid on the first miss.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, info, instrument, warn};

use storage::{PyramidStore, TileStore};
use terrain_common::{Grid, Metric, TerrainError, TerrainResult};

use crate::assemble::assemble_grid;
use crate::downsample::build_pyramid;

/// Entry point for pyramid lookups.
///
/// Holds no state of its own besides the two collaborators, so it can be
/// shared freely between concurrent requests.
pub struct PyramidService {
    pyramids: Arc<dyn PyramidStore>,
    tiles: Arc<dyn TileStore>,
}

impl PyramidService {
    pub fn new(pyramids: Arc<dyn PyramidStore>, tiles: Arc<dyn TileStore>) -> Self {
        Self { pyramids, tiles }
    }

    /// The tile store this service builds pyramids from.
    pub fn tiles(&self) -> &Arc<dyn TileStore> {
        &self.tiles
    }

    /// The store pyramids are cached in.
    pub fn pyramids(&self) -> &Arc<dyn PyramidStore> {
        &self.pyramids
    }

    /// Values of one pyramid level, with the metric given by name.
    ///
    /// The metric is validated before any I/O happens.
    pub async fn get_pyramid(
        &self,
        terrain_id: i64,
        zoom_level: u32,
        metric: &str,
    ) -> TerrainResult<Grid> {
        let metric: Metric = metric.parse()?;
        self.get_level(terrain_id, zoom_level, metric).await
    }

    /// Values of one pyramid level, building and persisting the full pyramid
    /// on the first request for (terrain, metric).
    ///
    /// # Errors
    /// * `TerrainNotFound` if the terrain has no tiles
    /// * `ZoomLevelOutOfRange` if `zoom_level` is beyond the pyramid root
    /// * grid assembly errors, unchanged
    /// * storage errors, unchanged
    #[instrument(skip(self, metric), fields(metric = %metric))]
    pub async fn get_level(
        &self,
        terrain_id: i64,
        zoom_level: u32,
        metric: Metric,
    ) -> TerrainResult<Grid> {
        if let Some(values) = self.pyramids.get_level(terrain_id, zoom_level, metric).await? {
            counter!("pyramid_cache_hits_total").increment(1);
            return Ok(values);
        }
        counter!("pyramid_cache_misses_total").increment(1);

        // Levels are persisted all at once. A pyramid may have been committed
        // by another request since the lookup above, so only a zoom beyond
        // its root is an error; anything else is read again.
        let max = match self.pyramids.max_zoom_level(terrain_id, metric).await? {
            Some(max) => {
                debug!(terrain_id, metric = %metric, max, "Pyramid already stored");
                max
            }
            None => self.build_and_store(terrain_id, metric).await?,
        };
        if zoom_level > max {
            return Err(TerrainError::ZoomLevelOutOfRange {
                requested: zoom_level,
                max,
            });
        }

        self.pyramids
            .get_level(terrain_id, zoom_level, metric)
            .await?
            .ok_or(TerrainError::ZoomLevelOutOfRange {
                requested: zoom_level,
                max,
            })
    }

    /// Build the pyramid for (terrain, metric) and persist it.
    ///
    /// Returns the maximum zoom level of the stored pyramid. Losing the
    /// insert race to a concurrent request is not an error: that request
    /// stored an equivalent pyramid.
    async fn build_and_store(&self, terrain_id: i64, metric: Metric) -> TerrainResult<u32> {
        let tiles = self.tiles.list_tiles(terrain_id).await?;
        if tiles.is_empty() {
            return Err(TerrainError::TerrainNotFound(terrain_id));
        }

        let tile_count = tiles.len();
        let start = Instant::now();

        // Assembly and downsampling are CPU-bound; keep them off the async workers.
        let levels = tokio::task::spawn_blocking(move || -> TerrainResult<Vec<Grid>> {
            let base = assemble_grid(&tiles)?;
            Ok(build_pyramid(base, metric))
        })
        .await
        .map_err(|e| TerrainError::InternalError(format!("pyramid build task failed: {}", e)))??;

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        counter!("pyramid_builds_total").increment(1);
        histogram!("pyramid_build_duration_ms").record(elapsed_ms);

        let max = (levels.len() - 1) as u32;
        info!(
            terrain_id,
            metric = %metric,
            tiles = tile_count,
            levels = levels.len(),
            base_width = levels[0].width(),
            base_height = levels[0].height(),
            elapsed_ms,
            "Built terrain pyramid"
        );

        match self.pyramids.put_levels(terrain_id, metric, &levels).await {
            Ok(()) => {
                debug!(terrain_id, metric = %metric, "Stored terrain pyramid");
                Ok(max)
            }
            Err(TerrainError::DuplicatePyramid { .. }) => {
                counter!("pyramid_duplicate_races_total").increment(1);
                warn!(
                    terrain_id,
                    metric = %metric,
                    "Pyramid was stored concurrently by another request; using stored copy"
                );
                let stored = self.pyramids.max_zoom_level(terrain_id, metric).await?;
                Ok(stored.unwrap_or(max))
            }
            Err(e) => Err(e),
        }
    }
}
