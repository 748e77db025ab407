//! End-to-end tests for PyramidService over the in-memory stores.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Barrier, Mutex};

use pyramid::{assemble_grid, PyramidService};
use storage::{MemoryPyramidStore, MemoryTileStore, PyramidStore, TileStore};
use terrain_common::{Grid, Metric, TerrainError, TerrainResult, TerrainSummary, Tile};

// ============================================================================
// Fixtures
// ============================================================================

/// 4x4 terrain made of four 2x2 tiles, all ones except a peak and a pit.
async fn peak_and_pit_terrain(store: &MemoryTileStore, terrain_id: i64) {
    store.add_terrain(terrain_id, "wonderland").await;
    let tiles = [
        (0, 0, vec![vec![1.0, 1.0], vec![1.0, 4.0]]),
        (1, 0, vec![vec![1.0, 1.0], vec![1.0, 1.0]]),
        (0, 1, vec![vec![1.0, 1.0], vec![1.0, 1.0]]),
        (1, 1, vec![vec![1.0, 1.0], vec![1.0, -4.0]]),
    ];
    for (x, y, rows) in tiles {
        store
            .add_tile(terrain_id, Tile::new(x, y, Grid::from_rows(rows).unwrap()))
            .await
            .unwrap();
    }
}

fn service(pyramids: Arc<MemoryPyramidStore>, tiles: Arc<dyn TileStore>) -> PyramidService {
    PyramidService::new(pyramids, tiles)
}

/// Tile store that holds every `list_tiles` caller until `parties` callers
/// arrived, forcing concurrent cache misses to overlap.
struct BarrierTileStore {
    inner: MemoryTileStore,
    barrier: Barrier,
}

#[async_trait]
impl TileStore for BarrierTileStore {
    async fn list_terrains(&self) -> TerrainResult<Vec<TerrainSummary>> {
        self.inner.list_terrains().await
    }

    async fn list_tiles(&self, terrain_id: i64) -> TerrainResult<Vec<Tile>> {
        self.barrier.wait().await;
        self.inner.list_tiles(terrain_id).await
    }

    async fn get_tile(&self, tile_id: i64) -> TerrainResult<Option<Tile>> {
        self.inner.get_tile(tile_id).await
    }
}

/// Pyramid store where another request commits a pyramid right after the
/// first lookup misses.
struct CommitAfterMissStore {
    inner: MemoryPyramidStore,
    pending: Mutex<Option<Vec<Grid>>>,
}

#[async_trait]
impl PyramidStore for CommitAfterMissStore {
    async fn get_level(
        &self,
        terrain_id: i64,
        zoom_level: u32,
        metric: Metric,
    ) -> TerrainResult<Option<Grid>> {
        let found = self.inner.get_level(terrain_id, zoom_level, metric).await?;
        if found.is_none() {
            if let Some(levels) = self.pending.lock().await.take() {
                self.inner.put_levels(terrain_id, metric, &levels).await?;
            }
        }
        Ok(found)
    }

    async fn max_zoom_level(&self, terrain_id: i64, metric: Metric) -> TerrainResult<Option<u32>> {
        self.inner.max_zoom_level(terrain_id, metric).await
    }

    async fn put_levels(&self, terrain_id: i64, metric: Metric, levels: &[Grid]) -> TerrainResult<()> {
        self.inner.put_levels(terrain_id, metric, levels).await
    }
}

/// Pyramid store that writes levels one at a time into a staging area and
/// fails while writing level `fail_at`, discarding everything staged, like a
/// rolled back transaction.
struct FailingLevelStore {
    inner: MemoryPyramidStore,
    fail_at: Mutex<Option<usize>>,
}

#[async_trait]
impl PyramidStore for FailingLevelStore {
    async fn get_level(
        &self,
        terrain_id: i64,
        zoom_level: u32,
        metric: Metric,
    ) -> TerrainResult<Option<Grid>> {
        self.inner.get_level(terrain_id, zoom_level, metric).await
    }

    async fn max_zoom_level(&self, terrain_id: i64, metric: Metric) -> TerrainResult<Option<u32>> {
        self.inner.max_zoom_level(terrain_id, metric).await
    }

    async fn put_levels(&self, terrain_id: i64, metric: Metric, levels: &[Grid]) -> TerrainResult<()> {
        let fail_at = self.fail_at.lock().await.take();
        let mut staged = Vec::with_capacity(levels.len());
        for (zoom_level, level) in levels.iter().enumerate() {
            if fail_at == Some(zoom_level) {
                return Err(TerrainError::DatabaseError(format!(
                    "insert of level {} failed",
                    zoom_level
                )));
            }
            staged.push(level.clone());
        }
        self.inner.put_levels(terrain_id, metric, &staged).await
    }
}

// ============================================================================
// Query tests
// ============================================================================

#[tokio::test]
async fn test_builds_all_levels_on_first_request() {
    let tiles = Arc::new(MemoryTileStore::new());
    peak_and_pit_terrain(&tiles, 1).await;
    let pyramids = Arc::new(MemoryPyramidStore::new());
    let service = service(pyramids.clone(), tiles);

    let level1 = service.get_pyramid(1, 1, "maximum").await.unwrap();
    assert_eq!(level1.to_rows(), vec![vec![4.0, 1.0], vec![1.0, 1.0]]);

    // Every level was persisted in the same call
    assert_eq!(pyramids.max_zoom_level(1, Metric::Maximum).await.unwrap(), Some(2));
    let level0 = pyramids.get_level(1, 0, Metric::Maximum).await.unwrap().unwrap();
    assert_eq!(level0.get(1, 1), Some(4.0));
    assert_eq!(level0.get(3, 3), Some(-4.0));
    assert_eq!(
        pyramids.get_level(1, 2, Metric::Maximum).await.unwrap(),
        Some(Grid::filled(1, 1, 4.0))
    );
}

#[tokio::test]
async fn test_second_request_served_from_cache() {
    let tiles = Arc::new(MemoryTileStore::new());
    peak_and_pit_terrain(&tiles, 1).await;
    let pyramids = Arc::new(MemoryPyramidStore::new());
    let service = service(pyramids.clone(), tiles);

    let first = service.get_pyramid(1, 2, "maximum").await.unwrap();
    let second = service.get_pyramid(1, 2, "maximum").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_rows(), vec![vec![4.0]]);

    // Other levels of the same pyramid are cache hits too
    service.get_pyramid(1, 0, "maximum").await.unwrap();
    assert_eq!(pyramids.put_calls(), 1);
}

#[tokio::test]
async fn test_metrics_are_separate_pyramids() {
    let tiles = Arc::new(MemoryTileStore::new());
    peak_and_pit_terrain(&tiles, 1).await;
    let pyramids = Arc::new(MemoryPyramidStore::new());
    let service = service(pyramids.clone(), tiles);

    let max = service.get_pyramid(1, 2, "maximum").await.unwrap();
    let min = service.get_pyramid(1, 2, "minimum").await.unwrap();
    let avg = service.get_pyramid(1, 2, "average").await.unwrap();

    assert_eq!(max.get(0, 0), Some(4.0));
    assert_eq!(min.get(0, 0), Some(-4.0));
    // (1.75 + 1 + 1 - 0.25) / 4
    assert!((avg.get(0, 0).unwrap() - 0.875).abs() < 1e-9);
    assert_eq!(pyramids.pyramid_count().await, 3);
}

#[tokio::test]
async fn test_single_tile_two_by_two() {
    let tiles = Arc::new(MemoryTileStore::new());
    tiles.add_terrain(5, "tiny").await;
    tiles
        .add_tile(
            5,
            Tile::new(0, 0, Grid::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap()),
        )
        .await
        .unwrap();
    let service = service(Arc::new(MemoryPyramidStore::new()), tiles);

    let level0 = service.get_pyramid(5, 0, "maximum").await.unwrap();
    assert_eq!(level0.to_rows(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    let level1 = service.get_pyramid(5, 1, "maximum").await.unwrap();
    assert_eq!(level1.to_rows(), vec![vec![4.0]]);
}

// ============================================================================
// Error tests
// ============================================================================

#[tokio::test]
async fn test_zoom_beyond_root() {
    let tiles = Arc::new(MemoryTileStore::new());
    peak_and_pit_terrain(&tiles, 1).await;
    let pyramids = Arc::new(MemoryPyramidStore::new());
    let service = service(pyramids.clone(), tiles);

    // First request builds the pyramid, then reports the range error
    let err = service.get_pyramid(1, 5, "maximum").await.unwrap_err();
    assert!(matches!(
        err,
        TerrainError::ZoomLevelOutOfRange {
            requested: 5,
            max: 2
        }
    ));
    assert_eq!(pyramids.pyramid_count().await, 1);

    // Later requests answer from the stored pyramid without rebuilding
    let err = service.get_pyramid(1, 3, "maximum").await.unwrap_err();
    assert!(matches!(
        err,
        TerrainError::ZoomLevelOutOfRange {
            requested: 3,
            max: 2
        }
    ));
    assert_eq!(pyramids.put_calls(), 1);
}

#[tokio::test]
async fn test_unknown_metric() {
    let tiles = Arc::new(MemoryTileStore::new());
    peak_and_pit_terrain(&tiles, 1).await;
    let pyramids = Arc::new(MemoryPyramidStore::new());
    let service = service(pyramids.clone(), tiles);

    let err = service.get_pyramid(1, 0, "median").await.unwrap_err();
    assert!(matches!(err, TerrainError::UnknownMetric(ref m) if m == "median"));
    assert_eq!(pyramids.put_calls(), 0);
}

#[tokio::test]
async fn test_terrain_without_tiles() {
    let tiles = Arc::new(MemoryTileStore::new());
    tiles.add_terrain(2, "dreamscape").await;
    let pyramids = Arc::new(MemoryPyramidStore::new());
    let service = service(pyramids.clone(), tiles);

    assert!(matches!(
        service.get_pyramid(2, 0, "maximum").await,
        Err(TerrainError::TerrainNotFound(2))
    ));
    assert!(matches!(
        service.get_pyramid(99, 0, "maximum").await,
        Err(TerrainError::TerrainNotFound(99))
    ));
    assert_eq!(pyramids.put_calls(), 0);
}

#[tokio::test]
async fn test_incomplete_terrain_propagates() {
    let tiles = Arc::new(MemoryTileStore::new());
    tiles.add_terrain(1, "wonderland").await;
    // Positions (2, 3) and (8, 5) leave most of the bounding rectangle empty
    for (x, y) in [(2, 3), (8, 5)] {
        tiles
            .add_tile(1, Tile::new(x, y, Grid::filled(2, 2, 1.0)))
            .await
            .unwrap();
    }
    let pyramids = Arc::new(MemoryPyramidStore::new());
    let service = service(pyramids.clone(), tiles);

    let err = service.get_pyramid(1, 0, "maximum").await.unwrap_err();
    assert!(matches!(err, TerrainError::IncompleteGrid { .. }));
    assert!(err.is_bad_terrain_data());
    assert_eq!(pyramids.pyramid_count().await, 0);
}

// ============================================================================
// Concurrency tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_first_requests_store_one_pyramid() {
    let inner = MemoryTileStore::new();
    peak_and_pit_terrain(&inner, 1).await;
    let tiles = Arc::new(BarrierTileStore {
        inner,
        barrier: Barrier::new(2),
    });
    let pyramids = Arc::new(MemoryPyramidStore::new());
    let service = Arc::new(service(pyramids.clone(), tiles));

    let a = {
        let service = service.clone();
        tokio::spawn(async move { service.get_pyramid(1, 1, "maximum").await })
    };
    let b = {
        let service = service.clone();
        tokio::spawn(async move { service.get_pyramid(1, 1, "maximum").await })
    };

    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();
    assert_eq!(a, b);
    assert_eq!(a.to_rows(), vec![vec![4.0, 1.0], vec![1.0, 1.0]]);

    // Both requests built and tried to store; only one pyramid exists
    assert_eq!(pyramids.put_calls(), 2);
    assert_eq!(pyramids.pyramid_count().await, 1);
    assert_eq!(pyramids.max_zoom_level(1, Metric::Maximum).await.unwrap(), Some(2));
}

#[tokio::test]
async fn test_pyramid_committed_between_lookup_and_range_check() {
    // Another request commits a 2-level pyramid after our first lookup misses
    let pyramids = Arc::new(CommitAfterMissStore {
        inner: MemoryPyramidStore::new(),
        pending: Mutex::new(Some(vec![
            Grid::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap(),
            Grid::filled(1, 1, 4.0),
        ])),
    });
    let service = PyramidService::new(pyramids.clone(), Arc::new(MemoryTileStore::new()));

    let root = service.get_pyramid(1, 1, "maximum").await.unwrap();
    assert_eq!(root, Grid::filled(1, 1, 4.0));

    // Served from the committed pyramid, no build of our own
    assert_eq!(pyramids.inner.put_calls(), 1);

    let err = service.get_pyramid(1, 2, "maximum").await.unwrap_err();
    assert!(matches!(
        err,
        TerrainError::ZoomLevelOutOfRange {
            requested: 2,
            max: 1
        }
    ));
}

#[tokio::test]
async fn test_failed_partial_write_leaves_no_levels() {
    let tiles = Arc::new(MemoryTileStore::new());
    peak_and_pit_terrain(&tiles, 1).await;
    let pyramids = Arc::new(FailingLevelStore {
        inner: MemoryPyramidStore::new(),
        fail_at: Mutex::new(Some(1)),
    });
    let service = PyramidService::new(pyramids.clone(), tiles);

    let err = service.get_pyramid(1, 0, "maximum").await.unwrap_err();
    assert!(matches!(err, TerrainError::DatabaseError(_)));

    // Level 0 was staged before the failure but never became visible
    for zoom_level in 0..=2 {
        assert_eq!(
            pyramids.get_level(1, zoom_level, Metric::Maximum).await.unwrap(),
            None
        );
    }
    assert_eq!(pyramids.max_zoom_level(1, Metric::Maximum).await.unwrap(), None);

    // The next request builds and stores the whole pyramid
    let root = service.get_pyramid(1, 2, "maximum").await.unwrap();
    assert_eq!(root, Grid::filled(1, 1, 4.0));
    assert_eq!(pyramids.inner.pyramid_count().await, 1);
    assert_eq!(pyramids.max_zoom_level(1, Metric::Maximum).await.unwrap(), Some(2));
}

// ============================================================================
// Assembly tests
// ============================================================================

#[test]
fn test_assembled_cells_match_source_tiles() {
    // 3 x 2 tiles of 2 rows x 3 columns, every cell value unique
    let (tile_h, tile_w) = (2usize, 3usize);
    let mut tiles = Vec::new();
    for y in 0..2u32 {
        for x in 0..3u32 {
            let data: Vec<f64> = (0..tile_h * tile_w)
                .map(|i| (y * 100 + x * 10) as f64 + i as f64)
                .collect();
            tiles.push(Tile::new(x, y, Grid::new(tile_w, tile_h, data).unwrap()));
        }
    }
    tiles.reverse();

    let grid = assemble_grid(&tiles).unwrap();
    assert_eq!(grid.shape(), (2 * tile_h, 3 * tile_w));

    for tile in &tiles {
        for r in 0..tile_h {
            for c in 0..tile_w {
                let row = tile.pos_y as usize * tile_h + r;
                let col = tile.pos_x as usize * tile_w + c;
                assert_eq!(grid.get(row, col), tile.data.get(r, c));
            }
        }
    }
}
