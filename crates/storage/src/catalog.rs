//! Terrain catalog using PostgreSQL.

use async_trait::async_trait;
use futures::future::try_join_all;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use terrain_common::{Grid, Metric, TerrainError, TerrainResult, TerrainSummary, Tile};

use crate::repository::{self, db_error, SCHEMA_SQL};
use crate::store::{PyramidStore, TileStore};
use crate::tile_arrays::TileArrayStore;

/// Database connection pool and catalog operations.
pub struct Catalog {
    pool: PgPool,
}

impl Catalog {
    /// Create a new catalog connection from database URL.
    pub async fn connect(database_url: &str, max_connections: u32) -> TerrainResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| TerrainError::ServiceUnavailable(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> TerrainResult<()> {
        // Split SQL statements and execute them individually
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| db_error("Migration failed", e))?;
            }
        }

        info!("Catalog schema is up to date");
        Ok(())
    }

    /// Create a terrain and return its id.
    pub async fn create_terrain(&self, name: &str) -> TerrainResult<i64> {
        let mut conn = self.acquire().await?;
        let id = repository::insert_terrain(&mut conn, name).await?;
        info!(terrain_id = id, name, "Registered terrain");
        Ok(id)
    }

    /// Register the array file of a tile at (pos_x, pos_y) and return the tile id.
    pub async fn register_tile(
        &self,
        terrain_id: i64,
        path: &str,
        is_remote: bool,
        pos_x: u32,
        pos_y: u32,
    ) -> TerrainResult<i64> {
        let mut conn = self.acquire().await?;
        repository::insert_tile_record(&mut conn, terrain_id, path, is_remote, pos_x, pos_y).await
    }

    /// Whether the catalog holds no terrains yet.
    pub async fn is_empty(&self) -> TerrainResult<bool> {
        let mut conn = self.acquire().await?;
        Ok(repository::list_terrains(&mut conn).await?.is_empty())
    }

    async fn acquire(&self) -> TerrainResult<sqlx::pool::PoolConnection<sqlx::Postgres>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| db_error("Failed to acquire connection", e))
    }
}

#[async_trait]
impl PyramidStore for Catalog {
    #[instrument(skip(self, metric), fields(metric = %metric))]
    async fn get_level(
        &self,
        terrain_id: i64,
        zoom_level: u32,
        metric: Metric,
    ) -> TerrainResult<Option<Grid>> {
        let mut conn = self.acquire().await?;
        let level = repository::get_level(&mut conn, terrain_id, zoom_level, metric).await?;
        Ok(level.map(|l| l.values))
    }

    async fn max_zoom_level(&self, terrain_id: i64, metric: Metric) -> TerrainResult<Option<u32>> {
        let mut conn = self.acquire().await?;
        repository::max_zoom_level(&mut conn, terrain_id, metric).await
    }

    #[instrument(skip(self, metric, levels), fields(metric = %metric, levels = levels.len()))]
    async fn put_levels(
        &self,
        terrain_id: i64,
        metric: Metric,
        levels: &[Grid],
    ) -> TerrainResult<()> {
        if levels.is_empty() {
            return Err(TerrainError::InternalError(
                "refusing to persist an empty pyramid".to_string(),
            ));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        // On error the transaction is dropped here, which rolls it back.
        repository::insert_levels(&mut tx, terrain_id, metric, levels).await?;

        tx.commit()
            .await
            .map_err(|e| db_error("Commit failed", e))?;

        debug!("Persisted pyramid");
        Ok(())
    }

    async fn ping(&self) -> TerrainResult<()> {
        let mut conn = self.acquire().await?;
        repository::ping(&mut conn).await
    }
}

/// Tile store backed by the catalog for positions and by tile array files for values.
pub struct CatalogTileStore {
    catalog: Arc<Catalog>,
    arrays: TileArrayStore,
}

impl CatalogTileStore {
    pub fn new(catalog: Arc<Catalog>, arrays: TileArrayStore) -> Self {
        Self { catalog, arrays }
    }
}

#[async_trait]
impl TileStore for CatalogTileStore {
    async fn list_terrains(&self) -> TerrainResult<Vec<TerrainSummary>> {
        let mut conn = self.catalog.acquire().await?;
        repository::list_terrains(&mut conn).await
    }

    #[instrument(skip(self))]
    async fn list_tiles(&self, terrain_id: i64) -> TerrainResult<Vec<Tile>> {
        let records = {
            let mut conn = self.catalog.acquire().await?;
            repository::list_tile_records(&mut conn, terrain_id).await?
        };
        debug!(tiles = records.len(), "Loading tile arrays");

        // Arrays of one terrain are independent; fetch them concurrently.
        try_join_all(records.iter().map(|record| async move {
            let data = self.arrays.load(record).await?;
            Ok::<_, TerrainError>(Tile::new(record.pos_x, record.pos_y, data).with_id(record.id))
        }))
        .await
    }

    #[instrument(skip(self))]
    async fn get_tile(&self, tile_id: i64) -> TerrainResult<Option<Tile>> {
        let record = {
            let mut conn = self.catalog.acquire().await?;
            repository::get_tile_record(&mut conn, tile_id).await?
        };

        let Some(record) = record else {
            return Ok(None);
        };

        let data = self.arrays.load(&record).await?;
        Ok(Some(
            Tile::new(record.pos_x, record.pos_y, data).with_id(record.id),
        ))
    }
}
