//! Application state for the terrain API.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::info;

use pyramid::PyramidService;
use storage::{Catalog, CatalogTileStore, MemoryPyramidStore, MemoryTileStore, TileArrayStore};

use crate::config::ApiConfig;
use crate::seed;

/// Shared application state.
pub struct AppState {
    /// Pyramid queries plus access to the underlying tile and pyramid stores.
    pub service: PyramidService,

    /// Renders the process-wide Prometheus registry.
    pub prometheus: PrometheusHandle,
}

impl AppState {
    /// Create the state described by the configuration.
    ///
    /// Connects to the catalog and brings its schema up to date, unless the
    /// service runs in memory.
    pub async fn new(config: &ApiConfig, prometheus: PrometheusHandle) -> Result<Self> {
        if config.in_memory {
            let tiles = Arc::new(MemoryTileStore::new());
            seed::seed_memory(&tiles).await?;
            info!("Serving demo terrains from memory");
            return Ok(Self::in_memory(tiles, prometheus));
        }

        let catalog = Arc::new(
            Catalog::connect(&config.database_url, config.database_max_connections)
                .await
                .context("Failed to connect to the terrain catalog")?,
        );
        catalog.migrate().await?;

        let arrays = TileArrayStore::new(&config.tile_data_dir)?;
        if config.seed_demo {
            seed::seed_catalog(&catalog, &arrays).await?;
        }

        let tiles = Arc::new(CatalogTileStore::new(catalog.clone(), arrays));
        Ok(Self {
            service: PyramidService::new(catalog, tiles),
            prometheus,
        })
    }

    /// State over an in-memory tile store and a fresh in-memory pyramid store.
    pub fn in_memory(tiles: Arc<MemoryTileStore>, prometheus: PrometheusHandle) -> Self {
        Self {
            service: PyramidService::new(Arc::new(MemoryPyramidStore::new()), tiles),
            prometheus,
        }
    }
}
