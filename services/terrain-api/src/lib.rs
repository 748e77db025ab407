//! Terrain API Service Library
//!
//! HTTP server exposing terrain listings, per-tile statistics and cached
//! multi-resolution pyramid levels.

pub mod config;
pub mod handlers;
pub mod seed;
pub mod state;

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Terrain catalog
        .route("/terrain", get(handlers::terrain::list_terrains_handler))
        .route("/terrain/", get(handlers::terrain::list_terrains_handler))
        // Tile statistics
        .route(
            "/terrain/tile/:tile_id/stats",
            get(handlers::tiles::tile_stats_handler),
        )
        // Pyramid levels
        .route(
            "/terrain/:terrain_id/pyramid/:zoom_level",
            get(handlers::pyramid::pyramid_level_handler),
        )
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/ready", get(handlers::health::ready_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        // Middleware
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
