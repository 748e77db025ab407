//! Terrain listing handler.

use axum::{extract::Extension, Json};
use std::sync::Arc;

use terrain_common::TerrainSummary;

use super::common::ApiResult;
use crate::state::AppState;

/// GET /terrain/ - All terrains with their tile counts
pub async fn list_terrains_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> ApiResult<Json<Vec<TerrainSummary>>> {
    let terrains = state.service.tiles().list_terrains().await?;
    Ok(Json(terrains))
}
