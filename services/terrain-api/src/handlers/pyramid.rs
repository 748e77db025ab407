//! Pyramid level handler.

use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use terrain_common::{Grid, Metric};

use super::common::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PyramidQuery {
    /// Reduction metric name; `maximum` when omitted
    pub metric: Option<String>,
}

/// GET /terrain/:terrain_id/pyramid/:zoom_level - Values of one pyramid level
///
/// The first request for a (terrain, metric) pair builds and stores the
/// whole pyramid.
pub async fn pyramid_level_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((terrain_id, zoom_level)): Path<(i64, u32)>,
    Query(query): Query<PyramidQuery>,
) -> ApiResult<Json<Grid>> {
    let metric = query.metric.unwrap_or_else(|| Metric::default().to_string());

    let values = state
        .service
        .get_pyramid(terrain_id, zoom_level, &metric)
        .await?;
    Ok(Json(values))
}
