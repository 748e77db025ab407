//! Tile statistics handler.

use axum::{
    extract::{Extension, Path},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use pyramid::{tile_statistics, TileStatistics};
use terrain_common::TerrainError;

use super::common::ApiResult;
use crate::state::AppState;

/// GET /terrain/tile/:tile_id/stats - Summary statistics of one tile
///
/// `Dimensions` keeps the established response format: `Width` is the
/// number of rows and `Height` the number of columns of the tile array.
pub async fn tile_stats_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(tile_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let tile = state
        .service
        .tiles()
        .get_tile(tile_id)
        .await?
        .ok_or(TerrainError::TileNotFound(tile_id))?;

    let stats = tile_statistics(&tile)?;
    Ok(Json(format_statistics(&stats)))
}

fn format_statistics(stats: &TileStatistics) -> Value {
    json!({
        "Tile Information": {
            "Position": { "X": stats.pos_x, "Y": stats.pos_y },
            "Dimensions": { "Width": stats.rows, "Height": stats.columns },
        },
        "Statistics": {
            "Average Value": (stats.average * 100.0).round() / 100.0,
            "Max Values per Row": stats.max_per_row,
            "Min Values per Column": stats.min_per_col,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_statistics() {
        let stats = TileStatistics {
            pos_x: 3,
            pos_y: 4,
            rows: 1,
            columns: 2,
            average: 2.0 / 3.0,
            max_per_row: vec![1.0],
            min_per_col: vec![0.0, 1.0],
        };

        let value = format_statistics(&stats);
        assert_eq!(value["Tile Information"]["Position"]["X"], 3);
        assert_eq!(value["Tile Information"]["Dimensions"]["Width"], 1);
        assert_eq!(value["Tile Information"]["Dimensions"]["Height"], 2);
        assert_eq!(value["Statistics"]["Average Value"], 0.67);
        assert_eq!(value["Statistics"]["Min Values per Column"], json!([0.0, 1.0]));
    }
}
