//! Error types for terrain pyramid services.

use thiserror::Error;

/// Result type alias using TerrainError.
pub type TerrainResult<T> = Result<T, TerrainError>;

/// Primary error type for terrain and pyramid operations.
#[derive(Debug, Error)]
pub enum TerrainError {
    // === Terrain Data Errors ===
    #[error("Incomplete tile grid: no tile at position ({missing_x}, {missing_y})")]
    IncompleteGrid { missing_x: u32, missing_y: u32 },

    #[error("Inconsistent tile shape: {0}")]
    InconsistentTileShape(String),

    #[error("Overlapping tiles at position ({pos_x}, {pos_y})")]
    OverlappingTiles { pos_x: u32, pos_y: u32 },

    // === Request Errors ===
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Terrain not found: {0}")]
    TerrainNotFound(i64),

    #[error("Tile not found: {0}")]
    TileNotFound(i64),

    #[error("Zoom level {requested} is out of range (maximum is {max})")]
    ZoomLevelOutOfRange { requested: u32, max: u32 },

    // === Persistence Errors ===
    #[error("Pyramid already exists for terrain {terrain_id} with metric '{metric}'")]
    DuplicatePyramid { terrain_id: i64, metric: String },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    // === Infrastructure Errors ===
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl TerrainError {
    /// Stable machine-readable code for this error, used in JSON error bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            TerrainError::IncompleteGrid { .. } => "IncompleteGrid",
            TerrainError::InconsistentTileShape(_) => "InconsistentTileShape",
            TerrainError::OverlappingTiles { .. } => "OverlappingTiles",
            TerrainError::UnknownMetric(_) => "UnknownMetric",
            TerrainError::TerrainNotFound(_) => "TerrainNotFound",
            TerrainError::TileNotFound(_) => "TileNotFound",
            TerrainError::ZoomLevelOutOfRange { .. } => "ZoomLevelOutOfRange",
            TerrainError::DuplicatePyramid { .. } => "DuplicatePyramid",
            TerrainError::DatabaseError(_) => "DatabaseError",
            TerrainError::StorageError(_) => "StorageError",
            TerrainError::ServiceUnavailable(_) => "ServiceUnavailable",
            TerrainError::InternalError(_) => "InternalError",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            TerrainError::UnknownMetric(_) => 400,

            TerrainError::TerrainNotFound(_)
            | TerrainError::TileNotFound(_)
            | TerrainError::ZoomLevelOutOfRange { .. } => 404,

            TerrainError::DuplicatePyramid { .. } => 409,

            TerrainError::IncompleteGrid { .. }
            | TerrainError::InconsistentTileShape(_)
            | TerrainError::OverlappingTiles { .. } => 422,

            TerrainError::ServiceUnavailable(_) => 503,

            _ => 500,
        }
    }

    /// Whether the error describes malformed terrain data rather than a bad request.
    pub fn is_bad_terrain_data(&self) -> bool {
        matches!(
            self,
            TerrainError::IncompleteGrid { .. }
                | TerrainError::InconsistentTileShape(_)
                | TerrainError::OverlappingTiles { .. }
        )
    }
}

impl From<std::io::Error> for TerrainError {
    fn from(err: std::io::Error) -> Self {
        TerrainError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for TerrainError {
    fn from(err: serde_json::Error) -> Self {
        TerrainError::StorageError(format!("JSON error: {}", err))
    }
}
