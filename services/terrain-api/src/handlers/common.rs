//! Error rendering shared by all handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use terrain_common::TerrainError;

/// JSON body of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub description: String,
}

/// Handler error carrying a [`TerrainError`] to the response.
#[derive(Debug)]
pub struct ApiError(pub TerrainError);

impl From<TerrainError> for ApiError {
    fn from(err: TerrainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(code = self.0.error_code(), error = %self.0, "Request failed");
        } else if self.0.is_bad_terrain_data() {
            // Stored tiles are broken; the caller cannot fix this by retrying.
            warn!(code = self.0.error_code(), error = %self.0, "Terrain data rejected");
        } else {
            debug!(code = self.0.error_code(), error = %self.0, "Request rejected");
        }

        let body = ErrorBody {
            code: self.0.error_code(),
            description: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
