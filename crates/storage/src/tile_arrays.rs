//! Tile array access on the local filesystem or behind remote URLs.

use bytes::Bytes;
use npyz::{DType, NpyFile, Order};
use object_store::{local::LocalFileSystem, path::Path, ObjectStore};
use std::sync::Arc;
use tracing::{debug, instrument};

use terrain_common::{Grid, TerrainError, TerrainResult, TileRecord};

/// Reader for raw tile arrays.
///
/// A tile array is either a NumPy `.npy` file holding a 2D numeric array or
/// a JSON document with nested rows (`[[0.0, 12.5, ...], ...]`). Local paths
/// are resolved against the data directory; records flagged `is_remote` are
/// fetched over HTTP.
pub struct TileArrayStore {
    local: Arc<dyn ObjectStore>,
    http: reqwest::Client,
}

impl TileArrayStore {
    /// Create a reader rooted at `data_dir`.
    pub fn new(data_dir: impl AsRef<std::path::Path>) -> TerrainResult<Self> {
        let data_dir = data_dir.as_ref();
        let local = LocalFileSystem::new_with_prefix(data_dir).map_err(|e| {
            TerrainError::StorageError(format!(
                "Failed to open tile data directory {}: {}",
                data_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            local: Arc::new(local),
            http: reqwest::Client::new(),
        })
    }

    /// Load and parse the array of a tile.
    #[instrument(skip(self, record), fields(tile_id = record.id, path = %record.path, remote = record.is_remote))]
    pub async fn load(&self, record: &TileRecord) -> TerrainResult<Grid> {
        let bytes = if record.is_remote {
            self.fetch_remote(&record.path).await?
        } else {
            self.read_local(&record.path).await?
        };

        debug!(size = bytes.len(), "Read tile array");
        parse_tile_array(&bytes)
    }

    /// Write a tile array as JSON below the data directory, replacing any
    /// existing file.
    pub async fn store_local(&self, path: &str, grid: &Grid) -> TerrainResult<()> {
        let location = Path::parse(path)
            .map_err(|e| TerrainError::StorageError(format!("Invalid tile path {}: {}", path, e)))?;
        let body = serde_json::to_vec(grid)?;

        self.local
            .put(&location, Bytes::from(body))
            .await
            .map_err(|e| TerrainError::StorageError(format!("Failed to write {}: {}", path, e)))?;

        debug!(path, "Wrote tile array");
        Ok(())
    }

    async fn read_local(&self, path: &str) -> TerrainResult<Bytes> {
        let location = Path::parse(path)
            .map_err(|e| TerrainError::StorageError(format!("Invalid tile path {}: {}", path, e)))?;

        let result = self
            .local
            .get(&location)
            .await
            .map_err(|e| TerrainError::StorageError(format!("Failed to read {}: {}", path, e)))?;

        result
            .bytes()
            .await
            .map_err(|e| TerrainError::StorageError(format!("Failed to read bytes: {}", e)))
    }

    async fn fetch_remote(&self, url: &str) -> TerrainResult<Bytes> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| TerrainError::StorageError(format!("Failed to fetch {}: {}", url, e)))?;

        response
            .bytes()
            .await
            .map_err(|e| TerrainError::StorageError(format!("Failed to read body of {}: {}", url, e)))
    }
}

/// Leading bytes of every `.npy` file.
const NPY_MAGIC: &[u8] = b"\x93NUMPY";

/// Parse a tile array into a grid. `.npy` content is recognized by its magic
/// bytes, anything else is read as JSON.
pub fn parse_tile_array(bytes: &[u8]) -> TerrainResult<Grid> {
    if bytes.starts_with(NPY_MAGIC) {
        return parse_npy(bytes);
    }
    let rows: Vec<Vec<f64>> = serde_json::from_slice(bytes)?;
    Grid::from_rows(rows)
}

fn parse_npy(bytes: &[u8]) -> TerrainResult<Grid> {
    let npy = NpyFile::new(bytes)?;

    let (rows, cols) = match npy.shape() {
        [rows, cols] => (*rows as usize, *cols as usize),
        shape => {
            return Err(TerrainError::InconsistentTileShape(format!(
                "expected a 2D array, got shape {:?}",
                shape
            )))
        }
    };
    let order = npy.order();
    let type_str = match npy.dtype() {
        DType::Plain(type_str) => type_str.to_string(),
        other => {
            return Err(TerrainError::StorageError(format!(
                "unsupported tile array dtype {:?}",
                other
            )))
        }
    };

    // Type strings look like "<f8" or "|u1"; the first character is the byte order.
    let values: Vec<f64> = match type_str.get(1..).unwrap_or_default() {
        "f8" => npy.into_vec::<f64>()?,
        "f4" => widen(npy.into_vec::<f32>()?),
        "i8" => npy.into_vec::<i64>()?.into_iter().map(|v| v as f64).collect(),
        "i4" => widen(npy.into_vec::<i32>()?),
        "i2" => widen(npy.into_vec::<i16>()?),
        "i1" => widen(npy.into_vec::<i8>()?),
        "u8" => npy.into_vec::<u64>()?.into_iter().map(|v| v as f64).collect(),
        "u4" => widen(npy.into_vec::<u32>()?),
        "u2" => widen(npy.into_vec::<u16>()?),
        "u1" => widen(npy.into_vec::<u8>()?),
        _ => {
            return Err(TerrainError::StorageError(format!(
                "unsupported tile array dtype {}",
                type_str
            )))
        }
    };

    match order {
        Order::C => Grid::new(cols, rows, values),
        Order::Fortran => {
            if values.len() != rows * cols {
                return Err(TerrainError::InconsistentTileShape(format!(
                    "expected {} values for a {}x{} array, got {}",
                    rows * cols,
                    rows,
                    cols,
                    values.len()
                )));
            }
            let mut grid = Grid::filled(cols, rows, 0.0);
            for r in 0..rows {
                for (c, cell) in grid.row_mut(r).iter_mut().enumerate() {
                    *cell = values[c * rows + r];
                }
            }
            Ok(grid)
        }
    }
}

fn widen<T: Into<f64>>(values: Vec<T>) -> Vec<f64> {
    values.into_iter().map(Into::into).collect()
}
