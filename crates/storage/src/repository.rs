//! Repository functions over an explicit PostgreSQL connection.
//!
//! Every function takes the connection (or an open transaction, which derefs
//! to one) from the caller, so transaction boundaries are decided by the
//! caller and no session state is kept between calls.

use sqlx::types::Json;
use sqlx::{FromRow, PgConnection};

use terrain_common::{Grid, Metric, PyramidLevel, TerrainError, TerrainResult, TerrainSummary, TileRecord};

/// Map a sqlx error to the terrain error taxonomy.
///
/// Connectivity problems become `ServiceUnavailable` so the HTTP layer can
/// answer 503; everything else is a plain database error.
pub fn db_error(context: &str, err: sqlx::Error) -> TerrainError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            TerrainError::ServiceUnavailable(format!("{}: {}", context, err))
        }
        other => TerrainError::DatabaseError(format!("{}: {}", context, other)),
    }
}

/// List terrains with the number of tiles each one owns.
pub async fn list_terrains(conn: &mut PgConnection) -> TerrainResult<Vec<TerrainSummary>> {
    let rows = sqlx::query_as::<_, TerrainRow>(
        "SELECT t.id, t.name, COUNT(tt.id) AS tile_count \
         FROM terrain t LEFT JOIN terrain_tile tt ON tt.terrain_id = t.id \
         GROUP BY t.id, t.name ORDER BY t.id",
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| db_error("Query failed", e))?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Create a terrain and return its id.
pub async fn insert_terrain(conn: &mut PgConnection, name: &str) -> TerrainResult<i64> {
    sqlx::query_scalar::<_, i64>("INSERT INTO terrain (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| db_error("Insert failed", e))
}

/// Register the array file of one tile and return the tile id.
///
/// A second tile at an occupied position is rejected with `OverlappingTiles`.
pub async fn insert_tile_record(
    conn: &mut PgConnection,
    terrain_id: i64,
    path: &str,
    is_remote: bool,
    pos_x: u32,
    pos_y: u32,
) -> TerrainResult<i64> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO terrain_tile (terrain_id, path, is_remote, pos_x, pos_y) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(terrain_id)
    .bind(path)
    .bind(is_remote)
    .bind(pos_x as i32)
    .bind(pos_y as i32)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            TerrainError::OverlappingTiles { pos_x, pos_y }
        }
        sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
            TerrainError::TerrainNotFound(terrain_id)
        }
        other => db_error("Insert failed", other),
    })
}

/// All tile records of one terrain.
pub async fn list_tile_records(
    conn: &mut PgConnection,
    terrain_id: i64,
) -> TerrainResult<Vec<TileRecord>> {
    let rows = sqlx::query_as::<_, TileRow>(
        "SELECT id, terrain_id, path, is_remote, pos_x, pos_y FROM terrain_tile \
         WHERE terrain_id = $1 ORDER BY pos_y, pos_x",
    )
    .bind(terrain_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| db_error("Query failed", e))?;

    rows.into_iter().map(TryInto::try_into).collect()
}

/// A single tile record by id.
pub async fn get_tile_record(
    conn: &mut PgConnection,
    tile_id: i64,
) -> TerrainResult<Option<TileRecord>> {
    let row = sqlx::query_as::<_, TileRow>(
        "SELECT id, terrain_id, path, is_remote, pos_x, pos_y FROM terrain_tile WHERE id = $1",
    )
    .bind(tile_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| db_error("Query failed", e))?;

    row.map(TryInto::try_into).transpose()
}

/// Fetch one pyramid level.
pub async fn get_level(
    conn: &mut PgConnection,
    terrain_id: i64,
    zoom_level: u32,
    metric: Metric,
) -> TerrainResult<Option<PyramidLevel>> {
    let row = sqlx::query_as::<_, LevelRow>(
        "SELECT terrain_id, zoom_level, width, height, cell_values FROM terrain_pyramid \
         WHERE terrain_id = $1 AND zoom_level = $2 AND metric = $3",
    )
    .bind(terrain_id)
    .bind(zoom_level as i32)
    .bind(metric.as_str())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| db_error("Query failed", e))?;

    Ok(row.map(|r| {
        // Nested-row JSON cannot carry the width of a level without rows.
        let values = if r.cell_values.0.is_empty() {
            Grid::filled(r.width.max(0) as usize, r.height.max(0) as usize, 0.0)
        } else {
            r.cell_values.0
        };
        PyramidLevel {
            terrain_id: r.terrain_id,
            zoom_level: r.zoom_level as u32,
            metric,
            values,
        }
    }))
}

/// Highest persisted zoom level for (terrain, metric).
pub async fn max_zoom_level(
    conn: &mut PgConnection,
    terrain_id: i64,
    metric: Metric,
) -> TerrainResult<Option<u32>> {
    let max = sqlx::query_scalar::<_, Option<i32>>(
        "SELECT MAX(zoom_level) FROM terrain_pyramid WHERE terrain_id = $1 AND metric = $2",
    )
    .bind(terrain_id)
    .bind(metric.as_str())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| db_error("Query failed", e))?;

    Ok(max.map(|z| z as u32))
}

/// Insert every level of a pyramid, level 0 first.
///
/// Must run inside a transaction owned by the caller. The unique constraint on
/// (terrain_id, zoom_level, metric) turns a concurrent or repeated insert into
/// `DuplicatePyramid`; the caller then drops the transaction so none of the
/// rows written here become visible.
pub async fn insert_levels(
    conn: &mut PgConnection,
    terrain_id: i64,
    metric: Metric,
    levels: &[Grid],
) -> TerrainResult<()> {
    for (zoom_level, values) in levels.iter().enumerate() {
        sqlx::query(
            "INSERT INTO terrain_pyramid (terrain_id, zoom_level, metric, width, height, cell_values) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(terrain_id)
        .bind(zoom_level as i32)
        .bind(metric.as_str())
        .bind(values.width() as i32)
        .bind(values.height() as i32)
        .bind(Json(values))
        .execute(&mut *conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                TerrainError::DuplicatePyramid {
                    terrain_id,
                    metric: metric.to_string(),
                }
            }
            other => db_error("Insert failed", other),
        })?;
    }

    Ok(())
}

/// Check connectivity.
pub async fn ping(conn: &mut PgConnection) -> TerrainResult<()> {
    sqlx::query("SELECT 1")
        .execute(&mut *conn)
        .await
        .map_err(|e| db_error("Ping failed", e))?;
    Ok(())
}

/// Internal row type for terrain listings.
#[derive(FromRow)]
struct TerrainRow {
    id: i64,
    name: String,
    tile_count: i64,
}

impl From<TerrainRow> for TerrainSummary {
    fn from(row: TerrainRow) -> Self {
        TerrainSummary {
            id: row.id,
            name: row.name,
            tile_count: row.tile_count,
        }
    }
}

/// Internal row type for tile records.
#[derive(FromRow)]
struct TileRow {
    id: i64,
    terrain_id: i64,
    path: String,
    is_remote: bool,
    pos_x: i32,
    pos_y: i32,
}

impl TryFrom<TileRow> for TileRecord {
    type Error = TerrainError;

    fn try_from(row: TileRow) -> Result<Self, Self::Error> {
        let position = |v: i32| {
            u32::try_from(v).map_err(|_| {
                TerrainError::DatabaseError(format!("tile {} has negative position {}", row.id, v))
            })
        };

        Ok(TileRecord {
            id: row.id,
            terrain_id: row.terrain_id,
            pos_x: position(row.pos_x)?,
            pos_y: position(row.pos_y)?,
            path: row.path,
            is_remote: row.is_remote,
        })
    }
}

/// Internal row type for pyramid levels.
#[derive(FromRow)]
struct LevelRow {
    terrain_id: i64,
    zoom_level: i32,
    width: i32,
    height: i32,
    cell_values: Json<Grid>,
}

/// Database schema SQL.
pub(crate) const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS terrain (
    id BIGSERIAL PRIMARY KEY,
    name VARCHAR(200) NOT NULL DEFAULT 'no name'
);

CREATE TABLE IF NOT EXISTS terrain_tile (
    id BIGSERIAL PRIMARY KEY,
    terrain_id BIGINT NOT NULL REFERENCES terrain(id),
    path TEXT NOT NULL,
    is_remote BOOLEAN NOT NULL DEFAULT FALSE,
    pos_x INTEGER NOT NULL CHECK (pos_x >= 0),
    pos_y INTEGER NOT NULL CHECK (pos_y >= 0),

    UNIQUE(terrain_id, pos_x, pos_y)
);

CREATE INDEX IF NOT EXISTS idx_terrain_tile_terrain ON terrain_tile(terrain_id);

CREATE TABLE IF NOT EXISTS terrain_pyramid (
    id BIGSERIAL PRIMARY KEY,
    terrain_id BIGINT NOT NULL REFERENCES terrain(id),
    zoom_level INTEGER NOT NULL CHECK (zoom_level >= 0),
    metric VARCHAR(50) NOT NULL,
    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    cell_values JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    UNIQUE(terrain_id, zoom_level, metric)
);
"#;
