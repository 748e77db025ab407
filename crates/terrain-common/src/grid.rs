//! Dense 2D grids of terrain values.

use serde::{Deserialize, Serialize};

use crate::{TerrainError, TerrainResult};

/// A dense, row-major 2D array of `f64` values.
///
/// Serialized as nested rows (`[[1.0, 2.0], [3.0, 4.0]]`), which is also the
/// on-disk format of tile arrays and the persisted form of pyramid levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct Grid {
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl Grid {
    /// Create a grid from row-major data.
    pub fn new(width: usize, height: usize, data: Vec<f64>) -> TerrainResult<Self> {
        if data.len() != width * height {
            return Err(TerrainError::InconsistentTileShape(format!(
                "expected {} values for a {}x{} grid, got {}",
                width * height,
                height,
                width,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Create a grid with every cell set to `value`.
    pub fn filled(width: usize, height: usize, value: f64) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Build a grid from nested rows. All rows must have the same length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> TerrainResult<Self> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);

        let mut data = Vec::with_capacity(width * height);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(TerrainError::InconsistentTileShape(format!(
                    "row {} has {} values, expected {}",
                    i,
                    row.len(),
                    width
                )));
            }
            data.extend(row);
        }

        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Convert back into nested rows.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.height).map(|r| self.row(r).to_vec()).collect()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(height, width)`, i.e. `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at `(row, col)`, or `None` when outside the grid.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.height || col >= self.width {
            return None;
        }
        Some(self.data[row * self.width + col])
    }

    /// Set the value at `(row, col)`.
    ///
    /// # Panics
    /// Panics if the position is outside the grid.
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        assert!(
            row < self.height && col < self.width,
            "({}, {}) outside {}x{} grid",
            row,
            col,
            self.height,
            self.width
        );
        self.data[row * self.width + col] = value;
    }

    /// Borrow one row.
    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.width;
        &self.data[start..start + self.width]
    }

    /// Mutably borrow one row.
    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        let start = row * self.width;
        &mut self.data[start..start + self.width]
    }

    /// Raw row-major values.
    pub fn values(&self) -> &[f64] {
        &self.data
    }
}

impl TryFrom<Vec<Vec<f64>>> for Grid {
    type Error = TerrainError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        Grid::from_rows(rows)
    }
}

impl From<Grid> for Vec<Vec<f64>> {
    fn from(grid: Grid) -> Self {
        grid.to_rows()
    }
}
