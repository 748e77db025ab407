//! Downsampling functions for generating pyramid levels.
//!
//! Each level halves both dimensions of its predecessor by reducing
//! non-overlapping 2x2 blocks with the requested [`Metric`].

use terrain_common::{Grid, Metric};

/// Reduce the four values of a 2x2 block to one value.
///
/// This is the reducer table for [`Metric`]: adding a metric means adding
/// an arm here.
#[inline]
pub fn reduce_block(metric: Metric, block: [f64; 4]) -> f64 {
    match metric {
        Metric::Maximum => block.into_iter().fold(f64::NEG_INFINITY, f64::max),
        Metric::Minimum => block.into_iter().fold(f64::INFINITY, f64::min),
        Metric::Average => block.iter().sum::<f64>() / 4.0,
    }
}

/// Downsample a 2D grid by a factor of 2.
///
/// Takes a grid of size (height, width) and produces a grid of size
/// (height/2, width/2), rounded down for odd dimensions. A trailing row or
/// column that does not fill a whole 2x2 block is dropped, not padded.
pub fn downsample_2x(grid: &Grid, metric: Metric) -> Grid {
    let new_width = grid.width() / 2;
    let new_height = grid.height() / 2;

    let mut output = Grid::filled(new_width, new_height, 0.0);

    for out_y in 0..new_height {
        let top = grid.row(out_y * 2);
        let bottom = grid.row(out_y * 2 + 1);
        let out_row = output.row_mut(out_y);
        for (out_x, cell) in out_row.iter_mut().enumerate() {
            let in_x = out_x * 2;
            *cell = reduce_block(
                metric,
                [top[in_x], top[in_x + 1], bottom[in_x], bottom[in_x + 1]],
            );
        }
    }

    output
}

/// Generate all pyramid levels for a grid.
///
/// Level 0 is the input grid itself. Levels are added by repeated
/// [`downsample_2x`] while the current level has more than one cell, so the
/// last level is the single-cell root. For grids whose shorter side runs out
/// first (e.g. 2x8), the last level is the degenerate empty grid produced
/// by truncation.
pub fn build_pyramid(grid: Grid, metric: Metric) -> Vec<Grid> {
    let mut levels = Vec::new();
    let mut current = grid;

    while current.len() > 1 {
        let next = downsample_2x(&current, metric);
        levels.push(std::mem::replace(&mut current, next));
    }
    levels.push(current);

    levels
}
