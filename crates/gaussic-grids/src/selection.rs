//! Centroids of flagged-cell selections under periodic wrapping.

use num_traits::{Float, FromPrimitive};

use crate::error::{GridError, Result};
use crate::grid::Grid;

/// Centroid of a set of flagged cells, accumulated as wrapped differences
/// from the first cell so that selections straddling the periodic seam are
/// handled correctly.
///
/// A selection whose wrapped extent exceeds half the box on any axis has
/// no well-defined centroid and is rejected.
pub fn selection_centroid<T: Float + FromPrimitive>(
    grid: &Grid<T>,
    cells: &[usize],
) -> Result<[T; 3]> {
    let first = *cells.first().ok_or(GridError::EmptySelection)?;
    let anchor = grid.cell_centroid(first);

    let mut sum = [T::zero(); 3];
    let mut min_delta = [T::zero(); 3];
    let mut max_delta = [T::zero(); 3];
    for &cell in cells {
        let p = grid.cell_centroid(cell);
        for d in 0..3 {
            let delta = grid.wrapped_delta(p[d], anchor[d]);
            sum[d] = sum[d] + delta;
            if delta < min_delta[d] {
                min_delta[d] = delta;
            }
            if delta > max_delta[d] {
                max_delta[d] = delta;
            }
        }
    }

    let half = grid.boxsize() / T::from_f64(2.0).unwrap();
    let count = T::from_usize(cells.len()).unwrap();
    let mut centroid = [T::zero(); 3];
    for d in 0..3 {
        let span = max_delta[d] - min_delta[d];
        if span > half {
            return Err(GridError::SelectionTooWide {
                axis: d,
                span: span.to_f64().unwrap_or(f64::NAN),
                boxsize: grid.boxsize().to_f64().unwrap_or(f64::NAN),
            });
        }
        centroid[d] = anchor[d] + sum[d] / count;
    }
    Ok(centroid)
}
