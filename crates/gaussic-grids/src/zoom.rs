//! Placement of a zoom window inside a parent grid.

use num_traits::{Float, FromPrimitive};

use crate::error::{GridError, Result};
use crate::grid::Grid;

/// A zoom window expressed in parent-grid cells: the low corner and the
/// window side `n_parent / zoom_factor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomWindow {
    /// Low corner of the window, in parent cell coordinates
    pub origin: [usize; 3],
    /// Side of the window, in parent cells
    pub side: usize,
    /// Refinement factor relative to the parent
    pub zoom_factor: usize,
}

impl ZoomWindow {
    /// Whether a parent cell coordinate lies inside the window.
    pub fn contains(&self, coord: [usize; 3]) -> bool {
        (0..3).all(|d| coord[d] >= self.origin[d] && coord[d] < self.origin[d] + self.side)
    }

    /// World-space low corner of the window.
    pub fn offset_lower<T: Float + FromPrimitive>(&self, parent: &Grid<T>) -> [T; 3] {
        let parent_off = parent.offset_lower();
        let mut out = [T::zero(); 3];
        for d in 0..3 {
            out[d] = parent_off[d] + T::from_usize(self.origin[d]).unwrap() * parent.dx();
        }
        out
    }
}

/// Choose the zoom window that encloses the flagged parent cells, centred
/// on their bounding box and clamped to the parent's corners.
///
/// With `allow_strays` false, flagged cells that cannot fit in a window of
/// side `n_parent / zoom_factor` are an error; with it true the caller is
/// expected to interpolate the spilled cells from the parent.
pub fn zoom_window<T: Float + FromPrimitive>(
    parent: &Grid<T>,
    flagged: &[usize],
    zoom_factor: usize,
    allow_strays: bool,
) -> Result<ZoomWindow> {
    if flagged.is_empty() {
        return Err(GridError::EmptySelection);
    }
    let n = parent.n();
    let side = n / zoom_factor;

    let mut lo = [n; 3];
    let mut hi = [0usize; 3];
    for &cell in flagged {
        let coord = parent.cell_coordinate(cell);
        for d in 0..3 {
            lo[d] = lo[d].min(coord[d]);
            hi[d] = hi[d].max(coord[d]);
        }
    }

    let mut origin = [0usize; 3];
    for d in 0..3 {
        let extent = hi[d] - lo[d] + 1;
        if extent > side && !allow_strays {
            return Err(GridError::ZoomDoesNotFit {
                axis: d,
                extent,
                window: side,
            });
        }
        // centre the window on the bounding box, then clamp to the parent
        let centre = (lo[d] + hi[d]) / 2;
        let half_window = n / (2 * zoom_factor);
        origin[d] = centre.saturating_sub(half_window).min(n - side);
    }

    Ok(ZoomWindow {
        origin,
        side,
        zoom_factor,
    })
}
