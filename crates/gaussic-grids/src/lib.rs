//! Cubic-lattice geometry for the gaussic initial-conditions engine.
//!
//! This crate is pure index arithmetic: grids own no field values. It
//! provides
//!
//! - [`Grid`]: an immutable `n^3` periodic lattice with a physical box
//!   length and a world-space offset, mapping linear indices to cell
//!   coordinates, centroids and signed-range Fourier wavevectors;
//! - [`selection_centroid`]: centroids of flagged-cell sets under periodic
//!   wrapping;
//! - [`zoom_window`]: placement of a nested refinement window around a
//!   flagged selection.
//!
//! # Example
//!
//! ```
//! use gaussic_grids::Grid;
//!
//! let grid = Grid::<f64>::new(32, 100.0).unwrap();
//! assert_eq!(grid.size3(), 32 * 32 * 32);
//! assert!((grid.dx() - 3.125).abs() < 1e-12);
//!
//! // Fourier indices use the signed range [-n/2, n/2)
//! let cell = grid.fourier_cells().nth(1).unwrap();
//! assert_eq!(cell.mode, [0, 0, 1]);
//! ```

pub mod error;
pub mod grid;
pub mod selection;
pub mod zoom;

pub use error::{GridError, Result};
pub use grid::{Cell, FourierCell, Grid};
pub use selection::selection_centroid;
pub use zoom::{zoom_window, ZoomWindow};
