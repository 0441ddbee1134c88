//! Error types for gaussic-grids

use thiserror::Error;

/// Result type for grid operations
pub type Result<T> = std::result::Result<T, GridError>;

/// Errors that can occur during grid geometry operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    /// Grid side length must be positive and even
    #[error("Grid side length must be a positive even number, got {0}")]
    InvalidSideLength(usize),

    /// Box length must be positive
    #[error("Box length must be positive, got {0}")]
    InvalidBoxLength(f64),

    /// A grid that exists cannot be created again
    #[error("The base grid is already initialized and cannot be re-created")]
    AlreadyInitialized,

    /// Cell index out of bounds
    #[error("Cell index {index} out of bounds for a grid of {len} cells")]
    IndexOutOfBounds {
        /// The offending linear index
        index: usize,
        /// Total number of cells in the grid
        len: usize,
    },

    /// A zoom region must lie entirely inside its parent grid
    #[error("Zoom region [{lower}, {upper}) on axis {axis} extends outside its parent grid")]
    ZoomOutsideParent {
        /// Axis on which the containment fails
        axis: usize,
        /// Lower edge of the zoom region in world coordinates
        lower: f64,
        /// Upper edge of the zoom region in world coordinates
        upper: f64,
    },

    /// Flagged cells do not fit inside the requested zoom window
    #[error(
        "Flagged cells span {extent} parent cells on axis {axis} but the zoom window is only {window} cells wide"
    )]
    ZoomDoesNotFit {
        /// Axis on which the flagged extent is too large
        axis: usize,
        /// Extent of the flagged bounding box in parent cells
        extent: usize,
        /// Side of the zoom window in parent cells
        window: usize,
    },

    /// No cells are flagged
    #[error("Operation requires a non-empty cell selection")]
    EmptySelection,

    /// A selection wider than half the box has no well-defined centroid
    /// under periodic wrapping
    #[error("Selection spans {span} on axis {axis}, more than half the box length {boxsize}")]
    SelectionTooWide {
        /// Axis on which the selection is too wide
        axis: usize,
        /// Wrapped span of the selection in world units
        span: f64,
        /// Box length
        boxsize: f64,
    },
}
