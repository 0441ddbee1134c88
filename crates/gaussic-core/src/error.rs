//! Error types for gaussic-core

use thiserror::Error;

use crate::field::Domain;

/// Result type for core field-engine operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in the field engine
#[derive(Error, Debug)]
pub enum CoreError {
    /// A field operation was attempted in the wrong transform domain
    #[error("Field is in the {found} domain but the operation requires {expected}")]
    DomainMismatch {
        /// Domain the operation requires
        expected: Domain,
        /// Domain the field is actually in
        found: Domain,
    },

    /// Two fields that must share a grid shape do not
    #[error("Field size mismatch: {left} vs {right} cells")]
    SizeMismatch {
        /// Number of cells on the left-hand side
        left: usize,
        /// Number of cells on the right-hand side
        right: usize,
    },

    /// The constraint covariance matrix is singular
    #[error("Constraint covariance matrix is singular: constraints are linearly dependent")]
    DegenerateConstraints,

    /// A constraint covector has zero norm on every level
    #[error("Constraint covector {index} has zero norm on every level")]
    NullCovector {
        /// Position of the offending constraint in the registration order
        index: usize,
    },

    /// An iterative solver failed to converge
    #[error("Solver failed to converge after {iterations} iterations (residual {residual:.3e})")]
    NoConvergence {
        /// Iterations performed before giving up
        iterations: usize,
        /// Residual norm at the point of failure
        residual: f64,
    },

    /// The base grid has not been created yet
    #[error("No base grid: create the base level before this operation")]
    BaseGridMissing,

    /// The random realization has already been drawn
    #[error("The random field was already drawn; grids can no longer change")]
    FieldAlreadyDrawn,

    /// No transfer-function table has been loaded
    #[error("No transfer function loaded: a power spectrum is required here")]
    SpectrumMissing,

    /// No cells are flagged but the operation needs a selection
    #[error("No cells are flagged: load or select a cell set first")]
    NoSelection,

    /// A transfer-function table is unusable
    #[error("Invalid transfer-function table: {0}")]
    InvalidTable(String),

    /// Unknown constraint name
    #[error("Unknown constraint kind '{0}'")]
    UnknownConstraint(String),

    /// Geometry error bubbled up from the grid layer
    #[error(transparent)]
    Grid(#[from] gaussic_grids::GridError),

    /// Underlying I/O failure while reading a table
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
