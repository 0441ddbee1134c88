//! Linear constraints on the density field: covector construction and the
//! Hoffman-Ribak projection that enforces them.

pub mod applicator;
pub mod builder;

pub use applicator::{AppliedModification, Constraint, ConstraintApplicator};
pub use builder::{build_covector, Axis, ConstraintKind};
