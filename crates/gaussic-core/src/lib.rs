//! Constrained multi-level Gaussian random field engine.
//!
//! This crate generates cosmological initial conditions: a realization of
//! a Gaussian random density field on a hierarchy of nested periodic
//! grids, optionally modified so that prescribed linear functionals of
//! the field attain exact values (the Hoffman-Ribak projection), and
//! converted into particle positions and velocities through the
//! Zel'dovich approximation.
//!
//! # Architecture
//!
//! - [`field`]: dense complex fields with unitary transforms and a
//!   real/Fourier domain tag
//! - [`spectrum`]: transfer-function tables and sigma8-normalized power
//!   spectra
//! - [`random`]: seeded white-noise draws, in real or Fourier space
//! - [`multilevel`]: grid hierarchies, band-splitting filters and
//!   per-level fields
//! - [`constraints`]: covector construction and the batched
//!   Hoffman-Ribak applicator
//! - [`zeldovich`]: displacement and velocity particle arrays
//! - [`cg`]: a conjugate-gradient solver for implicit operators
//! - [`engine`]: the imperative facade a command dispatcher drives
//!
//! The whole crate is generic over [`Real`], instantiated at `f32` or
//! `f64`; only accuracy tolerances differ observably between the two.
//!
//! # Example
//!
//! ```
//! use gaussic_core::engine::IcGenerator;
//! use gaussic_core::constraints::ConstraintKind;
//! use gaussic_core::engine::TargetKind;
//! use gaussic_core::spectrum::flat_transfer_table;
//!
//! let mut engine = IcGenerator::<f64>::new();
//! engine.set_transfer_table(flat_transfer_table(1e-3, 10.0, 100));
//! engine.set_redshift(50.0);
//! engine.seed_fourier(42);
//! engine.init_base_grid(100.0, 16).unwrap();
//! engine.set_centre([50.0, 50.0, 50.0]);
//! engine.select_cube(20.0).unwrap();
//! engine
//!     .constrain(ConstraintKind::Overdensity, TargetKind::Absolute, 0.5)
//!     .unwrap();
//! let report = engine.done().unwrap();
//! assert!(report.delta_chi2 >= 0.0);
//! ```

pub mod cg;
pub mod constraints;
pub mod cosmology;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod field;
pub mod fourier;
pub mod linalg;
pub mod multilevel;
pub mod random;
pub mod scalar;
pub mod spectrum;
pub mod zeldovich;

pub use cg::{conjugate_gradient, CgOptions, CgResult};
pub use constraints::{build_covector, Axis, ConstraintApplicator, ConstraintKind};
pub use cosmology::{growth_factor, CosmologicalParameters};
pub use engine::{DoneReport, IcGenerator, TargetKind};
pub use error::{CoreError, Result};
pub use estimator::{write_spectrum_table, SpectrumBin, SpectrumEstimator};
pub use field::{Domain, Field};
pub use multilevel::{MultiLevelContext, MultiLevelField};
pub use random::RandomFieldGenerator;
pub use scalar::Real;
pub use spectrum::{PowerSpectrum, TransferTable};
pub use zeldovich::{zeldovich_particles, ParticleSet};
