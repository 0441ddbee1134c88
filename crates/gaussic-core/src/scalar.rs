//! Floating-point abstraction for the field engine.
//!
//! The entire engine is written once over [`Real`] and instantiated at
//! `f32` or `f64`. The only observable difference between the two is the
//! tolerance used by accuracy checks.

use std::fmt::{Debug, Display, LowerExp};
use std::iter::Sum;
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

use num_traits::{Float, FloatConst};
use rand::Rng;
use rand_distr::StandardNormal;
use rustfft::FftNum;

/// Scalar trait closing the set of operations the engine needs over a
/// floating-point type.
pub trait Real:
    Float
    + FloatConst
    + FftNum
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + Sum<Self>
    + Display
    + LowerExp
    + Debug
{
    /// Convert an `f64` literal into this type.
    fn cast(value: f64) -> Self;

    /// Lossless widening to `f64`.
    fn as_f64(self) -> f64;

    /// Accuracy tolerance appropriate for this precision.
    fn tolerance() -> f64;

    /// Draw one standard-normal sample.
    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> Self;
}

impl Real for f64 {
    fn cast(value: f64) -> Self {
        value
    }

    fn as_f64(self) -> f64 {
        self
    }

    fn tolerance() -> f64 {
        1e-10
    }

    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> Self {
        rng.sample(StandardNormal)
    }
}

impl Real for f32 {
    fn cast(value: f64) -> Self {
        value as f32
    }

    fn as_f64(self) -> f64 {
        self as f64
    }

    fn tolerance() -> f64 {
        1e-4
    }

    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> Self {
        rng.sample(StandardNormal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_roundtrip() {
        assert_eq!(f64::cast(1.5).as_f64(), 1.5);
        assert_eq!(f32::cast(1.5).as_f64(), 1.5);
    }

    #[test]
    fn test_tolerances_ordered() {
        assert!(f64::tolerance() < f32::tolerance());
    }
}
