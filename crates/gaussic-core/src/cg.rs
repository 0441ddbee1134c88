//! Conjugate-gradient solver for implicit symmetric positive-definite
//! operators over fields.

use num_complex::Complex;

use crate::error::{CoreError, Result};
use crate::field::Field;
use crate::scalar::Real;

/// How many consecutive residual increases are tolerated before the
/// solve is declared divergent.
const MAX_RESIDUAL_INCREASES: usize = 10;

/// Options for the conjugate-gradient solver.
#[derive(Debug, Clone)]
pub struct CgOptions {
    /// Maximum number of iterations. `None` means the dimension of the
    /// system plus one, the exact-arithmetic bound.
    /// Default: None
    pub max_iter: Option<usize>,

    /// Relative tolerance: the solve stops when
    /// `||r||_inf < rtol * ||b||_inf`.
    /// Default: 1e-6
    pub rtol: f64,

    /// Absolute tolerance on `||r||_inf`.
    /// Default: 1e-12
    pub atol: f64,

    /// Whether to print per-iteration residuals.
    /// Default: false
    pub verbose: bool,
}

impl Default for CgOptions {
    fn default() -> Self {
        Self {
            max_iter: None,
            rtol: 1e-6,
            atol: 1e-12,
            verbose: false,
        }
    }
}

/// Result of a conjugate-gradient solve.
#[derive(Debug, Clone)]
pub struct CgResult<T: Real> {
    /// The solution field
    pub solution: Field<T>,
    /// Iterations performed
    pub iterations: usize,
    /// Final `||r||_inf`
    pub residual_norm: f64,
    /// Whether a tolerance was met
    pub converged: bool,
}

/// Solve `Q x = b` for a symmetric positive-definite operator given as a
/// function object.
///
/// Fails with [`CoreError::NoConvergence`] when the residual grows for
/// [`MAX_RESIDUAL_INCREASES`] consecutive iterations, which is what an
/// indefinite or inconsistent operator looks like from the outside.
pub fn conjugate_gradient<T, Q>(apply_q: Q, b: &Field<T>, options: &CgOptions) -> Result<CgResult<T>>
where
    T: Real,
    Q: Fn(&Field<T>) -> Result<Field<T>>,
{
    let one = Complex::new(T::one(), T::zero());
    let dimension = b.grid().size3();
    let max_iter = options.max_iter.unwrap_or(dimension + 1);
    let scale = b.max_abs().as_f64();

    let mut x = Field::zeros(b.grid().clone(), b.domain());
    if scale == 0.0 {
        return Ok(CgResult {
            solution: x,
            iterations: 0,
            residual_norm: 0.0,
            converged: true,
        });
    }

    // r = Q x - b = -b, d = -r
    let mut residual = b.clone();
    residual.scale(-T::one());
    let mut direction = b.clone();

    let mut previous_norm = f64::INFINITY;
    let mut increases = 0usize;
    let mut iterations = 0usize;
    let mut residual_norm = residual.max_abs().as_f64();

    for iteration in 0..max_iter {
        iterations = iteration + 1;
        let q_direction = apply_q(&direction)?;

        let alpha = -residual.inner_product(&direction)?.re
            / direction.inner_product(&q_direction)?.re;
        x.add_scaled(&direction, Complex::new(alpha, T::zero()))?;

        residual = apply_q(&x)?;
        residual.add_scaled(b, -one)?;
        residual_norm = residual.max_abs().as_f64();

        if options.verbose {
            eprintln!("CG iteration {iteration}: residual = {residual_norm:.6e}");
        }

        if residual_norm < options.rtol * scale || residual_norm < options.atol {
            return Ok(CgResult {
                solution: x,
                iterations,
                residual_norm,
                converged: true,
            });
        }

        if residual_norm > previous_norm {
            increases += 1;
            if increases >= MAX_RESIDUAL_INCREASES {
                return Err(CoreError::NoConvergence {
                    iterations,
                    residual: residual_norm,
                });
            }
        } else {
            increases = 0;
        }
        previous_norm = residual_norm;

        // next direction must be Q-orthogonal to all previous ones
        let beta = residual.inner_product(&q_direction)?.re
            / direction.inner_product(&q_direction)?.re;
        direction.scale(beta);
        direction.add_scaled(&residual, -one)?;
    }

    Ok(CgResult {
        solution: x,
        iterations,
        residual_norm,
        converged: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Domain;
    use gaussic_grids::Grid;
    use std::sync::Arc;

    fn rhs(n: usize) -> Field<f64> {
        let grid = Arc::new(Grid::new(n, 10.0).unwrap());
        let mut b = Field::zeros(grid, Domain::Real);
        for (i, value) in b.values_mut().iter_mut().enumerate() {
            *value = Complex::new(((i * 29) % 11) as f64 - 5.0, 0.0);
        }
        b
    }

    #[test]
    fn test_identity_operator() {
        let b = rhs(4);
        let result =
            conjugate_gradient(|x| Ok(x.clone()), &b, &CgOptions::default()).unwrap();
        assert!(result.converged);
        let mut diff = result.solution;
        diff.add_scaled(&b, Complex::new(-1.0, 0.0)).unwrap();
        assert!(diff.max_abs() < 1e-9);
    }

    #[test]
    fn test_diagonal_operator() {
        let b = rhs(4);
        let apply = |x: &Field<f64>| {
            let mut out = x.clone();
            for (i, value) in out.values_mut().iter_mut().enumerate() {
                *value = *value * (2.0 + (i % 3) as f64);
            }
            Ok(out)
        };
        let options = CgOptions {
            rtol: 1e-10,
            ..CgOptions::default()
        };
        let result = conjugate_gradient(apply, &b, &options).unwrap();
        assert!(result.converged);
        // verify Q x = b
        let qx = apply(&result.solution).unwrap();
        let mut diff = qx;
        diff.add_scaled(&b, Complex::new(-1.0, 0.0)).unwrap();
        assert!(diff.max_abs() < 1e-7);
    }

    #[test]
    fn test_zero_rhs_converges_immediately() {
        let grid = Arc::new(Grid::new(4, 10.0).unwrap());
        let b = Field::zeros(grid, Domain::Real);
        let result =
            conjugate_gradient(|x| Ok(x.clone()), &b, &CgOptions::default()).unwrap();
        assert!(result.converged);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_growing_residual_aborts() {
        let b = rhs(4);
        // a pathological operator whose output grows every call: the
        // residual increases monotonically and the divergence guard fires
        let calls = std::cell::Cell::new(0u32);
        let apply = |_: &Field<f64>| {
            calls.set(calls.get() + 1);
            let mut out = b.clone();
            out.scale(2.0f64.powi(calls.get() as i32));
            Ok(out)
        };
        let err = conjugate_gradient(apply, &b, &CgOptions::default()).unwrap_err();
        assert!(matches!(err, CoreError::NoConvergence { .. }));
    }

    #[test]
    fn test_inconsistent_system_does_not_converge() {
        // Q projects out the cells that carry part of b, so no solution
        // exists and the solve hits its iteration limit
        let b = rhs(4);
        let apply = |x: &Field<f64>| {
            let mut out = x.clone();
            let half = out.values().len() / 2;
            for value in out.values_mut()[..half].iter_mut() {
                *value = Complex::new(0.0, 0.0);
            }
            Ok(out)
        };
        let options = CgOptions {
            max_iter: Some(6),
            ..CgOptions::default()
        };
        let result = conjugate_gradient(apply, &b, &options);
        if let Ok(result) = result {
            assert!(!result.converged);
        }
    }
}
