//! Small dense Hermitian linear algebra for the constraint covariance
//! matrix.

use num_complex::Complex;

use crate::error::{CoreError, Result};
use crate::scalar::Real;

/// Cholesky factor of a Hermitian positive-definite matrix, `M = L L^H`.
#[derive(Debug, Clone)]
pub struct CholeskyFactor<T> {
    lower: Vec<Vec<Complex<T>>>,
    /// Smallest diagonal entry of L
    pub min_diagonal: T,
    /// Largest diagonal entry of L
    pub max_diagonal: T,
}

/// Factor a Hermitian positive-definite matrix. A non-positive pivot means
/// the matrix is singular to working precision and the constraints it
/// came from are linearly dependent.
pub fn cholesky_decompose<T: Real>(matrix: &[Vec<Complex<T>>]) -> Result<CholeskyFactor<T>> {
    let n = matrix.len();
    let scale = matrix
        .iter()
        .enumerate()
        .map(|(i, row)| num_traits::Float::abs(row[i].re))
        .fold(T::zero(), T::max)
        .max(T::one());
    let tiny = scale * T::epsilon() * T::cast(n.max(1) as f64);

    let mut lower = vec![vec![Complex::new(T::zero(), T::zero()); n]; n];
    let mut min_diagonal = T::infinity();
    let mut max_diagonal = T::zero();
    for j in 0..n {
        let mut pivot = matrix[j][j].re;
        for k in 0..j {
            pivot = pivot - lower[j][k].norm_sqr();
        }
        if pivot <= tiny {
            return Err(CoreError::DegenerateConstraints);
        }
        let diagonal = pivot.sqrt();
        lower[j][j] = Complex::new(diagonal, T::zero());
        min_diagonal = min_diagonal.min(diagonal);
        max_diagonal = max_diagonal.max(diagonal);
        for i in j + 1..n {
            let mut sum = matrix[i][j];
            for k in 0..j {
                sum = sum - lower[i][k] * lower[j][k].conj();
            }
            lower[i][j] = sum / diagonal;
        }
    }
    Ok(CholeskyFactor {
        lower,
        min_diagonal,
        max_diagonal,
    })
}

impl<T: Real> CholeskyFactor<T> {
    /// Condition-number estimate `(max_diag / min_diag)^2`.
    pub fn condition_estimate(&self) -> T {
        let ratio = self.max_diagonal / self.min_diagonal;
        ratio * ratio
    }

    /// Solve `M x = b` by forward and backward substitution.
    pub fn solve(&self, rhs: &[Complex<T>]) -> Vec<Complex<T>> {
        let n = self.lower.len();
        debug_assert_eq!(rhs.len(), n);
        // L y = b
        let mut y = vec![Complex::new(T::zero(), T::zero()); n];
        for i in 0..n {
            let mut sum = rhs[i];
            for k in 0..i {
                sum = sum - self.lower[i][k] * y[k];
            }
            y[i] = sum / self.lower[i][i].re;
        }
        // L^H x = y
        let mut x = vec![Complex::new(T::zero(), T::zero()); n];
        for i in (0..n).rev() {
            let mut sum = y[i];
            for k in i + 1..n {
                sum = sum - self.lower[k][i].conj() * x[k];
            }
            x[i] = sum / self.lower[i][i].re;
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> Complex<f64> {
        Complex::new(re, im)
    }

    #[test]
    fn test_solves_real_spd_system() {
        let m = vec![
            vec![c(4.0, 0.0), c(2.0, 0.0)],
            vec![c(2.0, 0.0), c(3.0, 0.0)],
        ];
        let factor = cholesky_decompose(&m).unwrap();
        let x = factor.solve(&[c(2.0, 0.0), c(5.0, 0.0)]);
        // M x = b with x = (-0.5, 2)
        assert!((x[0] - c(-0.5, 0.0)).norm() < 1e-12);
        assert!((x[1] - c(2.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_solves_hermitian_system() {
        let m = vec![
            vec![c(2.0, 0.0), c(0.0, -1.0)],
            vec![c(0.0, 1.0), c(2.0, 0.0)],
        ];
        let factor = cholesky_decompose(&m).unwrap();
        let b = [c(1.0, 0.0), c(0.0, 0.0)];
        let x = factor.solve(&b);
        // verify M x = b
        let r0 = m[0][0] * x[0] + m[0][1] * x[1] - b[0];
        let r1 = m[1][0] * x[0] + m[1][1] * x[1] - b[1];
        assert!(r0.norm() < 1e-12 && r1.norm() < 1e-12);
    }

    #[test]
    fn test_singular_matrix_is_degenerate() {
        let m = vec![
            vec![c(1.0, 0.0), c(1.0, 0.0)],
            vec![c(1.0, 0.0), c(1.0, 0.0)],
        ];
        let err = cholesky_decompose(&m).unwrap_err();
        assert!(matches!(err, CoreError::DegenerateConstraints));
    }

    #[test]
    fn test_condition_estimate() {
        let m = vec![
            vec![c(100.0, 0.0), c(0.0, 0.0)],
            vec![c(0.0, 0.0), c(1.0, 0.0)],
        ];
        let factor = cholesky_decompose(&m).unwrap();
        assert!((factor.condition_estimate() - 100.0).abs() < 1e-9);
    }
}
