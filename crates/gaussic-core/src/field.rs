//! Dense complex scalar fields bound to a grid.
//!
//! A [`Field`] owns its data exclusively and holds a shared read-only
//! reference to the [`Grid`] that shapes it; the grid never needs to find
//! its fields. A domain tag records whether the data currently lives in
//! real or Fourier space, and operations that need a particular domain
//! fail with [`CoreError::DomainMismatch`] rather than silently
//! transforming.

use std::fmt;
use std::sync::Arc;

use gaussic_grids::Grid;
use num_complex::Complex;

use crate::error::{CoreError, Result};
use crate::fourier::{fft3, Direction};
use crate::scalar::Real;

/// Transform domain a field's data currently lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// Cell values in configuration space
    Real,
    /// Mode coefficients in Fourier space
    Fourier,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Real => write!(f, "real"),
            Domain::Fourier => write!(f, "Fourier"),
        }
    }
}

/// A dense complex scalar on one grid.
#[derive(Debug, Clone)]
pub struct Field<T: Real> {
    grid: Arc<Grid<T>>,
    data: Vec<Complex<T>>,
    domain: Domain,
}

impl<T: Real> Field<T> {
    /// Zero-filled field in the given domain.
    pub fn zeros(grid: Arc<Grid<T>>, domain: Domain) -> Self {
        let data = vec![Complex::new(T::zero(), T::zero()); grid.size3()];
        Self { grid, data, domain }
    }

    /// Wrap an existing data vector. The vector length must match the grid.
    pub fn from_data(grid: Arc<Grid<T>>, data: Vec<Complex<T>>, domain: Domain) -> Result<Self> {
        if data.len() != grid.size3() {
            return Err(CoreError::SizeMismatch {
                left: data.len(),
                right: grid.size3(),
            });
        }
        Ok(Self { grid, data, domain })
    }

    /// The grid this field is defined on.
    pub fn grid(&self) -> &Arc<Grid<T>> {
        &self.grid
    }

    /// Current transform domain.
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Read access to the raw values.
    pub fn values(&self) -> &[Complex<T>] {
        &self.data
    }

    /// Write access to the raw values. The domain tag is unchanged; the
    /// caller is responsible for keeping it truthful.
    pub fn values_mut(&mut self) -> &mut [Complex<T>] {
        &mut self.data
    }

    /// Fail unless the field is in `expected`.
    pub fn require_domain(&self, expected: Domain) -> Result<()> {
        if self.domain != expected {
            return Err(CoreError::DomainMismatch {
                expected,
                found: self.domain,
            });
        }
        Ok(())
    }

    /// Transform to Fourier space. No-op when already there.
    pub fn to_fourier(&mut self) {
        if self.domain == Domain::Real {
            fft3(&mut self.data, self.grid.n(), Direction::Forward);
            self.domain = Domain::Fourier;
        }
    }

    /// Transform to real space. No-op when already there.
    pub fn to_real(&mut self) {
        if self.domain == Domain::Fourier {
            fft3(&mut self.data, self.grid.n(), Direction::Inverse);
            self.domain = Domain::Real;
        }
    }

    fn check_compatible(&self, other: &Field<T>) -> Result<()> {
        if self.data.len() != other.data.len() {
            return Err(CoreError::SizeMismatch {
                left: self.data.len(),
                right: other.data.len(),
            });
        }
        if self.domain != other.domain {
            return Err(CoreError::DomainMismatch {
                expected: self.domain,
                found: other.domain,
            });
        }
        Ok(())
    }

    /// Hermitian inner product `sum_i conj(a_i) b_i`. Both fields must be
    /// in the same domain; the value is the same in either (Parseval).
    pub fn inner_product(&self, other: &Field<T>) -> Result<Complex<T>> {
        self.check_compatible(other)?;
        let mut acc = Complex::new(T::zero(), T::zero());
        for (a, b) in self.data.iter().zip(other.data.iter()) {
            acc = acc + a.conj() * b;
        }
        Ok(acc)
    }

    /// `self += factor * other`.
    pub fn add_scaled(&mut self, other: &Field<T>, factor: Complex<T>) -> Result<()> {
        self.check_compatible(other)?;
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a = *a + b * factor;
        }
        Ok(())
    }

    /// Element-wise multiply by another field's values.
    pub fn multiply_pointwise(&mut self, other: &Field<T>) -> Result<()> {
        self.check_compatible(other)?;
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a = *a * b;
        }
        Ok(())
    }

    /// Scale every value by a real factor.
    pub fn scale(&mut self, factor: T) {
        for value in self.data.iter_mut() {
            *value = *value * factor;
        }
    }

    /// L2 norm of the values.
    pub fn norm(&self) -> T {
        self.data
            .iter()
            .map(|c| c.norm_sqr())
            .fold(T::zero(), |acc, v| acc + v)
            .sqrt()
    }

    /// Largest value magnitude.
    pub fn max_abs(&self) -> T {
        self.data
            .iter()
            .map(|c| c.norm_sqr())
            .fold(T::zero(), T::max)
            .sqrt()
    }

    /// Zero the `k = 0` coefficient so the mean of the field is fixed.
    pub fn clear_zero_mode(&mut self) -> Result<()> {
        self.require_domain(Domain::Fourier)?;
        self.data[0] = Complex::new(T::zero(), T::zero());
        Ok(())
    }

    /// Chi-squared of the field against a diagonal covariance: the sum of
    /// `|a_i|^2 / P_i` over all modes, skipping the zero mode and any mode
    /// with vanishing variance.
    pub fn chi2(&self, covariance: &[T]) -> Result<T> {
        self.require_domain(Domain::Fourier)?;
        if covariance.len() != self.data.len() {
            return Err(CoreError::SizeMismatch {
                left: covariance.len(),
                right: self.data.len(),
            });
        }
        let mut acc = T::zero();
        for (i, (value, &p)) in self.data.iter().zip(covariance.iter()).enumerate() {
            if i == 0 || p <= T::zero() {
                continue;
            }
            acc += value.norm_sqr() / p;
        }
        Ok(acc)
    }

    /// Tri-linearly interpolate this real-space field onto the cell
    /// centroids of a finer (or offset) target grid.
    pub fn interpolate_onto(&self, target: &Arc<Grid<T>>) -> Result<Field<T>> {
        self.require_domain(Domain::Real)?;
        let src = &self.grid;
        let half = T::cast(0.5);
        let mut out = Field::zeros(target.clone(), Domain::Real);
        for index in 0..target.size3() {
            let p = target.cell_centroid(index);
            let mut base = [0i64; 3];
            let mut frac = [T::zero(); 3];
            for d in 0..3 {
                // cell-centred sample coordinate on the source grid
                let u = (p[d] - src.offset_lower()[d]) / src.dx() - half;
                let floor = u.floor();
                base[d] = floor.to_i64().unwrap_or(0);
                frac[d] = u - floor;
            }
            let mut acc = T::zero();
            for corner in 0..8usize {
                let mut coord = [0i64; 3];
                let mut weight = T::one();
                for d in 0..3 {
                    let step = ((corner >> d) & 1) as i64;
                    coord[d] = base[d] + step;
                    weight = weight
                        * if step == 1 {
                            frac[d]
                        } else {
                            T::one() - frac[d]
                        };
                }
                let src_index = src.wrapped_cell_index(coord);
                acc += weight * self.data[src_index].re;
            }
            out.data[index] = Complex::new(acc, T::zero());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize, boxsize: f64) -> Arc<Grid<f64>> {
        Arc::new(Grid::new(n, boxsize).unwrap())
    }

    #[test]
    fn test_domain_mismatch_reported() {
        let g = grid(4, 10.0);
        let real = Field::zeros(g.clone(), Domain::Real);
        let fourier = Field::zeros(g, Domain::Fourier);
        let err = real.inner_product(&fourier).unwrap_err();
        assert!(matches!(err, CoreError::DomainMismatch { .. }));
    }

    #[test]
    fn test_parseval_inner_product() {
        let g = grid(8, 10.0);
        let mut a = Field::zeros(g.clone(), Domain::Real);
        let mut b = Field::zeros(g, Domain::Real);
        for (i, (x, y)) in a
            .values_mut()
            .iter_mut()
            .zip(b.values_mut().iter_mut())
            .enumerate()
        {
            *x = Complex::new(((i * 31) % 17) as f64 - 8.0, 0.0);
            *y = Complex::new(((i * 13) % 7) as f64 - 3.0, 0.0);
        }
        let real_product = a.inner_product(&b).unwrap();
        a.to_fourier();
        b.to_fourier();
        let fourier_product = a.inner_product(&b).unwrap();
        assert!((real_product - fourier_product).norm() < 1e-9);
    }

    #[test]
    fn test_transform_flips_domain_tag() {
        let g = grid(4, 10.0);
        let mut f = Field::zeros(g, Domain::Real);
        f.to_fourier();
        assert_eq!(f.domain(), Domain::Fourier);
        f.to_real();
        assert_eq!(f.domain(), Domain::Real);
    }

    #[test]
    fn test_chi2_skips_zero_mode() {
        let g = grid(4, 10.0);
        let mut f = Field::zeros(g.clone(), Domain::Fourier);
        f.values_mut()[0] = Complex::new(100.0, 0.0);
        f.values_mut()[1] = Complex::new(2.0, 0.0);
        let cov = vec![1.0; g.size3()];
        assert!((f.chi2(&cov).unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_interpolation_reproduces_constant() {
        let coarse = grid(4, 10.0);
        let fine = Arc::new(Grid::with_offset(4, 5.0, [2.5, 2.5, 2.5]).unwrap());
        let mut f = Field::zeros(coarse, Domain::Real);
        for v in f.values_mut() {
            *v = Complex::new(3.25, 0.0);
        }
        let out = f.interpolate_onto(&fine).unwrap();
        assert!(out.values().iter().all(|v| (v.re - 3.25).abs() < 1e-12));
    }

    #[test]
    fn test_multiply_pointwise_and_max_abs() {
        let g = grid(4, 10.0);
        let mut a = Field::zeros(g.clone(), Domain::Fourier);
        let mut b = Field::zeros(g, Domain::Fourier);
        a.values_mut()[2] = Complex::new(3.0, 0.0);
        a.values_mut()[5] = Complex::new(0.0, -1.0);
        for v in b.values_mut() {
            *v = Complex::new(2.0, 0.0);
        }
        a.multiply_pointwise(&b).unwrap();
        assert_eq!(a.values()[2], Complex::new(6.0, 0.0));
        assert_eq!(a.values()[5], Complex::new(0.0, -2.0));
        assert_eq!(a.max_abs(), 6.0);
    }

    #[test]
    fn test_add_scaled() {
        let g = grid(4, 10.0);
        let mut a = Field::zeros(g.clone(), Domain::Fourier);
        let mut b = Field::zeros(g, Domain::Fourier);
        b.values_mut()[3] = Complex::new(2.0, -1.0);
        a.add_scaled(&b, Complex::new(0.5, 0.0)).unwrap();
        assert_eq!(a.values()[3], Complex::new(1.0, -0.5));
    }
}
