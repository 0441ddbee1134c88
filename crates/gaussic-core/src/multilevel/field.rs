//! Fields replicated across the level hierarchy.

use num_complex::Complex;

use crate::error::{CoreError, Result};
use crate::field::{Domain, Field};
use crate::multilevel::context::MultiLevelContext;
use crate::scalar::Real;

/// One [`Field`] per level of a [`MultiLevelContext`].
///
/// The effective field at a world position is the sum, over the levels
/// containing it, of each level's field after its band-splitting filter;
/// [`composite_on_level`] materializes that sum on one level's lattice.
///
/// [`composite_on_level`]: MultiLevelField::composite_on_level
#[derive(Debug, Clone)]
pub struct MultiLevelField<T: Real> {
    fields: Vec<Field<T>>,
}

impl<T: Real> MultiLevelField<T> {
    /// Zero field on every level of the context.
    pub fn zeros(context: &MultiLevelContext<T>, domain: Domain) -> Self {
        let fields = context
            .levels()
            .map(|level| Field::zeros(level.grid.clone(), domain))
            .collect();
        Self { fields }
    }

    /// Number of levels carried.
    pub fn num_levels(&self) -> usize {
        self.fields.len()
    }

    /// Field on one level.
    pub fn field(&self, level: usize) -> &Field<T> {
        &self.fields[level]
    }

    /// Mutable field on one level.
    pub fn field_mut(&mut self, level: usize) -> &mut Field<T> {
        &mut self.fields[level]
    }

    /// Iterate fields root first.
    pub fn fields(&self) -> impl Iterator<Item = &Field<T>> {
        self.fields.iter()
    }

    /// Iterate fields mutably, root first.
    pub fn fields_mut(&mut self) -> impl Iterator<Item = &mut Field<T>> {
        self.fields.iter_mut()
    }

    /// Transform every level to Fourier space.
    pub fn to_fourier(&mut self) {
        for field in self.fields.iter_mut() {
            field.to_fourier();
        }
    }

    /// Transform every level to real space.
    pub fn to_real(&mut self) {
        for field in self.fields.iter_mut() {
            field.to_real();
        }
    }

    fn check_levels(&self, other: &MultiLevelField<T>) -> Result<()> {
        if self.fields.len() != other.fields.len() {
            return Err(CoreError::SizeMismatch {
                left: self.fields.len(),
                right: other.fields.len(),
            });
        }
        Ok(())
    }

    /// Multiply each mode by the square root of its level covariance,
    /// turning unit-variance white noise into a realization of the
    /// spectrum.
    pub fn apply_power_spectrum(&mut self, context: &MultiLevelContext<T>) -> Result<()> {
        for (level, field) in self.fields.iter_mut().enumerate() {
            field.require_domain(Domain::Fourier)?;
            let covariance = context.covariance_for_level(level);
            for (value, &p) in field.values_mut().iter_mut().zip(covariance.iter()) {
                *value = *value * p.sqrt();
            }
        }
        Ok(())
    }

    /// Rescale each nonzero mode so its squared magnitude equals the
    /// covariance exactly, preserving phases.
    pub fn enforce_exact_power_spectrum(&mut self, context: &MultiLevelContext<T>) -> Result<()> {
        for (level, field) in self.fields.iter_mut().enumerate() {
            field.require_domain(Domain::Fourier)?;
            let covariance = context.covariance_for_level(level);
            for (value, &p) in field.values_mut().iter_mut().zip(covariance.iter()) {
                let magnitude = value.norm();
                if magnitude > T::zero() {
                    *value = *value * (p.sqrt() / magnitude);
                } else {
                    *value = Complex::new(T::zero(), T::zero());
                }
            }
        }
        Ok(())
    }

    /// Chi-squared against the per-level covariances, zero mode skipped.
    pub fn chi2(&self, context: &MultiLevelContext<T>) -> Result<T> {
        let mut total = T::zero();
        for (level, field) in self.fields.iter().enumerate() {
            total += field.chi2(context.covariance_for_level(level))?;
        }
        Ok(total)
    }

    /// Sum of per-level Hermitian inner products.
    pub fn inner_product(&self, other: &MultiLevelField<T>) -> Result<Complex<T>> {
        self.check_levels(other)?;
        let mut acc = Complex::new(T::zero(), T::zero());
        for (a, b) in self.fields.iter().zip(other.fields.iter()) {
            acc = acc + a.inner_product(b)?;
        }
        Ok(acc)
    }

    /// `self += factor * other` on every level.
    pub fn add_scaled(&mut self, other: &MultiLevelField<T>, factor: Complex<T>) -> Result<()> {
        self.check_levels(other)?;
        for (a, b) in self.fields.iter_mut().zip(other.fields.iter()) {
            a.add_scaled(b, factor)?;
        }
        Ok(())
    }

    /// Multiply each mode by its level covariance (the action of C on a
    /// covector).
    pub fn multiply_by_covariance(&mut self, context: &MultiLevelContext<T>) -> Result<()> {
        for (level, field) in self.fields.iter_mut().enumerate() {
            field.require_domain(Domain::Fourier)?;
            let covariance = context.covariance_for_level(level);
            for (value, &p) in field.values_mut().iter_mut().zip(covariance.iter()) {
                *value = *value * p;
            }
        }
        Ok(())
    }

    /// Squared L2 norm summed over levels.
    pub fn norm_squared(&self) -> T {
        self.fields.iter().fold(T::zero(), |acc, field| {
            let n = field.norm();
            acc + n * n
        })
    }

    /// Negate every value on every level.
    pub fn negate(&mut self) {
        for field in self.fields.iter_mut() {
            for value in field.values_mut() {
                *value = -*value;
            }
        }
    }

    /// Materialize the composite field on one level's lattice: the sum of
    /// every coarser level's band-filtered field tri-linearly interpolated
    /// onto it, plus the level's own band-filtered field. Returns a
    /// real-domain field.
    pub fn composite_on_level(
        &self,
        context: &MultiLevelContext<T>,
        target: usize,
    ) -> Result<Field<T>> {
        let target_grid = context.grid_for_level(target).clone();
        let mut composite = Field::zeros(target_grid.clone(), Domain::Real);
        for level in 0..=target {
            let mut filtered = self.fields[level].clone();
            filtered.to_fourier();
            let grid = filtered.grid().clone();
            for cell in grid.fourier_cells() {
                let weight = context.filters().weight(level, cell.k_squared.sqrt());
                let value = &mut filtered.values_mut()[cell.index];
                *value = *value * weight;
            }
            filtered.to_real();
            if level == target {
                composite.add_scaled(&filtered, Complex::new(T::one(), T::zero()))?;
            } else {
                let interpolated = filtered.interpolate_onto(&target_grid)?;
                composite.add_scaled(&interpolated, Complex::new(T::one(), T::zero()))?;
            }
        }
        Ok(composite)
    }
}
