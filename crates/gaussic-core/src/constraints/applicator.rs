//! Batched Hoffman-Ribak projection of a Gaussian realization onto a set
//! of linear constraints.

use num_complex::Complex;
use tracing::warn;

use crate::error::{CoreError, Result};
use crate::linalg::cholesky_decompose;
use crate::multilevel::{MultiLevelContext, MultiLevelField};
use crate::scalar::Real;

/// One registered constraint: covector, desired value, value currently
/// attained.
#[derive(Debug, Clone)]
pub struct Constraint<T: Real> {
    /// The covector alpha, one Fourier-space field per level
    pub covector: MultiLevelField<T>,
    /// Value the modified field must attain
    pub target: Complex<T>,
    /// Value the unmodified field attains
    pub initial: Complex<T>,
}

/// Summary of an applied modification.
#[derive(Debug, Clone)]
pub struct AppliedModification<T> {
    /// Expected chi-squared increase `d^H M^-1 d`
    pub delta_chi2: T,
    /// Solved constraint weights
    pub weights: Vec<Complex<T>>,
}

/// Accumulates constraints and applies them in one batch.
///
/// The batched form solves all constraints simultaneously through the
/// small Hermitian system `M w = t - i`, so the result is independent of
/// registration order.
#[derive(Debug, Default)]
pub struct ConstraintApplicator<T: Real> {
    constraints: Vec<Constraint<T>>,
}

impl<T: Real> ConstraintApplicator<T> {
    /// No constraints registered.
    pub fn new() -> Self {
        Self {
            constraints: Vec::new(),
        }
    }

    /// Number of registered constraints.
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Whether no constraint is registered.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Drop all registered constraints.
    pub fn clear(&mut self) {
        self.constraints.clear();
    }

    /// Read access to the registered constraints.
    pub fn constraints(&self) -> &[Constraint<T>] {
        &self.constraints
    }

    /// Register one scalar constraint.
    pub fn add_constraint(
        &mut self,
        covector: MultiLevelField<T>,
        target: Complex<T>,
        initial: Complex<T>,
    ) -> Result<()> {
        if covector.norm_squared() == T::zero() {
            return Err(CoreError::NullCovector {
                index: self.constraints.len(),
            });
        }
        self.constraints.push(Constraint {
            covector,
            target,
            initial,
        });
        Ok(())
    }

    /// Register the three scalar constraints that fix a vector-valued
    /// functional to a target direction.
    ///
    /// `initials` are the measured components; their magnitude `m` is kept
    /// (scaled by the optional renormalization factor) and redistributed
    /// along `direction`.
    pub fn add_direction_constraint(
        &mut self,
        covectors: [MultiLevelField<T>; 3],
        initials: [Complex<T>; 3],
        direction: [T; 3],
        renormalize: Option<T>,
    ) -> Result<()> {
        let mut magnitude = initials
            .iter()
            .map(|v| v.norm_sqr())
            .fold(T::zero(), |acc, v| acc + v)
            .sqrt();
        if let Some(factor) = renormalize {
            magnitude = magnitude * factor;
        }
        let direction_norm = (direction[0] * direction[0]
            + direction[1] * direction[1]
            + direction[2] * direction[2])
            .sqrt();
        for (axis, covector) in covectors.into_iter().enumerate() {
            let target = Complex::new(direction[axis] * magnitude / direction_norm, T::zero());
            self.add_constraint(covector, target, initials[axis])?;
        }
        Ok(())
    }

    /// Apply every registered constraint to the field in one batch:
    /// `delta' = delta + C alpha (alpha^H C alpha)^-1 (t - i)`.
    ///
    /// The field is only borrowed for the duration of the modification.
    /// With no constraints registered this is a no-op with zero expected
    /// chi-squared change.
    pub fn apply(
        &self,
        field: &mut MultiLevelField<T>,
        context: &MultiLevelContext<T>,
    ) -> Result<AppliedModification<T>> {
        if self.constraints.is_empty() {
            return Ok(AppliedModification {
                delta_chi2: T::zero(),
                weights: Vec::new(),
            });
        }

        // beta_j = C alpha_j, the covariance-weighted covectors
        let mut betas = Vec::with_capacity(self.constraints.len());
        for constraint in &self.constraints {
            let mut beta = constraint.covector.clone();
            beta.multiply_by_covariance(context)?;
            betas.push(beta);
        }

        // M_jk = alpha_j^H beta_k, Hermitian positive definite unless the
        // covectors are linearly dependent
        let count = self.constraints.len();
        let mut matrix = vec![vec![Complex::new(T::zero(), T::zero()); count]; count];
        for (j, constraint) in self.constraints.iter().enumerate() {
            for (k, beta) in betas.iter().enumerate() {
                matrix[j][k] = constraint.covector.inner_product(beta)?;
            }
        }

        let factor = cholesky_decompose(&matrix)?;
        let condition_limit = T::one() / T::epsilon().sqrt();
        if factor.condition_estimate() > condition_limit {
            warn!(
                condition = factor.condition_estimate().as_f64(),
                "constraint covariance matrix is ill-conditioned; proceeding"
            );
        }

        let mismatch: Vec<Complex<T>> = self
            .constraints
            .iter()
            .map(|c| c.target - c.initial)
            .collect();
        let weights = factor.solve(&mismatch);

        for (beta, &weight) in betas.iter().zip(weights.iter()) {
            field.add_scaled(beta, weight)?;
        }

        let delta_chi2 = mismatch
            .iter()
            .zip(weights.iter())
            .map(|(d, w)| (d.conj() * w).re)
            .fold(T::zero(), |acc, v| acc + v);

        Ok(AppliedModification {
            delta_chi2,
            weights,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::builder::{build_covector, ConstraintKind};
    use crate::cosmology::CosmologicalParameters;
    use crate::field::Domain;
    use crate::random::RandomFieldGenerator;
    use crate::spectrum::{flat_transfer_table, PowerSpectrum};

    fn context() -> MultiLevelContext<f64> {
        let spectrum = PowerSpectrum::new(&flat_transfer_table(1e-3, 50.0, 100), 1.0);
        let mut context = MultiLevelContext::new();
        context.add_level(&spectrum, 64.0, 16, [0.0; 3]).unwrap();
        context
    }

    fn drawn_field(context: &MultiLevelContext<f64>, seed: u64) -> MultiLevelField<f64> {
        let mut field = MultiLevelField::zeros(context, Domain::Real);
        let mut generator = RandomFieldGenerator::new(seed);
        generator.draw_onto(field.field_mut(0));
        field.apply_power_spectrum(context).unwrap();
        field
    }

    fn cube_flags(context: &MultiLevelContext<f64>, lo: usize, hi: usize) -> Vec<usize> {
        let grid = context.grid_for_level(0);
        let mut flags = Vec::new();
        for x in lo..=hi {
            for y in lo..=hi {
                for z in lo..=hi {
                    flags.push(grid.cell_index([x, y, z]));
                }
            }
        }
        flags
    }

    #[test]
    fn test_no_constraints_is_identity() {
        let context = context();
        let mut field = drawn_field(&context, 9);
        let before = field.clone();
        let applicator = ConstraintApplicator::new();
        let outcome = applicator.apply(&mut field, &context).unwrap();
        assert_eq!(outcome.delta_chi2, 0.0);
        assert_eq!(field.field(0).values(), before.field(0).values());
    }

    #[test]
    fn test_single_constraint_is_satisfied() {
        let context = context();
        let cosmology = CosmologicalParameters::new();
        let mut field = drawn_field(&context, 41);
        let flags = cube_flags(&context, 6, 9);
        let covector =
            build_covector(&context, &flags, &cosmology, ConstraintKind::Overdensity).unwrap();
        let initial = covector.inner_product(&field).unwrap();
        let target = Complex::new(2.0, 0.0);

        let mut applicator = ConstraintApplicator::new();
        applicator
            .add_constraint(covector.clone(), target, initial)
            .unwrap();
        let outcome = applicator.apply(&mut field, &context).unwrap();

        let achieved = covector.inner_product(&field).unwrap();
        assert!((achieved - target).norm() < 1e-6 * target.norm() + 1e-12);
        assert!(outcome.delta_chi2 >= 0.0);
    }

    #[test]
    fn test_batched_application_is_order_independent() {
        let context = context();
        let cosmology = CosmologicalParameters::new();
        let flags_a = cube_flags(&context, 2, 5);
        let flags_b = cube_flags(&context, 9, 12);
        let alpha = build_covector(&context, &flags_a, &cosmology, ConstraintKind::Overdensity)
            .unwrap();
        let beta = build_covector(&context, &flags_b, &cosmology, ConstraintKind::Overdensity)
            .unwrap();

        let mut field_ab = drawn_field(&context, 5);
        let mut field_ba = field_ab.clone();
        let ia = alpha.inner_product(&field_ab).unwrap();
        let ib = beta.inner_product(&field_ab).unwrap();
        let ta = Complex::new(1.0, 0.0);
        let tb = Complex::new(-0.5, 0.0);

        let mut ab = ConstraintApplicator::new();
        ab.add_constraint(alpha.clone(), ta, ia).unwrap();
        ab.add_constraint(beta.clone(), tb, ib).unwrap();
        ab.apply(&mut field_ab, &context).unwrap();

        let mut ba = ConstraintApplicator::new();
        ba.add_constraint(beta, tb, ib).unwrap();
        ba.add_constraint(alpha, ta, ia).unwrap();
        ba.apply(&mut field_ba, &context).unwrap();

        for (a, b) in field_ab
            .field(0)
            .values()
            .iter()
            .zip(field_ba.field(0).values())
        {
            assert!((a - b).norm() < 1e-10);
        }
    }

    #[test]
    fn test_duplicate_constraints_are_degenerate() {
        let context = context();
        let cosmology = CosmologicalParameters::new();
        let mut field = drawn_field(&context, 3);
        let flags = cube_flags(&context, 6, 9);
        let covector =
            build_covector(&context, &flags, &cosmology, ConstraintKind::Overdensity).unwrap();
        let initial = covector.inner_product(&field).unwrap();

        let mut applicator = ConstraintApplicator::new();
        applicator
            .add_constraint(covector.clone(), Complex::new(1.0, 0.0), initial)
            .unwrap();
        applicator
            .add_constraint(covector, Complex::new(2.0, 0.0), initial)
            .unwrap();
        let err = applicator.apply(&mut field, &context).unwrap_err();
        assert!(matches!(err, CoreError::DegenerateConstraints));
    }

    #[test]
    fn test_null_covector_rejected() {
        let context = context();
        let covector = MultiLevelField::zeros(&context, Domain::Fourier);
        let mut applicator = ConstraintApplicator::new();
        let err = applicator
            .add_constraint(covector, Complex::new(1.0, 0.0), Complex::new(0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, CoreError::NullCovector { index: 0 }));
    }

    #[test]
    fn test_direction_constraint_targets() {
        let context = context();
        let cosmology = CosmologicalParameters::new();
        let flags = cube_flags(&context, 6, 9);
        let covector = |_| {
            build_covector(&context, &flags, &cosmology, ConstraintKind::Overdensity).unwrap()
        };
        let initials = [
            Complex::new(3.0, 0.0),
            Complex::new(4.0, 0.0),
            Complex::new(0.0, 0.0),
        ];
        let mut applicator = ConstraintApplicator::new();
        // duplicate covectors would be degenerate on apply, but targets are
        // checkable after registration alone
        applicator
            .add_direction_constraint(
                [covector(0), covector(1), covector(2)],
                initials,
                [1.0, 0.0, 0.0],
                None,
            )
            .unwrap();
        let targets: Vec<_> = applicator
            .constraints()
            .iter()
            .map(|c| c.target)
            .collect();
        assert!((targets[0] - Complex::new(5.0, 0.0)).norm() < 1e-12);
        assert!(targets[1].norm() < 1e-12);
        assert!(targets[2].norm() < 1e-12);
    }
}
