//! Construction of constraint covectors from flagged-cell selections.

use num_complex::Complex;

use crate::cosmology::{density_to_potential, CosmologicalParameters};
use crate::error::{CoreError, Result};
use crate::field::Domain;
use crate::multilevel::{MultiLevelContext, MultiLevelField};
use crate::scalar::Real;
use gaussic_grids::selection_centroid;

/// A spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// x
    X,
    /// y
    Y,
    /// z
    Z,
}

impl Axis {
    /// Numeric index of the axis.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// All three axes in order.
    pub fn all() -> [Axis; 3] {
        [Axis::X, Axis::Y, Axis::Z]
    }

    /// Parse `x`/`y`/`z` or `0`/`1`/`2`.
    pub fn parse(token: &str) -> Option<Axis> {
        match token.to_ascii_lowercase().as_str() {
            "x" | "0" => Some(Axis::X),
            "y" | "1" => Some(Axis::Y),
            "z" | "2" => Some(Axis::Z),
            _ => None,
        }
    }
}

/// The supported linear-functional kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Mean overdensity over the flagged cells
    Overdensity,
    /// Angular-momentum component of the flagged cells about their
    /// centroid
    AngularMomentum(Axis),
}

impl ConstraintKind {
    /// Resolve a script-level name (and optional axis token) to a kind.
    pub fn parse(name: &str, axis: Option<&str>) -> Result<ConstraintKind> {
        match name.to_ascii_lowercase().as_str() {
            "overdensity" => Ok(ConstraintKind::Overdensity),
            "l" => {
                let axis = axis
                    .and_then(Axis::parse)
                    .ok_or_else(|| CoreError::UnknownConstraint(format!("{name} (needs axis)")))?;
                Ok(ConstraintKind::AngularMomentum(axis))
            }
            _ => Err(CoreError::UnknownConstraint(name.to_string())),
        }
    }
}

/// Build the covector of a constraint kind over the flagged base-level
/// cells, one Fourier-space field per level.
///
/// A flagged base cell contributes to a finer level by uniform
/// distribution over the fine cells covering it, which keeps the value of
/// the functional consistent across the hierarchy. The angular-momentum
/// stencil acts on the potential; the result is converted to a
/// density-space covector through the inverse Poisson operator.
pub fn build_covector<T: Real>(
    context: &MultiLevelContext<T>,
    flagged: &[usize],
    cosmology: &CosmologicalParameters<T>,
    kind: ConstraintKind,
) -> Result<MultiLevelField<T>> {
    if context.is_empty() {
        return Err(CoreError::BaseGridMissing);
    }
    if flagged.is_empty() {
        return Err(CoreError::NoSelection);
    }
    let base = context.grid_for_level(0).clone();
    let centroid = match kind {
        ConstraintKind::AngularMomentum(_) => Some(selection_centroid(base.as_ref(), flagged)?),
        ConstraintKind::Overdensity => None,
    };

    let mut covector = MultiLevelField::zeros(context, Domain::Real);
    for level in 0..context.num_levels() {
        let grid = context.grid_for_level(level).clone();
        let ratio = (base.dx() / grid.dx()).round().as_f64() as usize;
        let ratio = ratio.max(1);
        let cell_weight = T::one()
            / (T::cast(flagged.len() as f64) * T::cast((ratio * ratio * ratio) as f64));

        let field = covector.field_mut(level);
        for &flagged_cell in flagged {
            let coarse = base.cell_coordinate(flagged_cell);
            // low corner of the flagged base cell on this level's lattice
            let mut start = [0i64; 3];
            for d in 0..3 {
                let corner =
                    base.offset_lower()[d] + T::cast(coarse[d] as f64) * base.dx();
                start[d] = ((corner - grid.offset_lower()[d]) / grid.dx())
                    .round()
                    .as_f64() as i64;
            }
            for sx in 0..ratio as i64 {
                for sy in 0..ratio as i64 {
                    for sz in 0..ratio as i64 {
                        let coord = [start[0] + sx, start[1] + sy, start[2] + sz];
                        if level > 0 && !in_bounds(&coord, grid.n()) {
                            continue;
                        }
                        let index = grid.wrapped_cell_index(coord);
                        match kind {
                            ConstraintKind::Overdensity => {
                                let values = field.values_mut();
                                values[index] = values[index] + cell_weight;
                            }
                            ConstraintKind::AngularMomentum(axis) => {
                                accumulate_momentum_stencil(
                                    field.values_mut(),
                                    &grid,
                                    &base,
                                    level == 0,
                                    coord,
                                    axis,
                                    centroid.as_ref().unwrap_or(&[T::zero(); 3]),
                                    cell_weight * T::cast(flagged.len() as f64),
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    covector.to_fourier();
    if matches!(kind, ConstraintKind::AngularMomentum(_)) {
        // the stencil constrains the potential; unitarity of the transform
        // lets the same covector constrain the density after applying the
        // Poisson operator
        for field in covector.fields_mut() {
            density_to_potential(field, cosmology)?;
        }
    }
    Ok(covector)
}

fn in_bounds(coord: &[i64; 3], n: usize) -> bool {
    coord.iter().all(|&c| c >= 0 && c < n as i64)
}

/// Fourth-order central-difference contribution of one cell to the
/// angular-momentum covector on the potential, in the two axes transverse
/// to the requested component. Centroid-relative coordinates wrap on the
/// base box, which sets the physical periodicity even on zoom levels.
#[allow(clippy::too_many_arguments)]
fn accumulate_momentum_stencil<T: Real>(
    values: &mut [Complex<T>],
    grid: &gaussic_grids::Grid<T>,
    base: &gaussic_grids::Grid<T>,
    periodic: bool,
    coord: [i64; 3],
    axis: Axis,
    centroid: &[T; 3],
    weight: T,
) {
    let position = {
        let index = grid.wrapped_cell_index(coord);
        grid.cell_centroid(index)
    };
    let offset = [
        base.wrapped_delta(position[0], centroid[0]),
        base.wrapped_delta(position[1], centroid[1]),
        base.wrapped_delta(position[2], centroid[2]),
    ];

    // transverse axes and centroid-relative coordinates; signs chosen so
    // the functional is L ~ -r x grad(Phi)
    let (d1, d2, c1, c2) = match axis {
        Axis::X => (2, 1, offset[1], offset[2]),
        Axis::Y => (0, 2, offset[2], offset[0]),
        Axis::Z => (1, 0, offset[0], offset[1]),
    };

    let dx = grid.dx();
    let a = -T::one() / (T::cast(12.0) * dx);
    let b = T::cast(2.0) / (T::cast(3.0) * dx);

    let mut add = |direction: usize, step: i64, amount: T| {
        let mut neighbor = coord;
        neighbor[direction] += step;
        if !periodic && !in_bounds(&neighbor, grid.n()) {
            return;
        }
        let index = grid.wrapped_cell_index(neighbor);
        values[index] = values[index] + amount * weight;
    };

    add(d1, -2, c1 * a);
    add(d1, -1, c1 * b);
    add(d1, 1, -c1 * b);
    add(d1, 2, -c1 * a);

    add(d2, -2, -c2 * a);
    add(d2, -1, -c2 * b);
    add(d2, 1, c2 * b);
    add(d2, 2, c2 * a);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::spectrum::{flat_transfer_table, PowerSpectrum};

    fn context() -> MultiLevelContext<f64> {
        let spectrum = PowerSpectrum::new(&flat_transfer_table(1e-3, 50.0, 100), 1.0);
        let mut context = MultiLevelContext::new();
        context.add_level(&spectrum, 64.0, 16, [0.0; 3]).unwrap();
        context
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
    fn test_kind_parsing() {
        assert_eq!(
            ConstraintKind::parse("Overdensity", None).unwrap(),
            ConstraintKind::Overdensity
        );
        assert_eq!(
            ConstraintKind::parse("L", Some("y")).unwrap(),
            ConstraintKind::AngularMomentum(Axis::Y)
        );
        assert!(ConstraintKind::parse("L", None).is_err());
        assert!(ConstraintKind::parse("vorticity", None).is_err());
    }

    #[test]
    fn test_overdensity_covector_measures_mean() {
        let context = context();
        let cosmology = CosmologicalParameters::new();
        let flags = cube_flags(&context, 6, 9);
        let covector =
            build_covector(&context, &flags, &cosmology, ConstraintKind::Overdensity).unwrap();

        // a field that is 2 inside the cube and 0 outside has mean 2 there
        let grid = context.grid_for_level(0).clone();
        let mut delta = Field::zeros(grid, Domain::Real);
        for &cell in &flags {
            delta.values_mut()[cell] = Complex::new(2.0, 0.0);
        }
        delta.to_fourier();
        let value = covector.field(0).inner_product(&delta).unwrap();
        assert!((value.re - 2.0).abs() < 1e-10);
        assert!(value.im.abs() < 1e-10);
    }

    #[test]
    fn test_momentum_covector_kills_uniform_fields() {
        let context = context();
        let mut cosmology = CosmologicalParameters::<f64>::new();
        cosmology.set_redshift(50.0);
        let flags = cube_flags(&context, 6, 9);
        let covector = build_covector(
            &context,
            &flags,
            &cosmology,
            ConstraintKind::AngularMomentum(Axis::Z),
        )
        .unwrap();

        let grid = context.grid_for_level(0).clone();
        let mut uniform = Field::zeros(grid, Domain::Real);
        for value in uniform.values_mut() {
            *value = Complex::new(1.0, 0.0);
        }
        uniform.to_fourier();
        let value = covector.field(0).inner_product(&uniform).unwrap();
        assert!(value.norm() < 1e-10);
    }

    #[test]
    fn test_empty_selection_rejected() {
        let context = context();
        let cosmology = CosmologicalParameters::new();
        let err =
            build_covector(&context, &[], &cosmology, ConstraintKind::Overdensity).unwrap_err();
        assert!(matches!(err, CoreError::NoSelection));
    }
}
