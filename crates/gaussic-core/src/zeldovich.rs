//! Zel'dovich displacement of particles from a density field.

use num_complex::Complex;

use crate::cosmology::CosmologicalParameters;
use crate::error::Result;
use crate::field::{Domain, Field};
use crate::scalar::Real;

/// Particle arrays produced by the Zel'dovich map.
#[derive(Debug, Clone)]
pub struct ParticleSet<T> {
    /// Positions per axis, wrapped into `[0, L)`
    pub position: [Vec<T>; 3],
    /// Velocities per axis in km/s
    pub velocity: [Vec<T>; 3],
    /// Flattened source-cell index per particle
    pub ids: Vec<u64>,
    /// Particle mass in 10^10 M_sun/h
    pub mass: T,
}

impl<T> ParticleSet<T> {
    /// Number of particles.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Solve for the displacement field of one axis in Fourier space:
/// `psi_j(k) = i k_j delta(k) / k^2`, zero mode zero.
fn displacement_component<T: Real>(density: &Field<T>, axis: usize) -> Result<Field<T>> {
    density.require_domain(Domain::Fourier)?;
    let grid = density.grid().clone();
    let kw = grid.kw();
    let mut psi = Field::zeros(grid.clone(), Domain::Fourier);
    for cell in grid.fourier_cells() {
        if cell.index == 0 || cell.k_squared == T::zero() {
            continue;
        }
        let k_component = T::cast(cell.mode[axis] as f64) * kw;
        let factor = Complex::new(T::zero(), k_component / cell.k_squared);
        psi.values_mut()[cell.index] = density.values()[cell.index] * factor;
    }
    psi.to_real();
    Ok(psi)
}

/// Convert a Fourier-space density field into particle positions and
/// velocities via the Zel'dovich approximation.
///
/// Each cell's particle starts at the cell centroid, is displaced by the
/// gradient of the inverse-Laplacian of the density, and carries velocity
/// `100 sqrt(Om/a^3 + Ol) sqrt(a)` times its displacement.
pub fn zeldovich_particles<T: Real>(
    density: &Field<T>,
    cosmology: &CosmologicalParameters<T>,
) -> Result<ParticleSet<T>> {
    density.require_domain(Domain::Fourier)?;
    let grid = density.grid().clone();
    let boxsize = grid.boxsize();
    let velocity_factor = cosmology.zeldovich_velocity_factor();
    let count = grid.size3();

    let mut particles = ParticleSet {
        position: [
            vec![T::zero(); count],
            vec![T::zero(); count],
            vec![T::zero(); count],
        ],
        velocity: [
            vec![T::zero(); count],
            vec![T::zero(); count],
            vec![T::zero(); count],
        ],
        ids: (0..count as u64).collect(),
        mass: cosmology.particle_mass(grid.dx()),
    };

    for axis in 0..3 {
        let psi = displacement_component(density, axis)?;
        let offset = grid.offset_lower()[axis];
        for cell in grid.cells() {
            let displacement = psi.values()[cell.index].re;
            let centroid = grid.cell_centroid(cell.index)[axis];
            let mut position = centroid + displacement;
            // wrap into [offset, offset + L)
            while position < offset {
                position += boxsize;
            }
            while position >= offset + boxsize {
                position -= boxsize;
            }
            particles.position[axis][cell.index] = position;
            particles.velocity[axis][cell.index] = displacement * velocity_factor;
        }
    }
    Ok(particles)
}

/// Net displacement of the whole particle load, one component per axis.
/// Vanishes for any density field with zero mean.
pub fn net_displacement<T: Real>(density: &Field<T>) -> Result<[T; 3]> {
    let mut total = [T::zero(); 3];
    for (axis, slot) in total.iter_mut().enumerate() {
        let psi = displacement_component(density, axis)?;
        *slot = psi.values().iter().map(|c| c.re).fold(T::zero(), |a, v| a + v);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::RandomFieldGenerator;
    use gaussic_grids::Grid;
    use std::sync::Arc;

    fn cosmology() -> CosmologicalParameters<f64> {
        let mut cosmology = CosmologicalParameters::new();
        cosmology.set_redshift(99.0);
        cosmology
    }

    fn noise_field(n: usize, boxsize: f64, seed: u64) -> Field<f64> {
        let grid = Arc::new(Grid::new(n, boxsize).unwrap());
        let mut field = Field::zeros(grid, Domain::Real);
        RandomFieldGenerator::new(seed).draw_onto(&mut field);
        field
    }

    #[test]
    fn test_zero_density_leaves_particles_on_lattice() {
        let grid = Arc::new(Grid::new(8, 50.0).unwrap());
        let density = Field::zeros(grid.clone(), Domain::Fourier);
        let particles = zeldovich_particles(&density, &cosmology()).unwrap();
        for cell in grid.cells() {
            let centroid = grid.cell_centroid(cell.index);
            for axis in 0..3 {
                assert!((particles.position[axis][cell.index] - centroid[axis]).abs() < 1e-12);
                assert_eq!(particles.velocity[axis][cell.index], 0.0);
            }
        }
    }

    #[test]
    fn test_mass_conservation() {
        let field = noise_field(16, 100.0, 21);
        let total = net_displacement(&field).unwrap();
        for component in total {
            assert!(component.abs() < 1e-10 * 100.0, "net drift {component}");
        }
    }

    #[test]
    fn test_velocities_proportional_to_displacement() {
        let cosmology = cosmology();
        let field = noise_field(8, 50.0, 4);
        let particles = zeldovich_particles(&field, &cosmology).unwrap();
        let factor = cosmology.zeldovich_velocity_factor();
        let grid = field.grid().clone();
        for axis in 0..3 {
            for cell in grid.cells() {
                let centroid = grid.cell_centroid(cell.index)[axis];
                let mut displacement = particles.position[axis][cell.index] - centroid;
                // undo the periodic wrap for comparison
                if displacement > 25.0 {
                    displacement -= 50.0;
                }
                if displacement < -25.0 {
                    displacement += 50.0;
                }
                let expected = displacement * factor;
                assert!(
                    (particles.velocity[axis][cell.index] - expected).abs()
                        < 1e-8 * factor.max(1.0),
                    "axis {axis}"
                );
            }
        }
    }

    #[test]
    fn test_particle_mass_scales_with_cell_volume() {
        let grid = Arc::new(Grid::new(8, 50.0).unwrap());
        let density = Field::zeros(grid, Domain::Fourier);
        let mut cosmology = cosmology();
        cosmology.omega_m0 = 0.3;
        let particles = zeldovich_particles(&density, &cosmology).unwrap();
        let dx: f64 = 50.0 / 8.0;
        assert!((particles.mass - 27.78 * 0.3 * dx.powi(3)).abs() < 1e-9);
    }
}
