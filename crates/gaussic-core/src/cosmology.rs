//! Cosmological parameters, the linear growth factor, and the Poisson
//! operators that convert between density and potential.

use num_complex::Complex;

use crate::error::Result;
use crate::field::{Domain, Field};
use crate::scalar::Real;

/// Background cosmology driving the spectrum normalization, the growth
/// factor and the Zel'dovich velocities.
///
/// Every number that ends up in an output header comes from here; nothing
/// downstream hard-codes a parameter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CosmologicalParameters<T> {
    /// Matter density today in units of the critical density
    pub omega_m0: T,
    /// Cosmological-constant density today
    pub omega_lambda0: T,
    /// Baryon density today; negative means "no gas"
    pub omega_baryon0: T,
    /// Hubble parameter in units of 100 km/s/Mpc
    pub hubble: T,
    /// Target redshift of the initial conditions
    pub redshift: T,
    /// Scale factor `1 / (1 + z)`
    pub scalefactor: T,
    /// Normalization of the density fluctuations in 8 Mpc/h spheres today
    pub sigma8: T,
    /// Scalar spectral index
    pub ns: T,
}

impl<T: Real> CosmologicalParameters<T> {
    /// Conventional starting values; scripts override everything they use.
    pub fn new() -> Self {
        Self {
            omega_m0: T::cast(0.279),
            omega_lambda0: T::cast(0.721),
            omega_baryon0: -T::one(),
            hubble: T::cast(0.701),
            redshift: T::zero(),
            scalefactor: T::one(),
            sigma8: T::cast(0.8),
            ns: T::cast(0.96),
        }
    }

    /// Set the target redshift, keeping the scale factor consistent.
    pub fn set_redshift(&mut self, z: T) {
        self.redshift = z;
        self.scalefactor = T::one() / (z + T::one());
    }

    /// `3/2 * Om/a * (H0/c)^2` in (h/Mpc)^2, the conversion constant of
    /// the comoving Poisson equation.
    pub fn poisson_prefactor(&self) -> T {
        let h0 = T::cast(100.0);
        let c = T::cast(3.0e5);
        T::cast(1.5) * self.omega_m0 / self.scalefactor * (h0 / c) * (h0 / c)
    }

    /// Velocity per unit displacement for Zel'dovich particles,
    /// `100 * sqrt(Om/a^3 + Ol) * sqrt(a)` km/s per Mpc/h.
    pub fn zeldovich_velocity_factor(&self) -> T {
        let a = self.scalefactor;
        let e2 = self.omega_m0 / (a * a * a) + self.omega_lambda0;
        T::cast(100.0) * e2.sqrt() * a.sqrt()
    }

    /// Dark-matter particle mass for cell size `dx` in 10^10 M_sun/h.
    pub fn particle_mass(&self, dx: T) -> T {
        T::cast(27.78) * self.omega_m0 * dx * dx * dx
    }
}

impl<T: Real> Default for CosmologicalParameters<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear growth factor D(a) under the standard closed-form approximation.
///
/// Not normalized; callers divide by `growth_factor` at `a = 1` to get the
/// growth relative to today.
pub fn growth_factor<T: Real>(cosmology: &CosmologicalParameters<T>, a: T) -> T {
    let om = cosmology.omega_m0;
    let ol = cosmology.omega_lambda0;
    let a3 = a * a * a;
    let e2 = om / a3 + (T::one() - om - ol) / (a * a) + ol;
    let om_a = om / a3 / e2;
    let ol_a = ol / e2;
    T::cast(2.5) * a * om_a
        / (om_a.powf(T::cast(4.0 / 7.0)) - ol_a
            + (T::one() + om_a / T::cast(2.0)) * (T::one() + ol_a / T::cast(70.0)))
}

/// Convert a density field to the comoving potential in place:
/// multiply each Fourier mode by `-prefactor / k^2`, zeroing the mean.
pub fn density_to_potential<T: Real>(
    field: &mut Field<T>,
    cosmology: &CosmologicalParameters<T>,
) -> Result<()> {
    field.require_domain(Domain::Fourier)?;
    let prefactor = cosmology.poisson_prefactor();
    let grid = field.grid().clone();
    for cell in grid.fourier_cells() {
        let value = &mut field.values_mut()[cell.index];
        if cell.index == 0 {
            *value = Complex::new(T::zero(), T::zero());
        } else {
            *value = *value * (-prefactor / cell.k_squared);
        }
    }
    Ok(())
}

/// Inverse of [`density_to_potential`]: multiply each mode by
/// `-k^2 / prefactor`, zeroing the mean.
pub fn potential_to_density<T: Real>(
    field: &mut Field<T>,
    cosmology: &CosmologicalParameters<T>,
) -> Result<()> {
    field.require_domain(Domain::Fourier)?;
    let prefactor = cosmology.poisson_prefactor();
    let grid = field.grid().clone();
    for cell in grid.fourier_cells() {
        let value = &mut field.values_mut()[cell.index];
        if cell.index == 0 {
            *value = Complex::new(T::zero(), T::zero());
        } else {
            *value = *value * (-cell.k_squared / prefactor);
        }
    }
    Ok(())
}
