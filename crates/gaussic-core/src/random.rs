//! Seeded Gaussian white-noise draws, in real or Fourier space.

use num_complex::Complex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::field::{Domain, Field};
use crate::scalar::Real;

/// Deterministic source of white noise for a field realization.
///
/// Two drawing modes are supported. Real-space mode fills every cell with
/// `N(0,1) * sqrt(N^3)` so that the unitary forward transform leaves unit
/// variance in every Fourier mode. Fourier-space mode draws each
/// independent mode directly, with variance 1/2 per real and imaginary
/// component and Hermitian symmetry enforced so the inverse transform is
/// real; self-conjugate modes are drawn real with unit variance. The
/// `reverse_draw_order` flag swaps which sample of each Gaussian pair
/// lands in the real component, for reproducibility with legacy seeds.
#[derive(Debug)]
pub struct RandomFieldGenerator<T> {
    rng: ChaCha8Rng,
    draw_in_fourier_space: bool,
    reverse_draw_order: bool,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Real> RandomFieldGenerator<T> {
    /// Create a generator with the given seed, drawing in real space.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            draw_in_fourier_space: false,
            reverse_draw_order: false,
            _marker: std::marker::PhantomData,
        }
    }

    /// Re-seed the stream, restarting it from the beginning.
    pub fn seed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Select Fourier-space drawing.
    pub fn set_draw_in_fourier_space(&mut self, enabled: bool) {
        self.draw_in_fourier_space = enabled;
    }

    /// Swap the order of each Gaussian pair (legacy-seed compatibility).
    pub fn set_reverse_draw_order(&mut self, enabled: bool) {
        self.reverse_draw_order = enabled;
    }

    /// Fill a field with white noise in the configured mode, leaving it in
    /// the Fourier domain with unit-variance modes and a zeroed mean.
    pub fn draw_onto(&mut self, field: &mut Field<T>) {
        if self.draw_in_fourier_space {
            self.draw_fourier_space(field);
        } else {
            self.draw_real_space(field);
        }
        field
            .clear_zero_mode()
            .expect("draw leaves the field in Fourier space");
    }

    fn draw_real_space(&mut self, field: &mut Field<T>) {
        let n3 = field.grid().size3();
        let sigma = T::cast(n3 as f64).sqrt();
        *field = Field::zeros(field.grid().clone(), Domain::Real);
        for value in field.values_mut() {
            *value = Complex::new(T::sample_standard_normal(&mut self.rng) * sigma, T::zero());
        }
        field.to_fourier();
    }

    fn draw_fourier_space(&mut self, field: &mut Field<T>) {
        let grid = field.grid().clone();
        let n = grid.n() as i64;
        *field = Field::zeros(grid.clone(), Domain::Fourier);
        let root_half = T::cast(0.5).sqrt();
        for index in 0..grid.size3() {
            let coord = grid.cell_coordinate(index);
            let conj_coord = [
                (n - coord[0] as i64) % n,
                (n - coord[1] as i64) % n,
                (n - coord[2] as i64) % n,
            ];
            let conj_index = grid.wrapped_cell_index(conj_coord);
            if index < conj_index {
                let first = T::sample_standard_normal(&mut self.rng);
                let second = T::sample_standard_normal(&mut self.rng);
                let (re, im) = if self.reverse_draw_order {
                    (second, first)
                } else {
                    (first, second)
                };
                field.values_mut()[index] = Complex::new(re * root_half, im * root_half);
                field.values_mut()[conj_index] = Complex::new(re * root_half, -im * root_half);
            } else if index == conj_index {
                let value = T::sample_standard_normal(&mut self.rng);
                field.values_mut()[index] = Complex::new(value, T::zero());
            }
        }
    }
}
