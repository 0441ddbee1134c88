//! Three-dimensional unitary FFTs over dense complex cubes.
//!
//! Plans are pooled globally, keyed on `(precision, N, direction)`; the
//! pool lock is only contended at plan-creation time. Both transform
//! directions divide by `sqrt(N^3)` so that the inner product is invariant
//! (Parseval) and a forward-then-inverse round trip is the identity.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use num_complex::Complex;
use once_cell::sync::Lazy;
use rustfft::{Fft, FftPlanner};

use crate::scalar::Real;

static PLAN_POOL: Lazy<Mutex<HashMap<(TypeId, usize, bool), Box<dyn Any + Send + Sync>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn plan<T: Real>(n: usize, inverse: bool) -> Arc<dyn Fft<T>> {
    let key = (TypeId::of::<T>(), n, inverse);
    let mut pool = PLAN_POOL.lock().expect("FFT plan pool lock poisoned");
    if let Some(entry) = pool.get(&key) {
        return entry
            .downcast_ref::<Arc<dyn Fft<T>>>()
            .expect("FFT plan pool entry has the keyed type")
            .clone();
    }
    let mut planner = FftPlanner::<T>::new();
    let plan = if inverse {
        planner.plan_fft_inverse(n)
    } else {
        planner.plan_fft_forward(n)
    };
    pool.insert(key, Box::new(plan.clone()));
    plan
}

/// Transform direction. Forward uses the `e^{-ik.x}` kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Real space to Fourier space
    Forward,
    /// Fourier space to real space
    Inverse,
}

/// In-place unitary 3-d FFT of an `n^3` cube stored x-major.
pub fn fft3<T: Real>(data: &mut [Complex<T>], n: usize, direction: Direction) {
    debug_assert_eq!(data.len(), n * n * n);
    let plan = plan::<T>(n, direction == Direction::Inverse);
    let mut scratch = vec![Complex::new(T::zero(), T::zero()); plan.get_inplace_scratch_len()];
    let mut line = vec![Complex::new(T::zero(), T::zero()); n];

    // z axis: lines are contiguous
    for chunk in data.chunks_exact_mut(n) {
        plan.process_with_scratch(chunk, &mut scratch);
    }

    // y axis: stride n
    for x in 0..n {
        for z in 0..n {
            let base = x * n * n + z;
            for (y, slot) in line.iter_mut().enumerate() {
                *slot = data[base + y * n];
            }
            plan.process_with_scratch(&mut line, &mut scratch);
            for (y, slot) in line.iter().enumerate() {
                data[base + y * n] = *slot;
            }
        }
    }

    // x axis: stride n^2
    for y in 0..n {
        for z in 0..n {
            let base = y * n + z;
            for (x, slot) in line.iter_mut().enumerate() {
                *slot = data[base + x * n * n];
            }
            plan.process_with_scratch(&mut line, &mut scratch);
            for (x, slot) in line.iter().enumerate() {
                data[base + x * n * n] = *slot;
            }
        }
    }

    let scale = T::one() / T::cast((n as f64).powi(3)).sqrt();
    for value in data.iter_mut() {
        *value = *value * scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm_sq(data: &[Complex<f64>]) -> f64 {
        data.iter().map(|c| c.norm_sqr()).sum()
    }

    #[test]
    fn test_roundtrip_is_identity() {
        let n = 8;
        let mut data: Vec<Complex<f64>> = (0..n * n * n)
            .map(|i| Complex::new((i % 13) as f64 - 6.0, 0.0))
            .collect();
        let original = data.clone();
        fft3(&mut data, n, Direction::Forward);
        fft3(&mut data, n, Direction::Inverse);
        for (a, b) in data.iter().zip(original.iter()) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_unitarity() {
        let n = 8;
        let mut data: Vec<Complex<f64>> = (0..n * n * n)
            .map(|i| Complex::new(((i * 37) % 11) as f64, ((i * 7) % 5) as f64))
            .collect();
        let before = norm_sq(&data);
        fft3(&mut data, n, Direction::Forward);
        assert!((norm_sq(&data) - before).abs() < 1e-10 * before);
    }

    #[test]
    fn test_constant_maps_to_zero_mode() {
        let n = 4;
        let mut data = vec![Complex::new(2.0f64, 0.0); n * n * n];
        fft3(&mut data, n, Direction::Forward);
        // zero mode carries sqrt(N^3) * c, everything else vanishes
        assert!((data[0].re - 2.0 * (64.0f64).sqrt()).abs() < 1e-12);
        assert!(data[1..].iter().all(|c| c.norm() < 1e-12));
    }

    #[test]
    fn test_single_precision_roundtrip() {
        let n = 4;
        let mut data: Vec<Complex<f32>> = (0..n * n * n)
            .map(|i| Complex::new(i as f32, 0.0))
            .collect();
        let original = data.clone();
        fft3(&mut data, n, Direction::Forward);
        fft3(&mut data, n, Direction::Inverse);
        for (a, b) in data.iter().zip(original.iter()) {
            assert!((a - b).norm() < 1e-3);
        }
    }
}
