//! Band-splitting filters dividing frequency responsibility across the
//! level hierarchy.
//!
//! Each level except the deepest carries a split wavenumber; its low-pass
//! weight is exactly one below the split and rolls off smoothly above it.
//! A finer level carries the complement of every coarser level's passband,
//! so the squared weights sum to one at every wavenumber the hierarchy
//! represents.

use crate::scalar::Real;

/// Smooth low-pass weight: one below `k_split`, a half-cosine rolloff over
/// the following half-octave, zero beyond.
pub fn lowpass_weight<T: Real>(k: T, k_split: T) -> T {
    if k <= k_split {
        return T::one();
    }
    let taper = k_split / T::cast(2.0);
    if k >= k_split + taper {
        return T::zero();
    }
    let phase = (k - k_split) / taper * T::cast(std::f64::consts::FRAC_PI_2);
    phase.cos()
}

/// Per-level filter weights for a grid hierarchy.
#[derive(Debug, Clone)]
pub struct BandFilters<T> {
    /// Split wavenumber per level; `None` marks the deepest level, which
    /// keeps everything above the coarser splits.
    splits: Vec<Option<T>>,
}

impl<T: Real> BandFilters<T> {
    /// Recompute the splits for a hierarchy described by its per-level
    /// Nyquist wavenumbers, coarsest first. Every level except the deepest
    /// splits at half its own Nyquist.
    pub fn for_nyquists(nyquists: &[T]) -> Self {
        let last = nyquists.len().saturating_sub(1);
        let splits = nyquists
            .iter()
            .enumerate()
            .map(|(level, &nyquist)| {
                if level == last {
                    None
                } else {
                    Some(nyquist / T::cast(2.0))
                }
            })
            .collect();
        Self { splits }
    }

    /// Number of levels covered.
    pub fn num_levels(&self) -> usize {
        self.splits.len()
    }

    /// The split wavenumber of a level, `None` on the deepest.
    pub fn k_split(&self, level: usize) -> Option<T> {
        self.splits[level]
    }

    /// Filter weight W_level(k).
    pub fn weight(&self, level: usize, k: T) -> T {
        let mut w = match self.splits[level] {
            Some(k_split) => lowpass_weight(k, k_split),
            None => T::one(),
        };
        for coarser in self.splits[..level].iter() {
            if let Some(k_split) = *coarser {
                let low = lowpass_weight(k, k_split);
                w = w * (T::one() - low * low).max(T::zero()).sqrt();
            }
        }
        w
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_level_passes_everything() {
        let filters = BandFilters::for_nyquists(&[1.0f64]);
        for k in [0.0, 0.3, 0.9, 5.0] {
            assert_eq!(filters.weight(0, k), 1.0);
        }
    }

    #[test]
    fn test_lowpass_exact_below_split() {
        assert_eq!(lowpass_weight(0.2f64, 0.5), 1.0);
        assert_eq!(lowpass_weight(0.5f64, 0.5), 1.0);
        assert_eq!(lowpass_weight(0.76f64, 0.5), 0.0);
        let mid = lowpass_weight(0.625f64, 0.5);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn test_weights_square_sum_to_one() {
        let filters = BandFilters::for_nyquists(&[1.0f64, 4.0, 16.0]);
        for k in [0.0, 0.4, 0.5, 0.6, 1.0, 2.0, 2.5, 5.0, 12.0] {
            let total: f64 = (0..3).map(|l| filters.weight(l, k).powi(2)).sum();
            assert!((total - 1.0).abs() < 1e-12, "k = {k}: sum {total}");
        }
    }

    #[test]
    fn test_zoom_suppresses_low_k() {
        let filters = BandFilters::for_nyquists(&[1.0f64, 4.0]);
        assert_eq!(filters.weight(1, 0.1), 0.0);
        assert_eq!(filters.weight(0, 0.1), 1.0);
        // well above the base split only the zoom contributes
        assert_eq!(filters.weight(0, 1.0), 0.0);
        assert_eq!(filters.weight(1, 1.0), 1.0);
    }
}
