//! Power spectra: transfer-function tables, cubic-spline interpolation and
//! sigma8 normalization.

use std::io::{BufRead, BufReader};
use std::path::Path;

use gaussic_grids::Grid;

use crate::cosmology::{growth_factor, CosmologicalParameters};
use crate::error::{CoreError, Result};
use crate::scalar::Real;

/// Maximum number of rows read from a transfer-function file.
pub const MAX_TABLE_ROWS: usize = 600;

/// Number of integration steps for the sigma(R) quadrature.
const SIGMA_STEPS: usize = 10_000;

/// A tabulated transfer function T(k) on a strictly positive, ascending
/// k-grid.
#[derive(Debug, Clone)]
pub struct TransferTable<T> {
    k: Vec<T>,
    t: Vec<T>,
}

impl<T: Real> TransferTable<T> {
    /// Build from parallel columns. The k column must be strictly positive
    /// and ascending; T is renormalized so the first row carries T = 1.
    pub fn from_columns(k: Vec<T>, t: Vec<T>) -> Result<Self> {
        if k.len() != t.len() {
            return Err(CoreError::InvalidTable(format!(
                "column lengths differ: {} vs {}",
                k.len(),
                t.len()
            )));
        }
        if k.len() < 4 {
            return Err(CoreError::InvalidTable(format!(
                "need at least 4 rows for cubic interpolation, got {}",
                k.len()
            )));
        }
        if k[0] <= T::zero() {
            return Err(CoreError::InvalidTable(
                "wavenumbers must be positive".into(),
            ));
        }
        if k.windows(2).any(|w| w[1] <= w[0]) {
            return Err(CoreError::InvalidTable(
                "wavenumbers must be strictly ascending".into(),
            ));
        }
        let t0 = t[0];
        if t0 == T::zero() {
            return Err(CoreError::InvalidTable(
                "first transfer value must be nonzero".into(),
            ));
        }
        let t = t.into_iter().map(|v| v / t0).collect();
        Ok(Self { k, t })
    }

    /// Read a CAMB-style table: seven whitespace-separated columns per row,
    /// k then T(k), the rest ignored. Rows with non-positive k are
    /// skipped; reading stops at EOF or [`MAX_TABLE_ROWS`].
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(std::fs::File::open(path)?);
        let mut k = Vec::new();
        let mut t = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let mut cols = line.split_whitespace();
            let (Some(kc), Some(tc)) = (cols.next(), cols.next()) else {
                continue;
            };
            let kv: f64 = kc
                .parse()
                .map_err(|_| CoreError::InvalidTable(format!("unparseable wavenumber '{kc}'")))?;
            let tv: f64 = tc
                .parse()
                .map_err(|_| CoreError::InvalidTable(format!("unparseable transfer value '{tc}'")))?;
            if kv <= 0.0 {
                continue;
            }
            k.push(T::cast(kv));
            t.push(T::cast(tv));
            if k.len() == MAX_TABLE_ROWS {
                break;
            }
        }
        Self::from_columns(k, t)
    }

    /// Number of rows kept.
    pub fn len(&self) -> usize {
        self.k.len()
    }

    /// Whether the table is empty (never true for a constructed table).
    pub fn is_empty(&self) -> bool {
        self.k.is_empty()
    }
}

/// Natural cubic spline through a set of ascending knots, clamped to the
/// boundary values outside the tabulated range.
#[derive(Debug, Clone)]
struct CubicSpline<T> {
    x: Vec<T>,
    y: Vec<T>,
    y2: Vec<T>,
}

impl<T: Real> CubicSpline<T> {
    fn new(x: Vec<T>, y: Vec<T>) -> Self {
        let n = x.len();
        let mut y2 = vec![T::zero(); n];
        let mut u = vec![T::zero(); n];
        for i in 1..n - 1 {
            let sig = (x[i] - x[i - 1]) / (x[i + 1] - x[i - 1]);
            let p = sig * y2[i - 1] + T::cast(2.0);
            y2[i] = (sig - T::one()) / p;
            let slope_right = (y[i + 1] - y[i]) / (x[i + 1] - x[i]);
            let slope_left = (y[i] - y[i - 1]) / (x[i] - x[i - 1]);
            u[i] = (T::cast(6.0) * (slope_right - slope_left) / (x[i + 1] - x[i - 1])
                - sig * u[i - 1])
                / p;
        }
        for i in (0..n - 1).rev() {
            y2[i] = y2[i] * y2[i + 1] + u[i];
        }
        Self { x, y, y2 }
    }

    fn eval(&self, x: T) -> T {
        let n = self.x.len();
        if x <= self.x[0] {
            return self.y[0];
        }
        if x >= self.x[n - 1] {
            return self.y[n - 1];
        }
        // binary search for the bracketing knot interval
        let mut lo = 0;
        let mut hi = n - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.x[mid] > x {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        let h = self.x[hi] - self.x[lo];
        let a = (self.x[hi] - x) / h;
        let b = (x - self.x[lo]) / h;
        a * self.y[lo]
            + b * self.y[hi]
            + ((a * a * a - a) * self.y2[lo] + (b * b * b - b) * self.y2[hi]) * (h * h)
                / T::cast(6.0)
    }
}

/// Interpolated power spectrum P(k) = A * k^ns * T(k)^2.
///
/// Freshly constructed spectra carry unit amplitude; [`normalize`]
/// rescales A so that sigma(8 Mpc/h) matches the cosmology's sigma8 times
/// the linear growth to the target redshift.
///
/// [`normalize`]: PowerSpectrum::normalize
#[derive(Debug, Clone)]
pub struct PowerSpectrum<T> {
    spline: CubicSpline<T>,
    k_min: T,
    k_max: T,
    ns: T,
    amplitude: T,
}

impl<T: Real> PowerSpectrum<T> {
    /// Build an unnormalized spectrum from a transfer table and spectral
    /// index.
    pub fn new(table: &TransferTable<T>, ns: T) -> Self {
        let k_min = table.k[0];
        let k_max = table.k[table.k.len() - 1];
        Self {
            spline: CubicSpline::new(table.k.clone(), table.t.clone()),
            k_min,
            k_max,
            ns,
            amplitude: T::one(),
        }
    }

    /// Interpolated transfer function, clamped outside the table.
    pub fn transfer(&self, k: T) -> T {
        self.spline.eval(k)
    }

    /// Physical P(k) with the current amplitude.
    pub fn evaluate(&self, k: T) -> T {
        let t = self.transfer(k);
        self.amplitude * k.powf(self.ns) * t * t
    }

    /// Current amplitude A.
    pub fn amplitude(&self) -> T {
        self.amplitude
    }

    /// RMS of the density field smoothed with a top-hat of the given
    /// radius, for the current amplitude.
    pub fn sigma(&self, radius: T) -> T {
        let amp = T::cast(9.0 / (2.0 * std::f64::consts::PI * std::f64::consts::PI));
        let dk = (self.k_max - self.k_min) / T::cast(SIGMA_STEPS as f64);
        let mut sum = T::zero();
        let mut k = self.k_min;
        while k < self.k_max {
            let y = k * radius;
            let window = (y.sin() - y * y.cos()) / (y * y * y);
            let t = self.transfer(k);
            sum += k.powf(self.ns + T::cast(2.0)) * window * window * t * t;
            k += dk;
        }
        (sum * amp * dk * self.amplitude).sqrt()
    }

    /// Rescale the amplitude so sigma(8 Mpc/h) equals the cosmology's
    /// sigma8 scaled by the linear growth factor to the target redshift.
    pub fn normalize(&mut self, cosmology: &CosmologicalParameters<T>) {
        self.amplitude = T::one();
        let sigma8_now = self.sigma(T::cast(8.0));
        let growth =
            growth_factor(cosmology, cosmology.scalefactor) / growth_factor(cosmology, T::one());
        let ratio = cosmology.sigma8 / sigma8_now * growth;
        self.amplitude = ratio * ratio;
    }

    /// Per-mode variance of a unitary-FFT field on the given grid: the
    /// physical P(k) times the box-volume norm `kw^3 / (2 pi)^3`, with the
    /// zero mode carrying no variance.
    pub fn covariance_on_grid(&self, grid: &Grid<T>) -> Vec<T> {
        let two_pi = T::cast(2.0 * std::f64::consts::PI);
        let kw = grid.kw();
        let norm = (kw / two_pi).powi(3);
        let mut covariance = vec![T::zero(); grid.size3()];
        for cell in grid.fourier_cells() {
            if cell.index == 0 {
                continue;
            }
            let k = cell.k_squared.sqrt();
            covariance[cell.index] = self.evaluate(k) * norm;
        }
        covariance
    }
}

/// A flat unit transfer table spanning the given k range, for tests and
/// synthetic runs.
pub fn flat_transfer_table<T: Real>(k_min: T, k_max: T, rows: usize) -> TransferTable<T> {
    let step = (k_max - k_min) / T::cast((rows - 1) as f64);
    let k = (0..rows)
        .map(|i| k_min + step * T::cast(i as f64))
        .collect();
    let t = vec![T::one(); rows];
    TransferTable::from_columns(k, t).expect("synthetic table is well formed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_rejects_descending_k() {
        let k = vec![1.0, 2.0, 1.5, 3.0];
        let t = vec![1.0; 4];
        assert!(TransferTable::from_columns(k, t).is_err());
    }

    #[test]
    fn test_table_normalizes_first_row() {
        let k: Vec<f64> = vec![0.1, 0.2, 0.3, 0.4];
        let t: Vec<f64> = vec![2.0, 1.0, 0.5, 0.25];
        let table = TransferTable::from_columns(k, t).unwrap();
        assert!((table.t[0] - 1.0).abs() < 1e-14);
        assert!((table.t[3] - 0.125).abs() < 1e-14);
    }

    #[test]
    fn test_spline_reproduces_linear_data() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v + 1.0).collect();
        let spline = CubicSpline::new(x, y);
        for probe in [0.5, 2.25, 7.9] {
            assert!((spline.eval(probe) - (3.0 * probe + 1.0)).abs() < 1e-10);
        }
    }

    #[test]
    fn test_spline_clamps_outside_range() {
        let x: Vec<f64> = (1..6).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| v * v).collect();
        let spline = CubicSpline::new(x, y);
        assert_eq!(spline.eval(0.0), 1.0);
        assert_eq!(spline.eval(10.0), 25.0);
    }

    #[test]
    fn test_normalization_fixes_sigma8() {
        let table = flat_transfer_table::<f64>(1e-3, 10.0, 200);
        let mut cosmology = CosmologicalParameters::<f64>::new();
        cosmology.sigma8 = 0.8;
        // at z = 0 the growth ratio is one, so sigma(8) must land on sigma8
        let mut spectrum = PowerSpectrum::new(&table, cosmology.ns);
        spectrum.normalize(&cosmology);
        assert!((spectrum.sigma(8.0) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_covariance_zero_mode_is_zero() {
        let table = flat_transfer_table::<f64>(1e-3, 10.0, 50);
        let spectrum = PowerSpectrum::new(&table, 1.0);
        let grid = Grid::new(8, 100.0).unwrap();
        let covariance = spectrum.covariance_on_grid(&grid);
        assert_eq!(covariance[0], 0.0);
        assert!(covariance[1] > 0.0);
    }
}
