//! Cubic-lattice geometry with periodic boundary conditions.
//!
//! A [`Grid`] is pure index arithmetic: it owns no field values. Linear
//! indices are x-major, `i = (x*n + y)*n + z`, matching the layout of the
//! dense arrays that fields store. Fourier indices per axis live in the
//! signed range `[-n/2, n/2)`.

use num_traits::{Float, FromPrimitive};

use crate::error::{GridError, Result};

/// Immutable description of a cubic lattice of `n^3` cells covering a
/// periodic box.
///
/// World coordinates wrap modulo the box length. A zoom grid is an
/// ordinary `Grid` whose `offset_lower` places it inside its parent; the
/// grid itself knows nothing about the hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    n: usize,
    boxsize: T,
    offset_lower: [T; 3],
    dx: T,
}

impl<T: Float + FromPrimitive> Grid<T> {
    /// Create a grid at the world origin.
    pub fn new(n: usize, boxsize: T) -> Result<Self> {
        Self::with_offset(n, boxsize, [T::zero(); 3])
    }

    /// Create a grid whose low corner sits at `offset_lower`.
    pub fn with_offset(n: usize, boxsize: T, offset_lower: [T; 3]) -> Result<Self> {
        if n == 0 || n % 2 != 0 {
            return Err(GridError::InvalidSideLength(n));
        }
        if boxsize <= T::zero() {
            return Err(GridError::InvalidBoxLength(
                boxsize.to_f64().unwrap_or(f64::NAN),
            ));
        }
        let dx = boxsize / T::from_usize(n).unwrap();
        Ok(Self {
            n,
            boxsize,
            offset_lower,
            dx,
        })
    }

    /// Side length in cells.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Physical box length covered by this grid.
    pub fn boxsize(&self) -> T {
        self.boxsize
    }

    /// Cell size `boxsize / n`.
    pub fn dx(&self) -> T {
        self.dx
    }

    /// World coordinates of the low corner.
    pub fn offset_lower(&self) -> [T; 3] {
        self.offset_lower
    }

    /// Total number of cells, `n^3`.
    pub fn size3(&self) -> usize {
        self.n * self.n * self.n
    }

    /// Fundamental wavenumber `2*pi / boxsize`.
    pub fn kw(&self) -> T {
        let two_pi = T::from_f64(2.0 * std::f64::consts::PI).unwrap();
        two_pi / self.boxsize
    }

    /// Nyquist wavenumber `pi * n / boxsize`.
    pub fn k_nyquist(&self) -> T {
        let pi = T::from_f64(std::f64::consts::PI).unwrap();
        pi * T::from_usize(self.n).unwrap() / self.boxsize
    }

    /// Integer cell coordinates of a linear index.
    pub fn cell_coordinate(&self, index: usize) -> [usize; 3] {
        let n = self.n;
        [(index / (n * n)) % n, (index / n) % n, index % n]
    }

    /// Linear index of integer cell coordinates (must each be `< n`).
    pub fn cell_index(&self, coord: [usize; 3]) -> usize {
        debug_assert!(coord.iter().all(|&c| c < self.n));
        (coord[0] * self.n + coord[1]) * self.n + coord[2]
    }

    /// Linear index of possibly out-of-range coordinates, wrapped onto the
    /// periodic lattice.
    pub fn wrapped_cell_index(&self, coord: [i64; 3]) -> usize {
        let n = self.n as i64;
        let w = |c: i64| (((c % n) + n) % n) as usize;
        self.cell_index([w(coord[0]), w(coord[1]), w(coord[2])])
    }

    /// World-space centre of a cell.
    pub fn cell_centroid(&self, index: usize) -> [T; 3] {
        let coord = self.cell_coordinate(index);
        let half = T::from_f64(0.5).unwrap();
        let mut out = [T::zero(); 3];
        for d in 0..3 {
            out[d] = self.offset_lower[d] + (T::from_usize(coord[d]).unwrap() + half) * self.dx;
        }
        out
    }

    /// Signed integer wavevector of a Fourier-space cell, one component per
    /// axis in `[-n/2, n/2)`.
    pub fn fourier_mode(&self, index: usize) -> [i64; 3] {
        let coord = self.cell_coordinate(index);
        let n = self.n as i64;
        let signed = |c: usize| {
            let c = c as i64;
            if c >= n / 2 {
                c - n
            } else {
                c
            }
        };
        [signed(coord[0]), signed(coord[1]), signed(coord[2])]
    }

    /// Physical wavevector of a Fourier-space cell.
    pub fn fourier_k(&self, index: usize) -> [T; 3] {
        let mode = self.fourier_mode(index);
        let kw = self.kw();
        [
            T::from_i64(mode[0]).unwrap() * kw,
            T::from_i64(mode[1]).unwrap() * kw,
            T::from_i64(mode[2]).unwrap() * kw,
        ]
    }

    /// Squared magnitude of the physical wavevector of a Fourier-space cell.
    pub fn fourier_k_squared(&self, index: usize) -> T {
        let mode = self.fourier_mode(index);
        let m2 = (mode[0] * mode[0] + mode[1] * mode[1] + mode[2] * mode[2]) as f64;
        T::from_f64(m2).unwrap() * self.kw() * self.kw()
    }

    /// Difference `a - b` wrapped into `(-L/2, L/2]` under the periodic
    /// boundary.
    pub fn wrapped_delta(&self, a: T, b: T) -> T {
        let half = self.boxsize / T::from_f64(2.0).unwrap();
        let mut result = a - b;
        if result > half {
            result = result - self.boxsize;
        }
        if result <= -half {
            result = result + self.boxsize;
        }
        result
    }

    /// Whether a world point lies inside this grid's footprint (no
    /// wrapping applied).
    pub fn contains_point(&self, point: [T; 3]) -> bool {
        (0..3).all(|d| {
            point[d] >= self.offset_lower[d] && point[d] < self.offset_lower[d] + self.boxsize
        })
    }

    /// Index of the cell whose centroid is closest to a world point,
    /// without periodic wrapping.
    pub fn closest_cell(&self, point: [T; 3]) -> usize {
        let mut coord = [0usize; 3];
        for d in 0..3 {
            let c = ((point[d] - self.offset_lower[d]) / self.dx)
                .floor()
                .to_isize()
                .unwrap_or(0);
            coord[d] = c.clamp(0, self.n as isize - 1) as usize;
        }
        self.cell_index(coord)
    }

    /// Iterate all cells in linear-index order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.size3()).map(move |index| Cell {
            index,
            coord: self.cell_coordinate(index),
        })
    }

    /// Iterate all Fourier-space cells in linear-index order, with the
    /// signed-range wavevector already resolved.
    pub fn fourier_cells(&self) -> impl Iterator<Item = FourierCell<T>> + '_ {
        let kw = self.kw();
        (0..self.size3()).map(move |index| {
            let mode = self.fourier_mode(index);
            let m2 = (mode[0] * mode[0] + mode[1] * mode[1] + mode[2] * mode[2]) as f64;
            FourierCell {
                index,
                mode,
                k_squared: T::from_f64(m2).unwrap() * kw * kw,
            }
        })
    }
}

/// One real-space cell produced by [`Grid::cells`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// Linear index
    pub index: usize,
    /// Integer cell coordinates
    pub coord: [usize; 3],
}

/// One Fourier-space cell produced by [`Grid::fourier_cells`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FourierCell<T> {
    /// Linear index
    pub index: usize,
    /// Signed integer wavevector, each component in `[-n/2, n/2)`
    pub mode: [i64; 3],
    /// Squared magnitude of the physical wavevector
    pub k_squared: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip() {
        let grid = Grid::<f64>::new(8, 100.0).unwrap();
        for i in 0..grid.size3() {
            assert_eq!(grid.cell_index(grid.cell_coordinate(i)), i);
        }
    }

    #[test]
    fn test_rejects_odd_or_zero_side() {
        assert!(Grid::<f64>::new(0, 100.0).is_err());
        assert!(Grid::<f64>::new(7, 100.0).is_err());
        assert!(Grid::<f64>::new(8, -1.0).is_err());
    }

    #[test]
    fn test_fourier_mode_signed_range() {
        let grid = Grid::<f64>::new(8, 100.0).unwrap();
        for cell in grid.fourier_cells() {
            for d in 0..3 {
                assert!(cell.mode[d] >= -4 && cell.mode[d] < 4);
            }
        }
        // x = n/2 maps to -n/2, not +n/2
        let nyq = grid.cell_index([4, 0, 0]);
        assert_eq!(grid.fourier_mode(nyq), [-4, 0, 0]);
    }

    #[test]
    fn test_wrapped_delta() {
        let grid = Grid::<f64>::new(8, 100.0).unwrap();
        assert_eq!(grid.wrapped_delta(10.0, 90.0), 20.0);
        assert_eq!(grid.wrapped_delta(90.0, 10.0), -20.0);
        assert_eq!(grid.wrapped_delta(30.0, 10.0), 20.0);
        // exactly half the box stays at +L/2
        assert_eq!(grid.wrapped_delta(60.0, 10.0), 50.0);
    }

    #[test]
    fn test_wrapped_cell_index() {
        let grid = Grid::<f64>::new(8, 100.0).unwrap();
        assert_eq!(
            grid.wrapped_cell_index([-1, 0, 9]),
            grid.cell_index([7, 0, 1])
        );
    }

    #[test]
    fn test_cell_centroid_with_offset() {
        let grid = Grid::<f64>::with_offset(4, 10.0, [5.0, 0.0, 0.0]).unwrap();
        let c = grid.cell_centroid(grid.cell_index([0, 0, 0]));
        assert!((c[0] - 6.25).abs() < 1e-12);
        assert!((c[1] - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_kw_and_nyquist() {
        let grid = Grid::<f64>::new(32, 100.0).unwrap();
        assert!((grid.kw() - 2.0 * std::f64::consts::PI / 100.0).abs() < 1e-14);
        assert!((grid.k_nyquist() - std::f64::consts::PI * 32.0 / 100.0).abs() < 1e-14);
    }
}
