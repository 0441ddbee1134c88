//! The ordered hierarchy of grids and per-level covariances.

use std::sync::Arc;

use gaussic_grids::{Grid, GridError};

use crate::error::Result;
use crate::multilevel::filter::BandFilters;
use crate::scalar::Real;
use crate::spectrum::PowerSpectrum;

/// One level of the hierarchy: a grid and the diagonal covariance of its
/// field in the Fourier basis.
#[derive(Debug, Clone)]
pub struct Level<T> {
    /// Geometry of this level
    pub grid: Arc<Grid<T>>,
    /// Per-mode variance, indexed like the grid
    pub covariance: Vec<T>,
}

/// Ordered list of levels, index 0 being the base grid and subsequent
/// levels strictly contained zoom regions.
#[derive(Debug, Clone)]
pub struct MultiLevelContext<T> {
    levels: Vec<Level<T>>,
    filters: BandFilters<T>,
}

impl<T: Real> MultiLevelContext<T> {
    /// An empty hierarchy.
    pub fn new() -> Self {
        Self {
            levels: Vec::new(),
            filters: BandFilters::for_nyquists(&[]),
        }
    }

    /// Append a level. The first call creates the base grid; later calls
    /// create zoom grids, whose footprint must lie entirely inside the
    /// current deepest level. Appending recomputes every level's
    /// band-splitting filter.
    pub fn add_level(
        &mut self,
        spectrum: &PowerSpectrum<T>,
        boxsize: T,
        n: usize,
        offset: [T; 3],
    ) -> Result<Arc<Grid<T>>> {
        if let Some(parent) = self.levels.last() {
            let tolerance = parent.grid.dx() * T::cast(1e-9);
            for axis in 0..3 {
                let lower = offset[axis];
                let upper = offset[axis] + boxsize;
                let parent_lower = parent.grid.offset_lower()[axis];
                let parent_upper = parent_lower + parent.grid.boxsize();
                if lower < parent_lower - tolerance || upper > parent_upper + tolerance {
                    return Err(GridError::ZoomOutsideParent {
                        axis,
                        lower: lower.as_f64(),
                        upper: upper.as_f64(),
                    }
                    .into());
                }
            }
        }

        let grid = Arc::new(Grid::with_offset(n, boxsize, offset)?);
        let covariance = spectrum.covariance_on_grid(&grid);
        self.levels.push(Level {
            grid: grid.clone(),
            covariance,
        });
        let nyquists: Vec<T> = self.levels.iter().map(|l| l.grid.k_nyquist()).collect();
        self.filters = BandFilters::for_nyquists(&nyquists);
        Ok(grid)
    }

    /// Number of levels.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Whether no level exists yet.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Access a level by index (0 = base).
    pub fn level(&self, level: usize) -> &Level<T> {
        &self.levels[level]
    }

    /// Grid of a level.
    pub fn grid_for_level(&self, level: usize) -> &Arc<Grid<T>> {
        &self.levels[level].grid
    }

    /// Covariance of a level.
    pub fn covariance_for_level(&self, level: usize) -> &[T] {
        &self.levels[level].covariance
    }

    /// Iterate levels root first.
    pub fn levels(&self) -> impl Iterator<Item = &Level<T>> {
        self.levels.iter()
    }

    /// Iterate levels leaf first.
    pub fn levels_leaf_first(&self) -> impl Iterator<Item = &Level<T>> {
        self.levels.iter().rev()
    }

    /// The band-splitting filters of the current hierarchy.
    pub fn filters(&self) -> &BandFilters<T> {
        &self.filters
    }

    /// Replace every level's covariance from a freshly normalized
    /// spectrum.
    pub fn recompute_covariances(&mut self, spectrum: &PowerSpectrum<T>) {
        for level in self.levels.iter_mut() {
            level.covariance = spectrum.covariance_on_grid(&level.grid);
        }
    }
}

impl<T: Real> Default for MultiLevelContext<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::{flat_transfer_table, PowerSpectrum};

    fn spectrum() -> PowerSpectrum<f64> {
        PowerSpectrum::new(&flat_transfer_table(1e-3, 50.0, 100), 1.0)
    }

    #[test]
    fn test_zoom_must_fit_inside_parent() {
        let spectrum = spectrum();
        let mut context = MultiLevelContext::new();
        context
            .add_level(&spectrum, 100.0, 16, [0.0; 3])
            .unwrap();
        let err = context
            .add_level(&spectrum, 25.0, 16, [80.0, 0.0, 0.0])
            .unwrap_err();
        assert!(err.to_string().contains("outside its parent"));
    }

    #[test]
    fn test_nested_levels_and_filters() {
        let spectrum = spectrum();
        let mut context = MultiLevelContext::new();
        context
            .add_level(&spectrum, 100.0, 16, [0.0; 3])
            .unwrap();
        context
            .add_level(&spectrum, 25.0, 16, [37.5, 37.5, 37.5])
            .unwrap();
        assert_eq!(context.num_levels(), 2);
        assert!(context.filters().k_split(0).is_some());
        assert!(context.filters().k_split(1).is_none());
        let dx_zoom = context.grid_for_level(1).dx();
        assert!((dx_zoom - 25.0 / 16.0).abs() < 1e-12);
    }
}
