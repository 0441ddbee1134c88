//! The imperative facade coordinating a whole initial-conditions run.
//!
//! [`IcGenerator`] is what a command dispatcher drives: parameter setters,
//! grid creation, cell selection, constraint registration, and the final
//! `done` that projects the field and produces particles. Everything here
//! delegates to the focused modules; the facade owns the run state and the
//! ordering rules (grids before the draw, constraints before `done`).

use num_complex::Complex;
use tracing::{info, warn};

use gaussic_grids::{selection_centroid, zoom_window};

use crate::constraints::{build_covector, Axis, ConstraintApplicator, ConstraintKind};
use crate::cosmology::CosmologicalParameters;
use crate::error::{CoreError, Result};
use crate::estimator::{SpectrumBin, SpectrumEstimator};
use crate::field::Domain;
use crate::multilevel::{MultiLevelContext, MultiLevelField};
use crate::random::RandomFieldGenerator;
use crate::scalar::Real;
use crate::spectrum::{PowerSpectrum, TransferTable};
use crate::zeldovich::{zeldovich_particles, ParticleSet};

/// Whether a constraint value is absolute or multiplies the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// The target is the given value
    Absolute,
    /// The target is the given value times the currently attained value
    Relative,
}

/// Everything `done` produces.
#[derive(Debug, Clone)]
pub struct DoneReport<T: Real> {
    /// Chi-squared of the realization before constraint application
    pub chi2_before: T,
    /// Chi-squared after constraint application
    pub chi2_after: T,
    /// Expected chi-squared increase from the projection
    pub delta_chi2: T,
    /// Zel'dovich particles from the base-level field
    pub particles: ParticleSet<T>,
    /// Measured spectrum per level
    pub spectra: Vec<Vec<SpectrumBin<T>>>,
}

/// Coordinator of one initial-conditions run.
#[derive(Debug)]
pub struct IcGenerator<T: Real> {
    cosmology: CosmologicalParameters<T>,
    context: MultiLevelContext<T>,
    transfer: Option<TransferTable<T>>,
    random: RandomFieldGenerator<T>,
    field: Option<MultiLevelField<T>>,
    applicator: ConstraintApplicator<T>,
    flagged: Vec<usize>,
    centre: [T; 3],
    pending_boxlength: Option<T>,
    pending_n: Option<usize>,
    allow_strays: bool,
    exact_power_spectrum: bool,
}

impl<T: Real> IcGenerator<T> {
    /// A fresh run with default cosmology and seed zero.
    pub fn new() -> Self {
        Self {
            cosmology: CosmologicalParameters::new(),
            context: MultiLevelContext::new(),
            transfer: None,
            random: RandomFieldGenerator::new(0),
            field: None,
            applicator: ConstraintApplicator::new(),
            flagged: Vec::new(),
            centre: [T::zero(); 3],
            pending_boxlength: None,
            pending_n: None,
            allow_strays: false,
            exact_power_spectrum: false,
        }
    }

    // ----- cosmology and run parameters -------------------------------

    /// Current cosmological parameters.
    pub fn cosmology(&self) -> &CosmologicalParameters<T> {
        &self.cosmology
    }

    /// Set the matter density.
    pub fn set_omega_m0(&mut self, value: T) {
        self.cosmology.omega_m0 = value;
    }

    /// Set the cosmological-constant density.
    pub fn set_omega_lambda0(&mut self, value: T) {
        self.cosmology.omega_lambda0 = value;
    }

    /// Set the baryon density.
    pub fn set_omega_baryon0(&mut self, value: T) {
        self.cosmology.omega_baryon0 = value;
    }

    /// Set sigma8.
    pub fn set_sigma8(&mut self, value: T) {
        self.cosmology.sigma8 = value;
    }

    /// Set the scalar spectral index.
    pub fn set_ns(&mut self, value: T) {
        self.cosmology.ns = value;
    }

    /// Set the Hubble parameter.
    pub fn set_hubble(&mut self, value: T) {
        self.cosmology.hubble = value;
    }

    /// Set the target redshift.
    pub fn set_redshift(&mut self, value: T) {
        self.cosmology.set_redshift(value);
    }

    /// Record a box length for a base grid created implicitly later.
    pub fn set_boxlength(&mut self, value: T) {
        self.pending_boxlength = Some(value);
    }

    /// Record a side length for a base grid created implicitly later.
    pub fn set_grid_n(&mut self, value: usize) {
        self.pending_n = Some(value);
    }

    /// Load a transfer-function table from a CAMB-style file.
    pub fn load_transfer_table(&mut self, path: impl AsRef<std::path::Path>) -> Result<()> {
        self.transfer = Some(TransferTable::read(path)?);
        Ok(())
    }

    /// Install a transfer table directly.
    pub fn set_transfer_table(&mut self, table: TransferTable<T>) {
        self.transfer = Some(table);
    }

    /// Permit zoom selections that spill outside the zoom window.
    pub fn set_strays_allowed(&mut self, allowed: bool) {
        self.allow_strays = allowed;
    }

    /// Enforce the exact power spectrum instead of a random amplitude.
    pub fn set_exact_power_spectrum(&mut self, enabled: bool) {
        self.exact_power_spectrum = enabled;
    }

    // ----- seeding ----------------------------------------------------

    /// Seed the random stream, drawing in real space.
    pub fn seed(&mut self, seed: u64) {
        self.random.seed(seed);
        self.random.set_draw_in_fourier_space(false);
        self.random.set_reverse_draw_order(false);
    }

    /// Seed the random stream, drawing mode amplitudes in Fourier space.
    pub fn seed_fourier(&mut self, seed: u64) {
        self.random.seed(seed);
        self.random.set_draw_in_fourier_space(true);
        self.random.set_reverse_draw_order(false);
    }

    /// Like [`seed_fourier`] with the legacy reversed pair order.
    ///
    /// [`seed_fourier`]: IcGenerator::seed_fourier
    pub fn seed_fourier_reverse(&mut self, seed: u64) {
        self.random.seed(seed);
        self.random.set_draw_in_fourier_space(true);
        self.random.set_reverse_draw_order(true);
    }

    // ----- grids ------------------------------------------------------

    /// Create the base grid.
    pub fn init_base_grid(&mut self, boxsize: T, n: usize) -> Result<()> {
        if !self.context.is_empty() {
            return Err(gaussic_grids::GridError::AlreadyInitialized.into());
        }
        if self.field.is_some() {
            return Err(CoreError::FieldAlreadyDrawn);
        }
        let spectrum = self.build_spectrum()?;
        self.context
            .add_level(&spectrum, boxsize, n, [T::zero(); 3])?;
        info!(n, boxsize = boxsize.as_f64(), "created base grid");
        Ok(())
    }

    /// Create a zoom grid around the flagged cells.
    pub fn init_zoom_grid(&mut self, zoom_factor: usize, n: usize) -> Result<()> {
        if self.field.is_some() {
            return Err(CoreError::FieldAlreadyDrawn);
        }
        self.ensure_base()?;
        if self.flagged.is_empty() {
            return Err(CoreError::NoSelection);
        }
        let parent = self
            .context
            .grid_for_level(self.context.num_levels() - 1)
            .clone();
        let base = self.context.grid_for_level(0).clone();

        // express the flagged base cells on the parent level
        let mut parent_cells = Vec::new();
        for &cell in &self.flagged {
            let centroid = base.cell_centroid(cell);
            if parent.contains_point(centroid) {
                parent_cells.push(parent.closest_cell(centroid));
            }
        }
        if parent_cells.is_empty() {
            return Err(CoreError::NoSelection);
        }
        parent_cells.sort_unstable();
        parent_cells.dedup();

        let window = zoom_window(&parent, &parent_cells, zoom_factor, self.allow_strays)?;
        let strays = parent_cells
            .iter()
            .filter(|&&cell| !window.contains(parent.cell_coordinate(cell)))
            .count();
        if strays > 0 {
            warn!(
                strays,
                selected = parent_cells.len(),
                "zoom selection spills outside the zoom window; spilled cells \
                 are interpolated from the parent level"
            );
        }

        let offset = window.offset_lower(&parent);
        let boxsize = parent.boxsize() / T::cast(zoom_factor as f64);
        let spectrum = self.build_spectrum()?;
        self.context.add_level(&spectrum, boxsize, n, offset)?;
        let grid = self.context.grid_for_level(self.context.num_levels() - 1);
        info!(
            n,
            boxsize = boxsize.as_f64(),
            dx = grid.dx().as_f64(),
            origin = ?window.origin,
            "created zoom grid"
        );
        Ok(())
    }

    /// The grid hierarchy.
    pub fn context(&self) -> &MultiLevelContext<T> {
        &self.context
    }

    // ----- selections -------------------------------------------------

    /// Set the reference centre.
    pub fn set_centre(&mut self, centre: [T; 3]) {
        self.centre = centre;
    }

    /// Centre on a base-grid cell.
    pub fn centre_on_cell(&mut self, cell: usize) -> Result<()> {
        self.ensure_base()?;
        let base = self.context.grid_for_level(0);
        if cell >= base.size3() {
            return Err(gaussic_grids::GridError::IndexOutOfBounds {
                index: cell,
                len: base.size3(),
            }
            .into());
        }
        self.centre = base.cell_centroid(cell);
        Ok(())
    }

    /// Replace the flagged-cell set, recentring on it.
    pub fn set_flagged_cells(&mut self, mut cells: Vec<usize>) -> Result<()> {
        self.ensure_base()?;
        let base = self.context.grid_for_level(0).clone();
        if let Some(&bad) = cells.iter().find(|&&c| c >= base.size3()) {
            return Err(gaussic_grids::GridError::IndexOutOfBounds {
                index: bad,
                len: base.size3(),
            }
            .into());
        }
        let before = cells.len();
        cells.sort_unstable();
        cells.dedup();
        if cells.len() < before {
            info!(removed = before - cells.len(), "removed duplicate cell ids");
        }
        self.flagged = cells;
        if !self.flagged.is_empty() {
            self.centre = selection_centroid(base.as_ref(), &self.flagged)?;
        }
        Ok(())
    }

    /// Extend the flagged-cell set, recentring on the union.
    pub fn append_flagged_cells(&mut self, cells: Vec<usize>) -> Result<()> {
        let mut merged = self.flagged.clone();
        merged.extend(cells);
        self.set_flagged_cells(merged)
    }

    /// Keep only the first fraction of the flagged cells.
    pub fn truncate_selection(&mut self, fraction: T) {
        let keep = (T::cast(self.flagged.len() as f64) * fraction)
            .as_f64()
            .max(0.0) as usize;
        self.flagged.truncate(keep);
    }

    /// The flagged base-level cells.
    pub fn flagged_cells(&self) -> &[usize] {
        &self.flagged
    }

    fn select_where(&mut self, predicate: impl Fn([T; 3]) -> bool) -> Result<()> {
        self.ensure_base()?;
        let base = self.context.grid_for_level(0).clone();
        let centre = self.centre;
        let mut cells = Vec::new();
        for cell in base.cells() {
            let p = base.cell_centroid(cell.index);
            let delta = [
                base.wrapped_delta(p[0], centre[0]),
                base.wrapped_delta(p[1], centre[1]),
                base.wrapped_delta(p[2], centre[2]),
            ];
            if predicate(delta) {
                cells.push(cell.index);
            }
        }
        self.flagged = cells;
        info!(count = self.flagged.len(), "flagged cells by geometry");
        Ok(())
    }

    /// Flag the cells within a sphere around the centre.
    pub fn select_sphere(&mut self, radius: T) -> Result<()> {
        let r2 = radius * radius;
        self.select_where(|d| d[0] * d[0] + d[1] * d[1] + d[2] * d[2] < r2)
    }

    /// Flag the cells within an axis-aligned cube around the centre.
    pub fn select_cube(&mut self, side: T) -> Result<()> {
        let half = side / T::cast(2.0);
        self.select_where(move |d| {
            d.iter()
                .all(|&component| num_traits::Float::abs(component) < half)
        })
    }

    /// Flag the single cell nearest the centre.
    pub fn select_nearest(&mut self) -> Result<()> {
        self.ensure_base()?;
        let base = self.context.grid_for_level(0);
        self.flagged = vec![base.closest_cell(self.centre)];
        Ok(())
    }

    // ----- the realization --------------------------------------------

    fn ensure_base(&mut self) -> Result<()> {
        if !self.context.is_empty() {
            return Ok(());
        }
        match (self.pending_boxlength, self.pending_n) {
            (Some(boxsize), Some(n)) => self.init_base_grid(boxsize, n),
            _ => Err(CoreError::BaseGridMissing),
        }
    }

    fn build_spectrum(&self) -> Result<PowerSpectrum<T>> {
        let table = self.transfer.as_ref().ok_or(CoreError::SpectrumMissing)?;
        let mut spectrum = PowerSpectrum::new(table, self.cosmology.ns);
        spectrum.normalize(&self.cosmology);
        Ok(spectrum)
    }

    /// Draw the random component if it has not been drawn yet.
    pub fn ensure_field(&mut self) -> Result<()> {
        if self.field.is_some() {
            return Ok(());
        }
        self.ensure_base()?;
        self.draw_field()?;
        Ok(())
    }

    fn draw_field(&mut self) -> Result<()> {
        // the covariances must reflect the final cosmology, which may have
        // changed since the grids were created
        let spectrum = self.build_spectrum()?;
        self.context.recompute_covariances(&spectrum);

        let mut field = MultiLevelField::zeros(&self.context, Domain::Real);
        for level_field in field.fields_mut() {
            self.random.draw_onto(level_field);
        }
        if self.exact_power_spectrum {
            field.enforce_exact_power_spectrum(&self.context)?;
        } else {
            field.apply_power_spectrum(&self.context)?;
        }
        let chi2 = field.chi2(&self.context)?;
        info!(chi2 = chi2.as_f64(), "drew random realization");
        self.field = Some(field);
        Ok(())
    }

    /// The current realization, drawing it on first use.
    pub fn realization(&mut self) -> Result<&mut MultiLevelField<T>> {
        self.ensure_field()?;
        Ok(self.field.as_mut().expect("field drawn by ensure_field"))
    }

    fn check_level(&self, level: usize) -> Result<()> {
        if level >= self.context.num_levels() {
            return Err(gaussic_grids::GridError::IndexOutOfBounds {
                index: level,
                len: self.context.num_levels(),
            }
            .into());
        }
        Ok(())
    }

    /// Zero one level's field (testing aid).
    pub fn zero_level(&mut self, level: usize) -> Result<()> {
        self.check_level(level)?;
        warn!(level, "zeroing a level's field; for testing only");
        let field = self.realization()?.field_mut(level);
        for value in field.values_mut() {
            *value = Complex::new(T::zero(), T::zero());
        }
        Ok(())
    }

    /// Sign-flip the whole realization.
    pub fn reverse(&mut self) -> Result<()> {
        self.realization()?.negate();
        Ok(())
    }

    /// Sign-flip the modes below a wavenumber cut, preserving the rest
    /// bitwise.
    pub fn reverse_small_k(&mut self, k_cut: T) -> Result<()> {
        let k2_cut = k_cut * k_cut;
        let field = self.realization()?;
        field.to_fourier();
        for level_field in field.fields_mut() {
            let grid = level_field.grid().clone();
            let mut reversed = 0usize;
            for cell in grid.fourier_cells() {
                if cell.k_squared < k2_cut && cell.k_squared != T::zero() {
                    let value = &mut level_field.values_mut()[cell.index];
                    *value = -*value;
                    reversed += 1;
                }
            }
            info!(
                reversed,
                total = grid.size3(),
                k_cut = k_cut.as_f64(),
                "reversed small-k modes"
            );
        }
        Ok(())
    }

    /// Re-draw the modes below a wavenumber cut with a new seed, keeping
    /// the modes above it bitwise.
    pub fn reseed_small_k(&mut self, k_cut: T, seed: u64) -> Result<()> {
        let k2_cut = k_cut * k_cut;
        self.ensure_field()?;
        let mut original = self.field.take().expect("field drawn by ensure_field");
        original.to_fourier();

        self.random.seed(seed);
        self.draw_field()?;
        let field = self.field.as_mut().expect("field just re-drawn");
        field.to_fourier();
        for (level, level_field) in field.fields_mut().enumerate() {
            let grid = level_field.grid().clone();
            let old = original.field(level);
            for cell in grid.fourier_cells() {
                if cell.k_squared > k2_cut {
                    level_field.values_mut()[cell.index] = old.values()[cell.index];
                }
            }
        }
        Ok(())
    }

    // ----- constraints ------------------------------------------------

    fn covector(&mut self, kind: ConstraintKind) -> Result<MultiLevelField<T>> {
        self.ensure_field()?;
        build_covector(&self.context, &self.flagged, &self.cosmology, kind)
    }

    /// Evaluate a linear functional of the current realization.
    pub fn calculate(&mut self, kind: ConstraintKind) -> Result<Complex<T>> {
        let covector = self.covector(kind)?;
        let field = self.realization()?;
        field.to_fourier();
        let value = covector.inner_product(field)?;
        info!(kind = ?kind, value = %value, "calculated constraint value");
        Ok(value)
    }

    /// Register one scalar constraint.
    pub fn constrain(&mut self, kind: ConstraintKind, target: TargetKind, value: T) -> Result<()> {
        let covector = self.covector(kind)?;
        let field = self.realization()?;
        field.to_fourier();
        let initial = covector.inner_product(field)?;
        let target = match target {
            TargetKind::Absolute => Complex::new(value, T::zero()),
            TargetKind::Relative => initial * value,
        };
        info!(kind = ?kind, initial = %initial, target = %target, "registered constraint");
        self.applicator.add_constraint(covector, target, initial)
    }

    /// Register the three constraints fixing the angular-momentum
    /// direction of the selection.
    pub fn constrain_direction(
        &mut self,
        direction: [T; 3],
        renormalize: Option<T>,
    ) -> Result<()> {
        self.ensure_field()?;
        let mut covectors = Vec::with_capacity(3);
        let mut initials = Vec::with_capacity(3);
        for axis in Axis::all() {
            let covector = self.covector(ConstraintKind::AngularMomentum(axis))?;
            let field = self.realization()?;
            field.to_fourier();
            initials.push(covector.inner_product(field)?);
            covectors.push(covector);
        }
        let covectors: [MultiLevelField<T>; 3] =
            covectors.try_into().expect("three covectors collected");
        let initials: [Complex<T>; 3] = [initials[0], initials[1], initials[2]];
        info!(direction = ?direction.map(|d| d.as_f64()), "registered direction constraint");
        self.applicator
            .add_direction_constraint(covectors, initials, direction, renormalize)
    }

    /// Number of registered, not yet applied constraints.
    pub fn pending_constraints(&self) -> usize {
        self.applicator.len()
    }

    // ----- the finale -------------------------------------------------

    /// Apply all constraints, run the Zel'dovich map on the base level and
    /// measure the realized spectra.
    pub fn done(&mut self) -> Result<DoneReport<T>> {
        self.ensure_field()?;
        let context = self.context.clone();
        let field = self.field.as_mut().expect("field drawn by ensure_field");
        field.to_fourier();

        let chi2_before = field.chi2(&context)?;
        let outcome = self.applicator.apply(field, &context)?;
        self.applicator.clear();
        let chi2_after = field.chi2(&context)?;
        info!(
            chi2_before = chi2_before.as_f64(),
            chi2_after = chi2_after.as_f64(),
            delta_chi2 = outcome.delta_chi2.as_f64(),
            "applied constraints"
        );

        let particles = zeldovich_particles(field.field(0), &self.cosmology)?;

        let estimator = SpectrumEstimator::new();
        let mut spectra = Vec::new();
        for level in 0..context.num_levels() {
            spectra.push(estimator.measure(field.field(level), context.covariance_for_level(level))?);
        }

        Ok(DoneReport {
            chi2_before,
            chi2_after,
            delta_chi2: outcome.delta_chi2,
            particles,
            spectra,
        })
    }

    /// Measure the spectrum of one level of the current realization.
    pub fn measured_spectrum(&mut self, level: usize) -> Result<Vec<SpectrumBin<T>>> {
        self.ensure_field()?;
        self.check_level(level)?;
        let context = self.context.clone();
        let field = self.realization()?;
        field.to_fourier();
        SpectrumEstimator::new().measure(field.field(level), context.covariance_for_level(level))
    }

    /// Real-space values of one level of the current realization.
    pub fn level_field_real(&mut self, level: usize) -> Result<Vec<T>> {
        self.ensure_field()?;
        self.check_level(level)?;
        let field = self.realization()?;
        let mut copy = field.field(level).clone();
        copy.to_real();
        Ok(copy.values().iter().map(|c| c.re).collect())
    }
}

impl<T: Real> Default for IcGenerator<T> {
    fn default() -> Self {
        Self::new()
    }
}
