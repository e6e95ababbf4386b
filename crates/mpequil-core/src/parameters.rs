//! Solver Parameters
//!
//! Tolerances, cutoffs and switches for the VCS equilibrium iteration.
//!
//! # Tolerance Pairs
//!
//! Convergence uses two paired tolerance sets: driving-force tolerances
//! (`tol_major`, `tol_minor`) on the dimensionless reaction Gibbs energies,
//! and element-abundance tolerances (`tol_element_major`,
//! `tol_element_minor`) on the relative residuals of the conservation
//! constraints. The major pair decides convergence; the minor pair gates the
//! cheaper mid-iteration correction work.

use crate::errors::{EquilError, EquilResult};
use serde::{Deserialize, Serialize};

/// Driving-force tolerance for major species (dimensionless).
pub const TOL_MAJOR: f64 = 1e-8;

/// Driving-force tolerance for minor species (dimensionless).
pub const TOL_MINOR: f64 = 1e-6;

/// Relative element-abundance tolerance paired with `TOL_MAJOR`.
pub const TOL_ELEMENT_MAJOR: f64 = 1e-10;

/// Relative element-abundance tolerance paired with `TOL_MINOR`.
pub const TOL_ELEMENT_MINOR: f64 = 1e-8;

/// Default iteration budget for a single solve.
pub const MAX_ITERATIONS: usize = 500;

/// Mole-fraction threshold below which a species is classified Minor.
pub const MINOR_MOLE_FRACTION: f64 = 1e-5;

/// Mole numbers below this are treated as exactly zero.
pub const SPECIES_DELETE_CUTOFF: f64 = 1e-32;

/// Phase totals below this allow the whole phase to be zeroed.
pub const PHASE_DELETE_CUTOFF: f64 = 1e-13;

/// Fraction of a phase's total moles given to a reborn species.
pub const REBIRTH_MOLE_FRACTION: f64 = 1e-10;

/// Parameters controlling a VCS equilibrium solve.
///
/// All tolerances apply to dimensionless quantities (chemical potentials are
/// scaled by RT, element residuals are relative). Construction of a solver
/// validates these via [`SolverParameters::validate`]; invalid values are a
/// configuration error, not a panic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverParameters {
    /// Convergence tolerance on the driving force of reactions whose species
    /// is classified Major.
    /// default: 1e-8
    pub tol_major: f64,

    /// Convergence tolerance on the driving force of reactions whose species
    /// is classified Minor.
    /// default: 1e-6
    pub tol_minor: f64,

    /// Relative element-abundance residual required at convergence.
    /// default: 1e-10
    pub tol_element_major: f64,

    /// Relative element-abundance residual above which the mid-iteration
    /// abundance correction runs.
    /// default: 1e-8
    pub tol_element_minor: f64,

    /// Hard cap on iterations per solve. A solve that exhausts this budget
    /// reports NotConverged; there is no infinite-loop fallback.
    /// default: 500
    pub max_iterations: usize,

    /// Species with mole fraction below this (relative to their phase) are
    /// classified Minor and updated conservatively.
    /// default: 1e-5
    pub minor_mole_fraction: f64,

    /// Mole numbers driven below this are snapped to zero and the species is
    /// classified Zeroed.
    /// default: 1e-32
    pub species_delete_cutoff: f64,

    /// An existent phase whose mole total falls below this (and whose member
    /// reactions are all unfavorable) is zeroed as a whole.
    /// default: 1e-13
    pub phase_delete_cutoff: f64,

    /// Seed size for reborn species, as a fraction of the phase total.
    /// default: 1e-10
    pub rebirth_mole_fraction: f64,

    /// Number of step-halvings attempted when a full step raises the total
    /// Gibbs energy.
    /// default: 4
    pub line_search_retries: usize,

    /// Record wall-clock time for each solve. Advisory only; never affects
    /// control flow.
    /// default: false
    pub enable_timing: bool,
}

impl Default for SolverParameters {
    fn default() -> Self {
        Self {
            // Driving-force tolerances
            tol_major: TOL_MAJOR,
            tol_minor: TOL_MINOR,

            // Element-abundance tolerances
            tol_element_major: TOL_ELEMENT_MAJOR,
            tol_element_minor: TOL_ELEMENT_MINOR,

            // Iteration budget
            max_iterations: MAX_ITERATIONS,

            // Species classification and deletion
            minor_mole_fraction: MINOR_MOLE_FRACTION,
            species_delete_cutoff: SPECIES_DELETE_CUTOFF,
            phase_delete_cutoff: PHASE_DELETE_CUTOFF,
            rebirth_mole_fraction: REBIRTH_MOLE_FRACTION,

            // Step control
            line_search_retries: 4,

            // Instrumentation
            enable_timing: false,
        }
    }
}

impl SolverParameters {
    /// Check that the parameter set describes a usable solve.
    ///
    /// # Errors
    ///
    /// Returns [`EquilError::Configuration`] if any tolerance or cutoff is
    /// nonpositive or not finite, or if the iteration budget is zero.
    pub fn validate(&self) -> EquilResult<()> {
        let positive = [
            ("tol_major", self.tol_major),
            ("tol_minor", self.tol_minor),
            ("tol_element_major", self.tol_element_major),
            ("tol_element_minor", self.tol_element_minor),
            ("minor_mole_fraction", self.minor_mole_fraction),
            ("species_delete_cutoff", self.species_delete_cutoff),
            ("phase_delete_cutoff", self.phase_delete_cutoff),
            ("rebirth_mole_fraction", self.rebirth_mole_fraction),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(EquilError::Configuration(format!(
                    "parameter {} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        if self.max_iterations == 0 {
            return Err(EquilError::Configuration(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.minor_mole_fraction >= 1.0 {
            return Err(EquilError::Configuration(format!(
                "minor_mole_fraction must be below 1, got {}",
                self.minor_mole_fraction
            )));
        }
        Ok(())
    }
}
