//! The thermodynamic capability consumed by the solver.
//!
//! The solver never evaluates an equation of state itself. Every phase in a
//! [`crate::multiphase::MultiPhase`] supplies a [`PhaseModel`]: standard-state
//! and composition-dependent chemical potentials, partial molar volumes, and
//! the per-species metadata (elements, weights, charges) the solver copies at
//! construction. Reference implementations live in the companion
//! `mpequil-phases` crate.

use crate::elements::ElementKind;
use serde::{Deserialize, Serialize};

/// Universal gas constant (J mol^-1 K^-1), CODATA 2018.
pub const GAS_CONSTANT: f64 = 8.314_462_618_153_24;

/// Equation-of-state capability tag, resolved once at solver construction.
///
/// Replaces dispatching on a phase-type string: the model states how its
/// standard-state volumes behave and the solver never inspects names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EosKind {
    /// Ideal-gas volumetric behavior (molar volume RT/P).
    IdealGas,
    /// Condensed phase with composition-independent molar volumes.
    CondensedConstantVolume,
    /// Anything else; the solver takes the model's volumes at face value.
    Other,
}

/// How the model expresses activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActivityConvention {
    /// Activities based on mole fractions.
    #[default]
    Molar,
    /// Activities based on molalities; the first species of the phase is the
    /// solvent and sets the molality scale.
    Molality,
}

/// Thermodynamic interface of a single phase.
///
/// Species are addressed by their index local to the phase, 0..n_species().
/// Composition-dependent queries refer to the state installed by the most
/// recent [`PhaseModel::set_state_tp`] / [`PhaseModel::set_mole_fractions`]
/// calls. Potentials are in J/mol, volumes in m^3/mol, temperature in K,
/// pressure in Pa, molecular weights in g/mol.
pub trait PhaseModel {
    /// Display name of the phase.
    fn name(&self) -> &str;

    fn n_species(&self) -> usize;

    fn n_elements(&self) -> usize;

    /// Name of local element `m`. Elements are merged across phases by name.
    fn element_name(&self, m: usize) -> &str;

    /// Conservation-constraint class of local element `m`.
    fn element_kind(&self, _m: usize) -> ElementKind {
        ElementKind::Normal
    }

    fn species_name(&self, k: usize) -> &str;

    fn molecular_weight(&self, k: usize) -> f64;

    /// Charge of species `k` in units of the elementary charge.
    fn charge(&self, k: usize) -> f64;

    /// Stoichiometric coefficient of local element `m` in species `k`.
    fn n_atoms(&self, k: usize, m: usize) -> f64;

    fn eos_kind(&self) -> EosKind;

    fn activity_convention(&self) -> ActivityConvention {
        ActivityConvention::Molar
    }

    /// Install temperature (K) and pressure (Pa).
    fn set_state_tp(&mut self, temperature: f64, pressure: f64);

    /// Install the phase composition. The slice has one entry per species;
    /// entries may carry small positive floors in place of exact zeros so
    /// that potentials stay finite.
    fn set_mole_fractions(&mut self, x: &[f64]);

    /// Chemical potentials at the installed state, one per species (J/mol).
    fn chem_potentials(&self, mu: &mut [f64]);

    /// Standard-state chemical potentials at the installed temperature
    /// (J/mol).
    fn standard_chem_potentials(&self, mu0: &mut [f64]);

    /// Partial molar volumes at the installed state (m^3/mol).
    fn partial_molar_volumes(&self, vbar: &mut [f64]);

    /// Electric potential of the phase (V).
    fn electric_potential(&self) -> f64 {
        0.0
    }

    fn set_electric_potential(&mut self, _phi: f64) {}
}
