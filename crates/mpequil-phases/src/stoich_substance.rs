//! Pure condensed substance.
//!
//! A single-species phase with unit activity: the chemical potential is the
//! standard-state value whatever composition is installed, plus the
//! electrical term when the species is charged. A charged stoichiometric
//! substance is how an electrode enters a mixture; the solver then treats
//! its slot in the unknown vector as the interfacial voltage rather than a
//! mole number.

use crate::thermo::{SpeciesDef, SpeciesSet, FARADAY};
use mpequil_core::errors::{EquilError, EquilResult};
use mpequil_core::phase_model::{EosKind, PhaseModel};

/// Default condensed-phase molar volume (m^3/mol).
const DEFAULT_MOLAR_VOLUME: f64 = 1.0e-5;

/// A pure condensed phase containing exactly one species.
#[derive(Debug, Clone)]
pub struct StoichSubstance {
    name: String,
    species: SpeciesSet,
    /// m^3/mol.
    volume: f64,
    temperature: f64,
    phi: f64,
}

impl StoichSubstance {
    /// Build a pure phase around a single species definition.
    ///
    /// # Errors
    /// Returns a configuration error when the definition carries a
    /// nonpositive molecular weight.
    pub fn new(name: &str, def: SpeciesDef) -> EquilResult<Self> {
        let species = SpeciesSet::from_defs(name, std::slice::from_ref(&def))?;
        Ok(Self {
            name: name.to_string(),
            species,
            volume: DEFAULT_MOLAR_VOLUME,
            temperature: 298.15,
            phi: 0.0,
        })
    }

    /// Replace the molar volume (m^3/mol).
    ///
    /// # Errors
    /// Returns a configuration error on a nonpositive volume.
    pub fn with_molar_volume(mut self, volume: f64) -> EquilResult<Self> {
        if !volume.is_finite() || volume <= 0.0 {
            return Err(EquilError::Configuration(format!(
                "molar volume for phase {} must be positive and finite, got {}",
                self.name, volume
            )));
        }
        self.volume = volume;
        Ok(self)
    }
}

impl PhaseModel for StoichSubstance {
    fn name(&self) -> &str {
        &self.name
    }

    fn n_species(&self) -> usize {
        1
    }

    fn n_elements(&self) -> usize {
        self.species.n_elements()
    }

    fn element_name(&self, m: usize) -> &str {
        self.species.element_name(m)
    }

    fn species_name(&self, k: usize) -> &str {
        self.species.name(k)
    }

    fn molecular_weight(&self, k: usize) -> f64 {
        self.species.weight(k)
    }

    fn charge(&self, k: usize) -> f64 {
        self.species.charge(k)
    }

    fn n_atoms(&self, k: usize, m: usize) -> f64 {
        self.species.n_atoms(k, m)
    }

    fn eos_kind(&self) -> EosKind {
        EosKind::CondensedConstantVolume
    }

    // Condensed-phase potentials and volumes carry no pressure dependence.
    fn set_state_tp(&mut self, temperature: f64, _pressure: f64) {
        self.temperature = temperature;
    }

    // Activity is one; the installed composition is irrelevant.
    fn set_mole_fractions(&mut self, _x: &[f64]) {}

    fn chem_potentials(&self, mu: &mut [f64]) {
        mu[0] = self.species.standard_gibbs(0, self.temperature)
            + self.species.charge(0) * FARADAY * self.phi;
    }

    fn standard_chem_potentials(&self, mu0: &mut [f64]) {
        mu0[0] = self.species.standard_gibbs(0, self.temperature);
    }

    fn partial_molar_volumes(&self, vbar: &mut [f64]) {
        vbar[0] = self.volume;
    }

    fn electric_potential(&self) -> f64 {
        self.phi
    }

    fn set_electric_potential(&mut self, phi: f64) {
        self.phi = phi;
    }
}
