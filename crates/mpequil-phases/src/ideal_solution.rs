//! Condensed ideal solution.
//!
//! Activities equal mole fractions and the standard state is the pure
//! condensed species at the system temperature,
//!
//! ```text
//! mu_k = mu0_k(T) + RT ln x_k + z_k F phi
//! ```
//!
//! where the electrical term contributes only for charged species in a phase
//! held at potential `phi`. Molar volumes are per species and composition
//! independent.

use crate::thermo::{SpeciesDef, SpeciesSet, FARADAY};
use mpequil_core::errors::{EquilError, EquilResult};
use mpequil_core::phase_model::{EosKind, PhaseModel, GAS_CONSTANT};

/// Default condensed-phase molar volume (m^3/mol).
const DEFAULT_MOLAR_VOLUME: f64 = 1.0e-5;

/// A condensed phase mixing its species ideally.
#[derive(Debug, Clone)]
pub struct IdealSolutionPhase {
    name: String,
    species: SpeciesSet,
    /// m^3/mol, one entry per species.
    volumes: Vec<f64>,
    temperature: f64,
    x: Vec<f64>,
    phi: f64,
}

impl IdealSolutionPhase {
    /// Build a solution phase from species definitions, with a generic
    /// condensed-phase molar volume for every species.
    ///
    /// # Errors
    /// Returns a configuration error when the species list is empty or a
    /// definition carries a nonpositive molecular weight.
    pub fn new(name: &str, defs: &[SpeciesDef]) -> EquilResult<Self> {
        let species = SpeciesSet::from_defs(name, defs)?;
        let n = species.n_species();
        Ok(Self {
            name: name.to_string(),
            species,
            volumes: vec![DEFAULT_MOLAR_VOLUME; n],
            temperature: 298.15,
            x: vec![1.0 / n as f64; n],
            phi: 0.0,
        })
    }

    /// Replace the per-species molar volumes (m^3/mol).
    ///
    /// # Errors
    /// Returns a configuration error on a length mismatch or a nonpositive
    /// volume.
    pub fn with_molar_volumes(mut self, volumes: &[f64]) -> EquilResult<Self> {
        if volumes.len() != self.species.n_species() {
            return Err(EquilError::Configuration(format!(
                "phase {} declares {} species but {} molar volumes were supplied",
                self.name,
                self.species.n_species(),
                volumes.len()
            )));
        }
        for &v in volumes {
            if !v.is_finite() || v <= 0.0 {
                return Err(EquilError::Configuration(format!(
                    "molar volumes for phase {} must be positive and finite, got {}",
                    self.name, v
                )));
            }
        }
        self.volumes.copy_from_slice(volumes);
        Ok(self)
    }
}

impl PhaseModel for IdealSolutionPhase {
    fn name(&self) -> &str {
        &self.name
    }

    fn n_species(&self) -> usize {
        self.species.n_species()
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

    fn set_mole_fractions(&mut self, x: &[f64]) {
        self.x.copy_from_slice(x);
    }

    fn chem_potentials(&self, mu: &mut [f64]) {
        let rt = GAS_CONSTANT * self.temperature;
        for k in 0..self.species.n_species() {
            mu[k] = self.species.standard_gibbs(k, self.temperature)
                + rt * self.x[k].max(1e-300).ln()
                + self.species.charge(k) * FARADAY * self.phi;
        }
    }

    fn standard_chem_potentials(&self, mu0: &mut [f64]) {
        for k in 0..self.species.n_species() {
            mu0[k] = self.species.standard_gibbs(k, self.temperature);
        }
    }

    fn partial_molar_volumes(&self, vbar: &mut [f64]) {
        vbar[..self.volumes.len()].copy_from_slice(&self.volumes);
    }

    fn electric_potential(&self) -> f64 {
        self.phi
    }

    fn set_electric_potential(&mut self, phi: f64) {
        self.phi = phi;
    }
}
