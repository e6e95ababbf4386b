//! Ideal-gas mixture.
//!
//! The standard state is the pure ideal gas at [`STANDARD_PRESSURE`], so the
//! chemical potentials pick up both a pressure and a composition term,
//!
//! ```text
//! mu_k = mu0_k(T) + RT (ln(P / P0) + ln x_k)
//! ```
//!
//! and every partial molar volume is RT/P.

use crate::thermo::{SpeciesDef, SpeciesSet, STANDARD_PRESSURE};
use mpequil_core::errors::EquilResult;
use mpequil_core::phase_model::{EosKind, PhaseModel, GAS_CONSTANT};

/// An ideal-gas solution phase.
#[derive(Debug, Clone)]
pub struct IdealGasPhase {
    name: String,
    species: SpeciesSet,
    temperature: f64,
    pressure: f64,
    x: Vec<f64>,
}

impl IdealGasPhase {
    /// Build a gas phase from species definitions. The initial state is
    /// 298.15 K, the standard pressure, and a uniform composition.
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
            temperature: 298.15,
            pressure: STANDARD_PRESSURE,
            x: vec![1.0 / n as f64; n],
        })
    }
}

impl PhaseModel for IdealGasPhase {
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
        EosKind::IdealGas
    }

    fn set_state_tp(&mut self, temperature: f64, pressure: f64) {
        self.temperature = temperature;
        self.pressure = pressure;
    }

    fn set_mole_fractions(&mut self, x: &[f64]) {
        self.x.copy_from_slice(x);
    }

    fn chem_potentials(&self, mu: &mut [f64]) {
        let rt = GAS_CONSTANT * self.temperature;
        let pressure_term = (self.pressure / STANDARD_PRESSURE).ln();
        for k in 0..self.species.n_species() {
            mu[k] = self.species.standard_gibbs(k, self.temperature)
                + rt * (pressure_term + self.x[k].max(1e-300).ln());
        }
    }

    fn standard_chem_potentials(&self, mu0: &mut [f64]) {
        for k in 0..self.species.n_species() {
            mu0[k] = self.species.standard_gibbs(k, self.temperature);
        }
    }

    fn partial_molar_volumes(&self, vbar: &mut [f64]) {
        let v = GAS_CONSTANT * self.temperature / self.pressure;
        for entry in vbar.iter_mut().take(self.species.n_species()) {
            *entry = v;
        }
    }
}
