//! Caller-facing mixture container.
//!
//! A [`MultiPhase`] owns the phase models plus the global species mole
//! vector, temperature and pressure. The solver deep-copies everything it
//! needs out of the container at construction and writes the equilibrium
//! composition back at the end of a solve, so the container is never mutated
//! mid-iteration.

use crate::errors::{EquilError, EquilResult};
use crate::phase_model::PhaseModel;
use std::collections::HashMap;

/// A mixture of phases sharing one temperature and pressure.
///
/// Species have a global index ordered phase by phase: the species of phase 0
/// come first, then phase 1, and so on. Mole numbers are in mol.
pub struct MultiPhase {
    phases: Vec<Box<dyn PhaseModel>>,
    /// Global index of each phase's first species.
    starts: Vec<usize>,
    moles: Vec<f64>,
    inert_moles: Vec<f64>,
    temperature: f64,
    pressure: f64,
    /// Explicit element targets by element name. When empty, targets are
    /// derived from the initial mole numbers.
    element_targets: HashMap<String, f64>,
}

impl MultiPhase {
    /// Create an empty mixture at the given temperature (K) and pressure
    /// (Pa).
    pub fn new(temperature: f64, pressure: f64) -> Self {
        Self {
            phases: Vec::new(),
            starts: Vec::new(),
            moles: Vec::new(),
            inert_moles: Vec::new(),
            temperature,
            pressure,
            element_targets: HashMap::new(),
        }
    }

    /// Add a phase with all species at zero moles. Returns the phase index.
    pub fn add_phase(&mut self, model: Box<dyn PhaseModel>) -> usize {
        let start = self.moles.len();
        let n = model.n_species();
        self.starts.push(start);
        self.moles.extend(std::iter::repeat(0.0).take(n));
        self.inert_moles.push(0.0);
        self.phases.push(model);
        self.phases.len() - 1
    }

    /// Add a phase together with its species mole numbers.
    ///
    /// # Errors
    /// Returns a configuration error if `moles` does not have one entry per
    /// species of the model.
    pub fn add_phase_with_moles(
        &mut self,
        model: Box<dyn PhaseModel>,
        moles: &[f64],
    ) -> EquilResult<usize> {
        if moles.len() != model.n_species() {
            return Err(EquilError::Configuration(format!(
                "phase {} declares {} species but {} mole numbers were supplied",
                model.name(),
                model.n_species(),
                moles.len()
            )));
        }
        let index = self.add_phase(model);
        let start = self.starts[index];
        self.moles[start..start + moles.len()].copy_from_slice(moles);
        Ok(index)
    }

    pub fn n_phases(&self) -> usize {
        self.phases.len()
    }

    /// Total species count across all phases.
    pub fn n_species(&self) -> usize {
        self.moles.len()
    }

    /// Global index of the first species of phase `i`.
    pub fn phase_start(&self, i: usize) -> usize {
        self.starts[i]
    }

    /// Phase index owning global species `k`, with the index local to that
    /// phase.
    pub fn phase_of_species(&self, k: usize) -> (usize, usize) {
        assert!(k < self.n_species(), "species index {} out of range", k);
        let mut phase = self.starts.len() - 1;
        while self.starts[phase] > k {
            phase -= 1;
        }
        (phase, k - self.starts[phase])
    }

    pub fn phase(&self, i: usize) -> &dyn PhaseModel {
        self.phases[i].as_ref()
    }

    pub fn phase_mut(&mut self, i: usize) -> &mut dyn PhaseModel {
        self.phases[i].as_mut()
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
    }

    pub fn set_pressure(&mut self, pressure: f64) {
        self.pressure = pressure;
    }

    /// Global species mole numbers (mol). For a species whose unknown is an
    /// interfacial voltage, the entry is the voltage in volts.
    pub fn species_moles(&self) -> &[f64] {
        &self.moles
    }

    /// Replace the global species mole vector.
    ///
    /// # Errors
    /// Returns a configuration error on length mismatch.
    pub fn set_species_moles(&mut self, moles: &[f64]) -> EquilResult<()> {
        if moles.len() != self.moles.len() {
            return Err(EquilError::Configuration(format!(
                "expected {} mole numbers, got {}",
                self.moles.len(),
                moles.len()
            )));
        }
        self.moles.copy_from_slice(moles);
        Ok(())
    }

    /// Moles of inert (non-reacting) material carried by phase `i`. Inert
    /// moles dilute the phase but never enter any reaction.
    pub fn inert_moles(&self, i: usize) -> f64 {
        self.inert_moles[i]
    }

    pub fn set_inert_moles(&mut self, i: usize, value: f64) -> EquilResult<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(EquilError::Configuration(format!(
                "inert moles for phase {} must be finite and nonnegative, got {}",
                i, value
            )));
        }
        self.inert_moles[i] = value;
        Ok(())
    }

    /// Fix the target abundance of one element by name, overriding the value
    /// derived from the initial composition.
    pub fn set_element_target(&mut self, element: &str, moles: f64) {
        self.element_targets.insert(element.to_string(), moles);
    }

    pub fn element_targets(&self) -> &HashMap<String, f64> {
        &self.element_targets
    }

    /// Sum of all species mole numbers.
    pub fn total_moles(&self) -> f64 {
        self.moles.iter().sum()
    }
}
