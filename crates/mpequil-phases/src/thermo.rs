//! Standard-state thermodynamic data.
//!
//! Species handed to the phase models are described by a [`SpeciesDef`]:
//! name, elemental composition, molecular weight, charge, and a
//! constant-heat-capacity reference model supplying the standard-state Gibbs
//! energy as a function of temperature.

use mpequil_core::errors::{EquilError, EquilResult};
use serde::{Deserialize, Serialize};

/// Reference pressure of the standard state (Pa).
pub const STANDARD_PRESSURE: f64 = 101_325.0;

/// Faraday constant (C/mol), CODATA 2018.
pub const FARADAY: f64 = 96_485.332_123_31;

/// Constant-heat-capacity reference thermodynamics for one species.
///
/// Enthalpy and entropy integrate away from the reference temperature `t0`
/// with a fixed heat capacity:
///
/// ```text
/// h(T) = h0 + cp0 (T - t0)
/// s(T) = s0 + cp0 ln(T / t0)
/// g(T) = h(T) - T s(T)
/// ```
///
/// Units: `h0` in J/mol, `s0` and `cp0` in J/(mol K), `t0` in K. With
/// `s0 = cp0 = 0` the Gibbs energy is the constant `h0`, which is convenient
/// for constructing test problems with prescribed equilibrium constants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConstantCpThermo {
    pub t0: f64,
    pub h0: f64,
    pub s0: f64,
    pub cp0: f64,
}

impl ConstantCpThermo {
    pub fn new(t0: f64, h0: f64, s0: f64, cp0: f64) -> Self {
        Self { t0, h0, s0, cp0 }
    }

    /// Standard-state Gibbs energy at `temperature` (J/mol).
    pub fn gibbs(&self, temperature: f64) -> f64 {
        let h = self.h0 + self.cp0 * (temperature - self.t0);
        let s = self.s0 + self.cp0 * (temperature / self.t0).ln();
        h - temperature * s
    }
}

/// Complete description of one species as consumed by the phase models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesDef {
    pub name: String,
    /// g/mol.
    pub weight: f64,
    /// Units of the elementary charge.
    pub charge: f64,
    /// (element name, atom count) pairs.
    pub composition: Vec<(String, f64)>,
    pub thermo: ConstantCpThermo,
}

impl SpeciesDef {
    pub fn new(
        name: &str,
        weight: f64,
        composition: &[(&str, f64)],
        thermo: ConstantCpThermo,
    ) -> Self {
        Self {
            name: name.to_string(),
            weight,
            charge: 0.0,
            composition: composition
                .iter()
                .map(|(element, count)| ((*element).to_string(), *count))
                .collect(),
            thermo,
        }
    }

    pub fn with_charge(mut self, charge: f64) -> Self {
        self.charge = charge;
        self
    }
}

/// Species table shared by the phase models: validated attributes, the
/// element list merged in order of first appearance, and a dense
/// species x element composition matrix.
#[derive(Debug, Clone)]
pub(crate) struct SpeciesSet {
    names: Vec<String>,
    weights: Vec<f64>,
    charges: Vec<f64>,
    elements: Vec<String>,
    composition: Vec<Vec<f64>>,
    thermo: Vec<ConstantCpThermo>,
}

impl SpeciesSet {
    /// Validate the definitions and build the merged table. `phase` is only
    /// used for error messages.
    pub(crate) fn from_defs(phase: &str, defs: &[SpeciesDef]) -> EquilResult<Self> {
        if defs.is_empty() {
            return Err(EquilError::Configuration(format!(
                "phase {} declares no species",
                phase
            )));
        }

        let mut elements: Vec<String> = Vec::new();
        for def in defs {
            if !def.weight.is_finite() || def.weight <= 0.0 {
                return Err(EquilError::Configuration(format!(
                    "species {} in phase {} has molecular weight {}",
                    def.name, phase, def.weight
                )));
            }
            for (element, count) in &def.composition {
                if !count.is_finite() {
                    return Err(EquilError::Configuration(format!(
                        "species {} in phase {} has a nonfinite {} atom count",
                        def.name, phase, element
                    )));
                }
                if !elements.iter().any(|e| e == element) {
                    elements.push(element.clone());
                }
            }
        }

        let composition = defs
            .iter()
            .map(|def| {
                elements
                    .iter()
                    .map(|e| {
                        def.composition
                            .iter()
                            .filter(|(name, _)| name == e)
                            .map(|(_, count)| *count)
                            .sum()
                    })
                    .collect()
            })
            .collect();

        Ok(Self {
            names: defs.iter().map(|d| d.name.clone()).collect(),
            weights: defs.iter().map(|d| d.weight).collect(),
            charges: defs.iter().map(|d| d.charge).collect(),
            elements,
            composition,
            thermo: defs.iter().map(|d| d.thermo).collect(),
        })
    }

    pub(crate) fn n_species(&self) -> usize {
        self.names.len()
    }

    pub(crate) fn name(&self, k: usize) -> &str {
        &self.names[k]
    }

    pub(crate) fn weight(&self, k: usize) -> f64 {
        self.weights[k]
    }

    pub(crate) fn charge(&self, k: usize) -> f64 {
        self.charges[k]
    }

    pub(crate) fn n_elements(&self) -> usize {
        self.elements.len()
    }

    pub(crate) fn element_name(&self, m: usize) -> &str {
        &self.elements[m]
    }

    pub(crate) fn n_atoms(&self, k: usize, m: usize) -> f64 {
        self.composition[k][m]
    }

    /// Standard-state Gibbs energy of species `k` at `temperature` (J/mol).
    pub(crate) fn standard_gibbs(&self, k: usize, temperature: f64) -> f64 {
        self.thermo[k].gibbs(temperature)
    }
}
