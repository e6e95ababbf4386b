#![allow(dead_code)]

//! Minimal phase models backing the core's own unit tests.
//!
//! These keep the test setups short: composition-independent standard-state
//! potentials given directly in dimensionless form, ideal-mixture activities,
//! and constant molar volumes. Real models live in the companion
//! `mpequil-phases` crate.

use crate::elements::ElementKind;
use crate::phase_model::{ActivityConvention, EosKind, PhaseModel, GAS_CONSTANT};

/// An ideal mixture whose species have fixed dimensionless standard
/// potentials: mu_k = RT * (mu0_rt[k] + ln x_k).
///
/// With a single species this doubles as a stoichiometric (pure condensed)
/// phase, since ln 1 = 0.
#[derive(Debug, Clone)]
pub(crate) struct SimpleSolution {
    name: String,
    species: Vec<String>,
    elements: Vec<String>,
    element_kinds: Vec<ElementKind>,
    /// nsp x nel composition coefficients.
    composition: Vec<Vec<f64>>,
    mu0_rt: Vec<f64>,
    weights: Vec<f64>,
    charges: Vec<f64>,
    convention: ActivityConvention,
    eos: EosKind,
    molar_volume: f64,
    temperature: f64,
    pressure: f64,
    x: Vec<f64>,
    phi: f64,
}

impl SimpleSolution {
    /// Build from (species name, [(element name, coefficient)]) pairs and
    /// the matching dimensionless standard potentials. Elements are ordered
    /// by first appearance.
    pub(crate) fn new(name: &str, species: &[(&str, &[(&str, f64)])], mu0_rt: &[f64]) -> Self {
        assert_eq!(species.len(), mu0_rt.len(), "one mu0 per species");

        let mut elements: Vec<String> = Vec::new();
        for (_, comp) in species {
            for (elem, _) in comp.iter() {
                if !elements.iter().any(|e| e == elem) {
                    elements.push((*elem).to_string());
                }
            }
        }

        let composition = species
            .iter()
            .map(|(_, comp)| {
                elements
                    .iter()
                    .map(|e| {
                        comp.iter()
                            .filter(|(name, _)| name == e)
                            .map(|(_, c)| *c)
                            .sum()
                    })
                    .collect()
            })
            .collect();

        let n = species.len();
        Self {
            name: name.to_string(),
            species: species.iter().map(|(s, _)| (*s).to_string()).collect(),
            element_kinds: vec![ElementKind::Normal; elements.len()],
            elements,
            composition,
            mu0_rt: mu0_rt.to_vec(),
            weights: vec![10.0; n],
            charges: vec![0.0; n],
            convention: ActivityConvention::Molar,
            eos: EosKind::CondensedConstantVolume,
            molar_volume: 1e-5,
            temperature: 298.15,
            pressure: 101_325.0,
            x: vec![1.0 / n as f64; n],
            phi: 0.0,
        }
    }

    pub(crate) fn with_charges(mut self, charges: &[f64]) -> Self {
        assert_eq!(charges.len(), self.species.len());
        self.charges = charges.to_vec();
        self
    }

    pub(crate) fn with_weights(mut self, weights: &[f64]) -> Self {
        assert_eq!(weights.len(), self.species.len());
        self.weights = weights.to_vec();
        self
    }

    pub(crate) fn with_convention(mut self, convention: ActivityConvention) -> Self {
        self.convention = convention;
        self
    }

    pub(crate) fn with_eos(mut self, eos: EosKind) -> Self {
        self.eos = eos;
        self
    }

    pub(crate) fn with_element_kinds(mut self, kinds: &[ElementKind]) -> Self {
        assert_eq!(kinds.len(), self.elements.len());
        self.element_kinds = kinds.to_vec();
        self
    }

    pub(crate) fn with_molar_volume(mut self, volume: f64) -> Self {
        self.molar_volume = volume;
        self
    }
}

impl PhaseModel for SimpleSolution {
    fn name(&self) -> &str {
        &self.name
    }

    fn n_species(&self) -> usize {
        self.species.len()
    }

    fn n_elements(&self) -> usize {
        self.elements.len()
    }

    fn element_name(&self, m: usize) -> &str {
        &self.elements[m]
    }

    fn element_kind(&self, m: usize) -> ElementKind {
        self.element_kinds[m]
    }

    fn species_name(&self, k: usize) -> &str {
        &self.species[k]
    }

    fn molecular_weight(&self, k: usize) -> f64 {
        self.weights[k]
    }

    fn charge(&self, k: usize) -> f64 {
        self.charges[k]
    }

    fn n_atoms(&self, k: usize, m: usize) -> f64 {
        self.composition[k][m]
    }

    fn eos_kind(&self) -> EosKind {
        self.eos
    }

    fn activity_convention(&self) -> ActivityConvention {
        self.convention
    }

    fn set_state_tp(&mut self, temperature: f64, pressure: f64) {
        self.temperature = temperature;
        self.pressure = pressure;
    }

    fn set_mole_fractions(&mut self, x: &[f64]) {
        assert_eq!(x.len(), self.x.len());
        self.x.copy_from_slice(x);
    }

    fn chem_potentials(&self, mu: &mut [f64]) {
        let rt = GAS_CONSTANT * self.temperature;
        for k in 0..self.species.len() {
            mu[k] = rt * (self.mu0_rt[k] + self.x[k].max(1e-300).ln());
        }
    }

    fn standard_chem_potentials(&self, mu0: &mut [f64]) {
        let rt = GAS_CONSTANT * self.temperature;
        for k in 0..self.species.len() {
            mu0[k] = rt * self.mu0_rt[k];
        }
    }

    fn partial_molar_volumes(&self, vbar: &mut [f64]) {
        let v = match self.eos {
            EosKind::IdealGas => GAS_CONSTANT * self.temperature / self.pressure,
            _ => self.molar_volume,
        };
        for entry in vbar.iter_mut().take(self.species.len()) {
            *entry = v;
        }
    }

    fn electric_potential(&self) -> f64 {
        self.phi
    }

    fn set_electric_potential(&mut self, phi: f64) {
        self.phi = phi;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composition_layout() {
        let phase = SimpleSolution::new(
            "alpha",
            &[("AB", &[("A", 1.0), ("B", 1.0)]), ("B2", &[("B", 2.0)])],
            &[-1.0, -2.0],
        );
        assert_eq!(phase.n_elements(), 2);
        assert_eq!(phase.element_name(0), "A");
        assert_eq!(phase.n_atoms(1, 1), 2.0);
        assert_eq!(phase.n_atoms(1, 0), 0.0);
    }

    #[test]
    fn test_potentials_are_ideal() {
        let mut phase = SimpleSolution::new(
            "alpha",
            &[("A", &[("X", 1.0)]), ("B", &[("X", 1.0)])],
            &[-1.0, -2.0],
        );
        phase.set_state_tp(400.0, 101_325.0);
        phase.set_mole_fractions(&[0.25, 0.75]);

        let rt = GAS_CONSTANT * 400.0;
        let mut mu = [0.0; 2];
        phase.chem_potentials(&mut mu);
        assert!((mu[0] - rt * (-1.0 + 0.25_f64.ln())).abs() < 1e-9);
        assert!((mu[1] - rt * (-2.0 + 0.75_f64.ln())).abs() < 1e-9);

        let mut mu0 = [0.0; 2];
        phase.standard_chem_potentials(&mut mu0);
        assert!((mu0[1] - rt * -2.0).abs() < 1e-9);
    }

    #[test]
    fn test_ideal_gas_volumes() {
        let mut phase = SimpleSolution::new("gasish", &[("A", &[("X", 1.0)])], &[0.0])
            .with_eos(EosKind::IdealGas);
        phase.set_state_tp(300.0, 50_000.0);

        let mut vbar = [0.0; 1];
        phase.partial_molar_volumes(&mut vbar);
        assert!((vbar[0] - GAS_CONSTANT * 300.0 / 50_000.0).abs() < 1e-12);
    }
}
