//! Species registry.
//!
//! Flat per-species attribute arrays copied out of the mixture at solver
//! construction. Everything here is immutable for the lifetime of a solver;
//! the mutable per-iteration state (mole numbers, potentials, status) lives
//! in the solver itself.

use crate::errors::{EquilError, EquilResult};
use crate::multiphase::MultiPhase;
use crate::phase_model::ActivityConvention;
use serde::{Deserialize, Serialize};

/// What the solver's unknown for a species represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnknownKind {
    /// The unknown is the species mole number (mol, nonnegative).
    MoleNumber,
    /// The unknown is the electric potential of the species' phase (V).
    /// Arises for a single-species phase whose lone species is charged.
    InterfacialVoltage,
}

/// Per-iteration adjustment class of a species.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeciesStatus {
    /// Actively adjusted with Newton-like steps.
    Major,
    /// Near zero relative to its phase; adjusted conservatively.
    Minor,
    /// Excluded from the current active set.
    Zeroed,
}

/// Immutable per-species attributes, indexed by global species index.
#[derive(Debug, Clone)]
pub struct SpeciesTable {
    pub names: Vec<String>,
    /// g/mol.
    pub molecular_weights: Vec<f64>,
    /// Units of the elementary charge.
    pub charges: Vec<f64>,
    pub phase_index: Vec<usize>,
    pub local_index: Vec<usize>,
    pub unknown_kinds: Vec<UnknownKind>,
    /// ln of the molality scale (mnaught) for non-solvent species of
    /// molality-convention phases; zero elsewhere.
    pub ln_mnaught: Vec<f64>,
    /// Species count declared by each phase at construction time.
    pub phase_species_counts: Vec<usize>,
}

impl SpeciesTable {
    /// Copy species attributes out of the mixture, validating the problem
    /// shape.
    ///
    /// # Errors
    /// Returns [`EquilError::Configuration`] when the mixture has no phases,
    /// any phase has no species, or a species carries a nonfinite or
    /// negative molecular weight.
    pub fn from_multiphase(mix: &MultiPhase) -> EquilResult<Self> {
        if mix.n_phases() == 0 {
            return Err(EquilError::Configuration(
                "mixture must contain at least one phase".to_string(),
            ));
        }
        if mix.n_species() == 0 {
            return Err(EquilError::Configuration(
                "mixture must contain at least one species".to_string(),
            ));
        }

        let mut table = Self {
            names: Vec::with_capacity(mix.n_species()),
            molecular_weights: Vec::with_capacity(mix.n_species()),
            charges: Vec::with_capacity(mix.n_species()),
            phase_index: Vec::with_capacity(mix.n_species()),
            local_index: Vec::with_capacity(mix.n_species()),
            unknown_kinds: Vec::with_capacity(mix.n_species()),
            ln_mnaught: vec![0.0; mix.n_species()],
            phase_species_counts: Vec::with_capacity(mix.n_phases()),
        };

        for p in 0..mix.n_phases() {
            let model = mix.phase(p);
            let n = model.n_species();
            if n == 0 {
                return Err(EquilError::Configuration(format!(
                    "phase {} contains no species",
                    model.name()
                )));
            }
            table.phase_species_counts.push(n);

            for k in 0..n {
                let weight = model.molecular_weight(k);
                if !weight.is_finite() || weight < 0.0 {
                    return Err(EquilError::Configuration(format!(
                        "species {} in phase {} has molecular weight {}",
                        model.species_name(k),
                        model.name(),
                        weight
                    )));
                }
                table.names.push(model.species_name(k).to_string());
                table.molecular_weights.push(weight);
                table.charges.push(model.charge(k));
                table.phase_index.push(p);
                table.local_index.push(k);

                // A lone charged species makes the phase potential the
                // natural unknown for its slot.
                let kind = if n == 1 && model.charge(k) != 0.0 {
                    UnknownKind::InterfacialVoltage
                } else {
                    UnknownKind::MoleNumber
                };
                table.unknown_kinds.push(kind);
            }

            if model.activity_convention() == ActivityConvention::Molality {
                let start = mix.phase_start(p);
                let solvent_weight = table.molecular_weights[start];
                if solvent_weight <= 0.0 {
                    return Err(EquilError::Configuration(format!(
                        "molality phase {} needs a solvent with positive molecular weight",
                        model.name()
                    )));
                }
                let ln_mnaught = (solvent_weight / 1000.0).ln();
                for k in start + 1..start + n {
                    table.ln_mnaught[k] = ln_mnaught;
                }
            }
        }

        Ok(table)
    }

    pub fn n_species(&self) -> usize {
        self.names.len()
    }

    /// True when the solver's unknown for `k` is a mole number.
    pub fn is_mole_number(&self, k: usize) -> bool {
        self.unknown_kinds[k] == UnknownKind::MoleNumber
    }

    /// Display label "species (phase p)" for diagnostics.
    pub fn label(&self, k: usize) -> String {
        format!("{} (phase {})", self.names[k], self.phase_index[k])
    }
}
