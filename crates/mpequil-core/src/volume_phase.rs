//! Per-phase state adapter.
//!
//! A [`VolumePhase`] translates between the solver's global mole vector and
//! one phase's own view of itself: total and inert moles, mole fractions,
//! existence, electric potential. It owns data only; every thermodynamic
//! query takes the external phase model as an explicit argument, so the
//! adapter never holds a reference into the caller's mixture.

use crate::multiphase::MultiPhase;
use crate::phase_model::{ActivityConvention, EosKind, PhaseModel};
use crate::registry::{SpeciesTable, UnknownKind};

/// Mole fractions pushed to a model are floored here so activity terms stay
/// finite for zeroed species.
pub const MIN_MOLE_FRACTION: f64 = 1e-32;

/// Whether a phase is present at the current composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseExistence {
    /// Present regardless of mole count (single-species phase whose unknown
    /// is the interfacial voltage).
    Always,
    /// Present: positive total moles.
    Yes,
    /// Absent: zero total moles.
    No,
}

/// Solver-private view of one phase.
#[derive(Debug, Clone)]
pub struct VolumePhase {
    pub name: String,
    pub phase_index: usize,
    /// Global index of the phase's first species.
    pub start: usize,
    pub n_species: usize,
    pub eos: EosKind,
    pub convention: ActivityConvention,
    pub existence: PhaseExistence,
    /// Reacting plus inert moles.
    pub total_moles: f64,
    pub inert_moles: f64,
    pub electric_potential: f64,
    /// Fractions of the reacting species; uniform when the phase is empty.
    pub mole_fractions: Vec<f64>,
    single_species_voltage: bool,
}

impl VolumePhase {
    /// Snapshot phase `p` of the mixture.
    pub fn from_mix(mix: &MultiPhase, p: usize, species: &SpeciesTable) -> Self {
        let model = mix.phase(p);
        let start = mix.phase_start(p);
        let n = model.n_species();
        let single_species_voltage =
            n == 1 && species.unknown_kinds[start] == UnknownKind::InterfacialVoltage;

        let mut phase = Self {
            name: model.name().to_string(),
            phase_index: p,
            start,
            n_species: n,
            eos: model.eos_kind(),
            convention: model.activity_convention(),
            existence: PhaseExistence::No,
            total_moles: 0.0,
            inert_moles: mix.inert_moles(p),
            electric_potential: model.electric_potential(),
            mole_fractions: vec![1.0 / n as f64; n],
            single_species_voltage,
        };
        phase.set_moles_from_solver(mix.species_moles(), species);
        phase
    }

    /// Update totals, fractions and existence from the global mole vector.
    ///
    /// Fractions are normalized over the reacting species; a phase with no
    /// reacting moles falls back to uniform fractions. A voltage slot in the
    /// vector updates the phase's electric potential instead of any total.
    pub fn set_moles_from_solver(&mut self, w: &[f64], species: &SpeciesTable) {
        let mut reacting = 0.0;
        for k in self.start..self.start + self.n_species {
            match species.unknown_kinds[k] {
                UnknownKind::MoleNumber => reacting += w[k],
                UnknownKind::InterfacialVoltage => self.electric_potential = w[k],
            }
        }
        self.total_moles = reacting + self.inert_moles;

        if reacting > 0.0 {
            for local in 0..self.n_species {
                let k = self.start + local;
                self.mole_fractions[local] = match species.unknown_kinds[k] {
                    UnknownKind::MoleNumber => w[k] / reacting,
                    UnknownKind::InterfacialVoltage => 0.0,
                };
            }
        } else {
            let uniform = 1.0 / self.n_species as f64;
            self.mole_fractions.iter_mut().for_each(|x| *x = uniform);
        }

        self.update_existence();
    }

    fn update_existence(&mut self) {
        self.existence = if self.single_species_voltage {
            PhaseExistence::Always
        } else if self.total_moles > 0.0 {
            PhaseExistence::Yes
        } else {
            PhaseExistence::No
        };
    }

    pub fn exists(&self) -> bool {
        self.existence != PhaseExistence::No
    }

    /// Moles taking part in reactions (total minus inert).
    pub fn reacting_moles(&self) -> f64 {
        self.total_moles - self.inert_moles
    }

    /// Install this adapter's state on the phase model: temperature,
    /// pressure, floored mole fractions and electric potential.
    pub fn push_to_model(&self, model: &mut dyn PhaseModel, temperature: f64, pressure: f64) {
        model.set_state_tp(temperature, pressure);
        let floored: Vec<f64> = self
            .mole_fractions
            .iter()
            .map(|&x| x.max(MIN_MOLE_FRACTION))
            .collect();
        model.set_mole_fractions(&floored);
        model.set_electric_potential(self.electric_potential);
    }

    /// Chemical potentials at the model's installed state (J/mol).
    pub fn chem_potentials_into(&self, model: &dyn PhaseModel, mu: &mut [f64]) {
        debug_assert_eq!(mu.len(), self.n_species);
        model.chem_potentials(mu);
    }

    /// Standard-state chemical potentials at the installed temperature
    /// (J/mol). Seeds the basis optimizer's initial ranking.
    pub fn standard_chem_potentials_into(&self, model: &dyn PhaseModel, mu0: &mut [f64]) {
        debug_assert_eq!(mu0.len(), self.n_species);
        model.standard_chem_potentials(mu0);
    }

    /// Partial molar volumes at the installed state (m^3/mol).
    pub fn partial_molar_volumes_into(&self, model: &dyn PhaseModel, vbar: &mut [f64]) {
        debug_assert_eq!(vbar.len(), self.n_species);
        model.partial_molar_volumes(vbar);
    }
}
