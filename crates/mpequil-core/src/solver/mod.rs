//! The VCS equilibrium solver.
//!
//! [`EquilSolver`] minimizes the total Gibbs free energy of a
//! [`MultiPhase`] mixture at fixed temperature and pressure, subject to
//! element conservation. Construction deep-copies everything the iteration
//! needs out of the mixture (species attributes, formula matrix, element
//! targets, per-phase adapters); [`EquilSolver::solve`] runs the iteration
//! and writes the equilibrium composition back into the mixture.
//!
//! The algorithm works in reaction space: a linearly independent set of
//! component species is chosen and every other species is assigned the one
//! formation reaction that builds it from components. Each iteration
//! evaluates the dimensionless reaction Gibbs energies, takes damped
//! Newton-like steps on the reaction extents, and repairs element-abundance
//! drift through the component submatrix. Recoverable outcomes (iteration
//! budget exhausted, rank-deficient formula matrix) are reported through
//! [`SolveStatus`], never as errors.

mod iteration;

use crate::basis::{select_basis, Basis};
use crate::counters::{SolveCounters, Stopwatch};
use crate::elements::{self, ElementTable};
use crate::errors::{EquilError, EquilResult, SolveStatus};
use crate::multiphase::MultiPhase;
use crate::parameters::SolverParameters;
use crate::phase_model::GAS_CONSTANT;
use crate::registry::{SpeciesStatus, SpeciesTable};
use crate::utils::linear_algebra::gauss_solve;
use crate::volume_phase::VolumePhase;
use log::{debug, info, warn};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Relative tolerance of the post-solve cross-checks between the solver's
/// mole vector and the phase adapters.
const WRITE_BACK_TOL: f64 = 1e-10;

/// Outcome summary of one [`EquilSolver::solve`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub status: SolveStatus,
    /// Outer iterations taken.
    pub iterations: usize,
    /// Basis selections, including the one at construction.
    pub basis_optimizations: usize,
    /// Chemical-potential sweeps over all phases.
    pub potential_evaluations: usize,
    /// Total Gibbs energy of the reacting species at the final composition
    /// (J).
    pub gibbs_energy: f64,
    /// Volume of the reacting species at the final composition (m^3).
    pub total_volume: f64,
    /// Wall-clock time, when timing was enabled.
    pub elapsed: Option<Duration>,
}

/// Gibbs minimizer bound to one mixture.
pub struct EquilSolver<'a> {
    mix: &'a mut MultiPhase,
    params: SolverParameters,
    species: SpeciesTable,
    elements: ElementTable,
    formula: Array2<f64>,
    phases: Vec<VolumePhase>,
    basis: Basis,
    temperature: f64,
    pressure: f64,
    rt: f64,
    /// The unknowns: mole numbers (mol), or the phase electric potential (V)
    /// for interfacial-voltage slots.
    w: Vec<f64>,
    /// Dimensionless chemical potentials mu/RT at the current composition.
    mu: Vec<f64>,
    /// Dimensionless standard-state potentials mu0/RT.
    mu0: Vec<f64>,
    /// Excess part of mu/RT beyond ideal mixing, updated each sweep; feeds
    /// the potential estimates for absent species.
    ln_act_coeff: Vec<f64>,
    status: Vec<SpeciesStatus>,
    /// Dimensionless reaction Gibbs energies, one per formation reaction.
    dg: Vec<f64>,
    /// Work done by the solve in progress (or, before the first solve, by
    /// construction); folded into `totals` when a solve finishes.
    counters: SolveCounters,
    totals: SolveCounters,
    needs_basis_opt: bool,
    range_space_trouble: bool,
}

impl<'a> EquilSolver<'a> {
    /// Build a solver for the mixture's current temperature, pressure and
    /// composition.
    ///
    /// # Errors
    /// Returns [`EquilError::Configuration`] for invalid parameters, an
    /// unusable mixture shape, nonphysical state or mole numbers, or element
    /// targets that cannot be determined, and [`EquilError::LinearSolve`] if
    /// the initial composition estimate cannot be computed.
    pub fn new(mix: &'a mut MultiPhase, params: SolverParameters) -> EquilResult<Self> {
        params.validate()?;

        let temperature = mix.temperature();
        let pressure = mix.pressure();
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(EquilError::Configuration(format!(
                "temperature must be positive and finite, got {} K",
                temperature
            )));
        }
        if !pressure.is_finite() || pressure <= 0.0 {
            return Err(EquilError::Configuration(format!(
                "pressure must be positive and finite, got {} Pa",
                pressure
            )));
        }

        let species = SpeciesTable::from_multiphase(mix)?;
        let (mut elements, formula) = elements::assemble(mix, &species)?;
        elements::compute_goals(
            &mut elements,
            &formula,
            &species,
            mix.species_moles(),
            mix.element_targets(),
        )?;

        let mut w = mix.species_moles().to_vec();
        for (k, &value) in w.iter().enumerate() {
            if !value.is_finite() {
                return Err(EquilError::Configuration(format!(
                    "initial value for {} is not finite",
                    species.label(k)
                )));
            }
            if species.is_mole_number(k) && value < 0.0 {
                return Err(EquilError::Configuration(format!(
                    "initial mole number for {} is negative ({})",
                    species.label(k),
                    value
                )));
            }
        }

        let rt = GAS_CONSTANT * temperature;
        let phases: Vec<VolumePhase> = (0..mix.n_phases())
            .map(|p| VolumePhase::from_mix(mix, p, &species))
            .collect();

        // Standard-state potentials only need temperature, but pushing the
        // whole state keeps every model consistently initialized.
        let nsp = species.n_species();
        let mut mu0 = vec![0.0; nsp];
        for vp in &phases {
            vp.push_to_model(mix.phase_mut(vp.phase_index), temperature, pressure);
            let mut buf = vec![0.0; vp.n_species];
            vp.standard_chem_potentials_into(mix.phase(vp.phase_index), &mut buf);
            for (local, value) in buf.iter().enumerate() {
                mu0[vp.start + local] = value / rt;
            }
        }

        let eligible: Vec<bool> = (0..nsp).map(|k| species.is_mole_number(k)).collect();
        let active: Vec<bool> = elements.goals.iter().map(|&g| g != 0.0).collect();

        let mut basis_optimizations = 0;
        let any_positive = w
            .iter()
            .enumerate()
            .any(|(k, &v)| species.is_mole_number(k) && v > 0.0);
        if !any_positive {
            w = estimate_from_targets(&formula, &mu0, &eligible, &active, &elements, &species)?;
            basis_optimizations += 1;
            info!("estimated an initial composition from the element targets");
        }

        let basis = select_basis(&formula, &w, &eligible, &active)?;
        basis_optimizations += 1;
        let dg = vec![0.0; basis.n_rxns()];

        let mut solver = Self {
            mix,
            params,
            species,
            elements,
            formula,
            phases,
            basis,
            temperature,
            pressure,
            rt,
            w,
            mu: vec![0.0; nsp],
            mu0,
            ln_act_coeff: vec![0.0; nsp],
            status: vec![SpeciesStatus::Major; nsp],
            dg,
            counters: SolveCounters {
                basis_optimizations,
                ..Default::default()
            },
            totals: SolveCounters::default(),
            needs_basis_opt: false,
            range_space_trouble: false,
        };
        solver.sync_adapters();
        Ok(solver)
    }

    /// Run the iteration to completion and write the result back into the
    /// mixture.
    ///
    /// # Errors
    /// Returns [`EquilError::LinearSolve`] if a basis re-optimization fails
    /// and [`EquilError::Inconsistency`] if the post-solve cross-checks
    /// between solver state and phase adapters disagree. Failure to converge
    /// is not an error; see [`SolveStatus`].
    pub fn solve(&mut self) -> EquilResult<SolveReport> {
        let stopwatch = Stopwatch::start(self.params.enable_timing);
        let status = self.iterate()?;
        if status.is_converged() {
            debug!(
                "converged in {} iterations, {} basis optimizations",
                self.counters.iterations, self.counters.basis_optimizations
            );
        }

        // One last sweep at the final composition so the reported energy and
        // the models' installed state agree with the write-back.
        let final_w = self.w.clone();
        let gibbs_energy = self.rt * self.candidate_gibbs(&final_w);
        self.counters.elapsed = stopwatch.elapsed();

        self.write_back()?;
        let report = SolveReport {
            status,
            iterations: self.counters.iterations,
            basis_optimizations: self.counters.basis_optimizations,
            potential_evaluations: self.counters.potential_evaluations,
            gibbs_energy,
            total_volume: self.total_volume(),
            elapsed: self.counters.elapsed,
        };
        self.totals.absorb(&self.counters);
        self.counters = SolveCounters::default();
        Ok(report)
    }

    /// The solver's unknown vector: mole numbers, with electric potentials
    /// in the interfacial-voltage slots.
    pub fn species_moles(&self) -> &[f64] {
        &self.w
    }

    /// Cumulative counters over every completed solve of this solver.
    pub fn counters(&self) -> &SolveCounters {
        &self.totals
    }

    pub fn n_components(&self) -> usize {
        self.basis.n_components()
    }

    pub fn phase_exists(&self, p: usize) -> bool {
        self.phases[p].exists()
    }

    /// Cross-check adapters against the mole vector, then copy the result
    /// into the mixture and leave every model at the final state.
    fn write_back(&mut self) -> EquilResult<()> {
        for vp in &self.phases {
            let mut reacting = 0.0;
            for k in vp.start..vp.start + vp.n_species {
                if self.species.is_mole_number(k) {
                    reacting += self.w[k];
                } else {
                    let drift = (vp.electric_potential - self.w[k]).abs();
                    if drift > WRITE_BACK_TOL * self.w[k].abs().max(1.0) {
                        return Err(EquilError::Inconsistency(format!(
                            "phase {} electric potential drifted: adapter {} vs solver {}",
                            vp.name, vp.electric_potential, self.w[k]
                        )));
                    }
                }
            }
            let expected = reacting + vp.inert_moles;
            if (vp.total_moles - expected).abs() > WRITE_BACK_TOL * expected.abs().max(1.0) {
                return Err(EquilError::Inconsistency(format!(
                    "phase {} total moles disagree: adapter {} vs solver {}",
                    vp.name, vp.total_moles, expected
                )));
            }
            if vp.exists() {
                let fraction_sum: f64 = vp.mole_fractions.iter().sum();
                if (fraction_sum - 1.0).abs() > WRITE_BACK_TOL {
                    return Err(EquilError::Inconsistency(format!(
                        "phase {} mole fractions sum to {}",
                        vp.name, fraction_sum
                    )));
                }
            }
        }

        self.mix.set_species_moles(&self.w)?;
        for vp in &self.phases {
            vp.push_to_model(
                self.mix.phase_mut(vp.phase_index),
                self.temperature,
                self.pressure,
            );
        }
        Ok(())
    }

    /// Volume of the reacting species at the installed state (m^3).
    fn total_volume(&self) -> f64 {
        let mut volume = 0.0;
        for vp in &self.phases {
            let mut vbar = vec![0.0; vp.n_species];
            vp.partial_molar_volumes_into(self.mix.phase(vp.phase_index), &mut vbar);
            for (local, &v) in vbar.iter().enumerate() {
                let k = vp.start + local;
                if self.species.is_mole_number(k) && self.w[k] > 0.0 {
                    volume += self.w[k] * v;
                }
            }
        }
        volume
    }
}

// Not derivable: `mix` holds trait objects without a `Debug` bound.
impl std::fmt::Debug for EquilSolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EquilSolver")
            .field("temperature", &self.temperature)
            .field("pressure", &self.pressure)
            .field("w", &self.w)
            .finish_non_exhaustive()
    }
}

/// Equilibrate a mixture in place: build a solver, run it, report.
///
/// # Errors
/// See [`EquilSolver::new`] and [`EquilSolver::solve`].
pub fn equilibrate(mix: &mut MultiPhase, params: SolverParameters) -> EquilResult<SolveReport> {
    let mut solver = EquilSolver::new(mix, params)?;
    solver.solve()
}

/// Compose an initial mole vector from explicit element targets alone:
/// choose a basis by standard-state energies (lowest preferred), then solve
/// the component submatrix for the component moles that meet the targets.
/// Noncomponents start at zero and enter later through the rebirth and
/// phase-stability paths.
fn estimate_from_targets(
    formula: &Array2<f64>,
    mu0: &[f64],
    eligible: &[bool],
    active: &[bool],
    elements: &ElementTable,
    species: &SpeciesTable,
) -> EquilResult<Vec<f64>> {
    let ranking: Vec<f64> = mu0.iter().map(|&m| -m).collect();
    let basis = select_basis(formula, &ranking, eligible, active)?;
    let nc = basis.n_components();

    let matrix = Array2::from_shape_fn((nc, nc), |(row, col)| {
        formula[[basis.component(col), basis.chosen_element(row)]]
    });
    let rhs: Vec<f64> = (0..nc)
        .map(|row| elements.goals[basis.chosen_element(row)])
        .collect();
    let component_moles = gauss_solve(&matrix, &rhs).ok_or_else(|| {
        EquilError::LinearSolve(
            "initial estimate failed: component submatrix is singular".to_string(),
        )
    })?;

    let mut w = vec![0.0; formula.nrows()];
    for (j, &moles) in component_moles.iter().enumerate() {
        let k = basis.component(j);
        if moles < 0.0 {
            warn!(
                "initial estimate clamped {} from {:.3e} to zero",
                species.label(k),
                moles
            );
        }
        w[k] = moles.max(0.0);
    }
    Ok(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::example_models::SimpleSolution;
    use approx::assert_relative_eq;

    /// Two isomers of one element in a single ideal solution. With
    /// mu0/RT = [0, -ln 2] the equilibrium split is 1:2.
    fn isomer_mix() -> MultiPhase {
        let mut mix = MultiPhase::new(500.0, 101_325.0);
        let solution = SimpleSolution::new(
            "liquid",
            &[("A", &[("X", 1.0)]), ("B", &[("X", 1.0)])],
            &[0.0, -(2.0_f64.ln())],
        );
        mix.add_phase_with_moles(Box::new(solution), &[0.9, 0.1])
            .unwrap();
        mix
    }

    #[test]
    fn test_isomer_equilibrium() {
        let mut mix = isomer_mix();
        let report = equilibrate(&mut mix, SolverParameters::default()).unwrap();

        assert_eq!(report.status, SolveStatus::Converged);
        let moles = mix.species_moles();
        assert_relative_eq!(moles[0], 1.0 / 3.0, max_relative = 1e-6);
        assert_relative_eq!(moles[1], 2.0 / 3.0, max_relative = 1e-6);

        // G/RT at the analytic optimum is -ln 3 for one mole total.
        let rt = GAS_CONSTANT * 500.0;
        assert_relative_eq!(report.gibbs_energy, -rt * 3.0_f64.ln(), max_relative = 1e-4);
    }

    #[test]
    fn test_converged_input_takes_one_iteration() {
        let mut mix = MultiPhase::new(400.0, 101_325.0);
        let solution = SimpleSolution::new(
            "liquid",
            &[("A", &[("X", 1.0)]), ("B", &[("X", 1.0)])],
            &[-1.0, -1.0],
        );
        mix.add_phase_with_moles(Box::new(solution), &[0.5, 0.5])
            .unwrap();

        let report = equilibrate(&mut mix, SolverParameters::default()).unwrap();
        assert_eq!(report.status, SolveStatus::Converged);
        assert_eq!(report.iterations, 1, "identical potentials need no steps");
        assert_eq!(report.basis_optimizations, 1);
    }

    #[test]
    fn test_explicit_target_matching_moles_converges_immediately() {
        let mut mix = MultiPhase::new(400.0, 101_325.0);
        let solution = SimpleSolution::new(
            "liquid",
            &[("A", &[("X", 1.0)]), ("B", &[("X", 1.0)])],
            &[-1.0, -1.0],
        );
        mix.add_phase_with_moles(Box::new(solution), &[1.0, 1.0])
            .unwrap();
        mix.set_element_target("X", 2.0);

        let report = equilibrate(&mut mix, SolverParameters::default()).unwrap();
        assert_eq!(report.status, SolveStatus::Converged);
        assert_eq!(report.iterations, 1);

        let moles = mix.species_moles();
        assert_eq!(moles[0] + moles[1], 2.0, "target already satisfied");
    }

    #[test]
    fn test_solving_twice_is_idempotent() {
        let mut mix = isomer_mix();
        equilibrate(&mut mix, SolverParameters::default()).unwrap();
        let first = mix.species_moles().to_vec();

        let report = equilibrate(&mut mix, SolverParameters::default()).unwrap();
        assert_eq!(report.iterations, 1);
        assert_eq!(mix.species_moles(), &first[..]);
    }

    #[test]
    fn test_counters_accumulate_across_solves() {
        let mut mix = isomer_mix();
        let mut solver = EquilSolver::new(&mut mix, SolverParameters::default()).unwrap();
        let first = solver.solve().unwrap();
        let second = solver.solve().unwrap();
        assert_eq!(second.iterations, 1, "second solve starts converged");

        // Each report covers its own solve; the solver keeps running totals.
        let totals = solver.counters();
        assert_eq!(totals.iterations, first.iterations + second.iterations);
        assert_eq!(
            totals.basis_optimizations,
            first.basis_optimizations + second.basis_optimizations
        );
        assert_eq!(
            totals.potential_evaluations,
            first.potential_evaluations + second.potential_evaluations
        );
    }

    #[test]
    fn test_element_conservation_across_phases() {
        let mut mix = MultiPhase::new(700.0, 101_325.0);
        let solution = SimpleSolution::new(
            "melt",
            &[("A", &[("X", 1.0)]), ("A2", &[("X", 2.0)])],
            &[-1.0, -2.5],
        );
        let crystal = SimpleSolution::new("crystal", &[("A3", &[("X", 3.0)])], &[-3.2]);
        mix.add_phase_with_moles(Box::new(solution), &[1.0, 0.4]).unwrap();
        mix.add_phase_with_moles(Box::new(crystal), &[0.2]).unwrap();
        let x_before = 1.0 + 2.0 * 0.4 + 3.0 * 0.2;

        let report = equilibrate(&mut mix, SolverParameters::default()).unwrap();
        assert!(report.status.is_converged());

        let moles = mix.species_moles();
        let x_after = moles[0] + 2.0 * moles[1] + 3.0 * moles[2];
        assert_relative_eq!(x_after, x_before, max_relative = 1e-9);
    }

    #[test]
    fn test_unstable_pure_phase_dies() {
        let mut mix = MultiPhase::new(600.0, 101_325.0);
        let stable = SimpleSolution::new("alpha", &[("A", &[("X", 1.0)])], &[-5.0]);
        let unstable = SimpleSolution::new("beta", &[("B", &[("X", 1.0)])], &[5.0]);
        mix.add_phase_with_moles(Box::new(stable), &[1.0]).unwrap();
        mix.add_phase_with_moles(Box::new(unstable), &[0.5]).unwrap();

        let report = equilibrate(&mut mix, SolverParameters::default()).unwrap();
        assert_eq!(report.status, SolveStatus::Converged);

        let moles = mix.species_moles();
        assert_eq!(moles[1], 0.0, "unfavorable pure phase empties completely");
        assert_relative_eq!(moles[0], 1.5, max_relative = 1e-12);
    }

    #[test]
    fn test_initial_estimate_from_targets() {
        let mut mix = MultiPhase::new(500.0, 101_325.0);
        let solution = SimpleSolution::new(
            "liquid",
            &[("A", &[("X", 1.0)]), ("B", &[("X", 1.0)])],
            &[-1.0, -1.2],
        );
        mix.add_phase(Box::new(solution));
        mix.set_element_target("X", 2.0);

        let report = equilibrate(&mut mix, SolverParameters::default()).unwrap();
        assert_eq!(report.status, SolveStatus::Converged);

        let moles = mix.species_moles();
        assert_relative_eq!(moles[0] + moles[1], 2.0, max_relative = 1e-9);
        // x_A / x_B = exp(mu0_B - mu0_A) = exp(-0.2).
        assert_relative_eq!(
            moles[0] / moles[1],
            (-0.2_f64).exp(),
            max_relative = 1e-5
        );
    }

    #[test]
    fn test_minor_species_settles_at_trace_level() {
        let target = 1e-7_f64;
        let mut mix = MultiPhase::new(450.0, 101_325.0);
        let solution = SimpleSolution::new(
            "liquid",
            &[("A", &[("X", 1.0)]), ("B", &[("X", 1.0)])],
            &[0.0, -target.ln()],
        );
        mix.add_phase_with_moles(Box::new(solution), &[1.0, 1e-6])
            .unwrap();

        let report = equilibrate(&mut mix, SolverParameters::default()).unwrap();
        assert!(report.status.is_converged());

        let moles = mix.species_moles();
        assert!(moles[1] > 0.0, "trace species survives");
        assert_relative_eq!(moles[1] / moles[0], target, max_relative = 1e-3);
    }

    #[test]
    fn test_voltage_slot_passes_through() {
        let mut mix = MultiPhase::new(350.0, 101_325.0);
        let electrode = SimpleSolution::new("anode", &[("Li+", &[("Li", 1.0)])], &[0.0])
            .with_charges(&[1.0]);
        let bulk = SimpleSolution::new("bulk", &[("Li", &[("Li", 1.0)])], &[-1.0]);
        mix.add_phase_with_moles(Box::new(electrode), &[0.2]).unwrap();
        mix.add_phase_with_moles(Box::new(bulk), &[2.0]).unwrap();

        let report = equilibrate(&mut mix, SolverParameters::default()).unwrap();
        assert_eq!(report.status, SolveStatus::Converged);
        assert_eq!(report.iterations, 1);

        // The voltage slot is held fixed and lands on the model.
        assert_relative_eq!(mix.species_moles()[0], 0.2, max_relative = 1e-12);
        assert_relative_eq!(mix.phase(0).electric_potential(), 0.2, max_relative = 1e-12);
        assert_relative_eq!(mix.species_moles()[1], 2.0, max_relative = 1e-12);
    }

    #[test]
    fn test_exhausted_budget_reports_not_converged() {
        let mut mix = isomer_mix();
        let params = SolverParameters {
            max_iterations: 1,
            ..Default::default()
        };

        let report = equilibrate(&mut mix, params).unwrap();
        assert_eq!(report.status, SolveStatus::NotConverged);
        assert!(report.status.code() < 0);
        assert_eq!(report.iterations, 1);
    }

    #[test]
    fn test_solver_rejects_empty_mixture() {
        let mut mix = MultiPhase::new(300.0, 101_325.0);
        assert!(EquilSolver::new(&mut mix, SolverParameters::default()).is_err());
    }

    #[test]
    fn test_solver_rejects_bad_state() {
        let mut mix = MultiPhase::new(-10.0, 101_325.0);
        let solution = SimpleSolution::new("liquid", &[("A", &[("X", 1.0)])], &[0.0]);
        mix.add_phase_with_moles(Box::new(solution), &[1.0]).unwrap();

        let err = EquilSolver::new(&mut mix, SolverParameters::default()).unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn test_report_serialization() {
        let mut mix = isomer_mix();
        let params = SolverParameters {
            enable_timing: true,
            ..Default::default()
        };
        let report = equilibrate(&mut mix, params).unwrap();
        assert!(report.elapsed.is_some());

        let json = serde_json::to_string(&report).expect("Serialization failed");
        let parsed: SolveReport = serde_json::from_str(&json).expect("Deserialization failed");
        assert_eq!(parsed.status, report.status);
        assert_eq!(parsed.iterations, report.iterations);
    }

    #[test]
    fn test_total_volume_reported() {
        let mut mix = MultiPhase::new(500.0, 101_325.0);
        let solution = SimpleSolution::new(
            "liquid",
            &[("A", &[("X", 1.0)]), ("B", &[("X", 1.0)])],
            &[0.0, -(2.0_f64.ln())],
        )
        .with_molar_volume(2e-5);
        mix.add_phase_with_moles(Box::new(solution), &[0.9, 0.1])
            .unwrap();

        let report = equilibrate(&mut mix, SolverParameters::default()).unwrap();
        // One mole total at a constant 2e-5 m^3/mol.
        assert_relative_eq!(report.total_volume, 2e-5, max_relative = 1e-9);
    }
}
