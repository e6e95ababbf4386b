//! The outer iteration of the solver.
//!
//! Each pass recomputes potentials, classifies species, checks convergence
//! before taking any step, then advances the reaction extents and repairs
//! element-abundance drift. The convergence check leading the loop means an
//! already-equilibrated composition is recognized on the first iteration
//! without being perturbed.

use crate::elements::compute_abundances;
use crate::errors::{EquilResult, SolveStatus};
use crate::registry::SpeciesStatus;
use crate::solver::EquilSolver;
use crate::utils::linear_algebra::gauss_solve;
use crate::volume_phase::MIN_MOLE_FRACTION;
use log::{debug, warn};
use ndarray::Array2;

/// Largest one-step growth factor for a minor species.
const MINOR_GROWTH_LIMIT: f64 = 1.0e4;

/// Relative slack allowed on the total Gibbs energy before a step counts as
/// uphill.
const GIBBS_SLACK: f64 = 1e-13;

/// Exponent cap when summing hypothetical mole fractions of an absent phase.
const STABILITY_EXPONENT_CAP: f64 = 300.0;

impl EquilSolver<'_> {
    /// Run iterations until convergence or the budget runs out.
    pub(super) fn iterate(&mut self) -> EquilResult<SolveStatus> {
        for it in 1..=self.params.max_iterations {
            self.counters.iterations = it;

            if self.needs_basis_opt {
                let weights = self.w.clone();
                self.reselect_basis(&weights)?;
            }
            self.sync_adapters();
            self.update_potentials();
            self.classify_species();
            self.compute_driving_forces();

            let birth = self.phase_birth_candidate();
            let residual = self.enforced_element_residual();
            debug!(
                "iteration {}: max |dg| {:.3e}, element residual {:.3e}, {} components",
                it,
                self.max_driving_force(),
                residual,
                self.basis.n_components()
            );

            if self.is_converged(residual, birth.is_some()) {
                let status = if self.basis.full_rank() && !self.range_space_trouble {
                    SolveStatus::Converged
                } else {
                    SolveStatus::RangeSpaceError
                };
                return Ok(status);
            }

            if let Some((p, fractions)) = birth {
                self.apply_phase_birth(p, &fractions);
                self.needs_basis_opt = true;
                continue;
            }

            let dxi = self.compute_steps();
            self.take_step(&dxi);
            self.snap_deleted_species();
            self.sync_adapters();
            self.zero_dying_phases();
            self.correct_element_abundances();
        }

        warn!(
            "iteration budget ({}) exhausted before convergence",
            self.params.max_iterations
        );
        Ok(SolveStatus::NotConverged)
    }

    fn reselect_basis(&mut self, weights: &[f64]) -> EquilResult<()> {
        let eligible: Vec<bool> = (0..self.species.n_species())
            .map(|k| self.species.is_mole_number(k))
            .collect();
        let active: Vec<bool> = self.elements.goals.iter().map(|&g| g != 0.0).collect();
        self.basis = crate::basis::select_basis(&self.formula, weights, &eligible, &active)?;
        self.dg = vec![0.0; self.basis.n_rxns()];
        self.counters.basis_optimizations += 1;
        self.needs_basis_opt = false;
        Ok(())
    }

    /// Refresh every phase adapter from the current unknown vector.
    pub(super) fn sync_adapters(&mut self) {
        for vp in &mut self.phases {
            vp.set_moles_from_solver(&self.w, &self.species);
        }
    }

    /// Push the adapters' state into the models and sweep chemical
    /// potentials. Also updates the excess (activity-coefficient) part of
    /// each potential, used later to estimate potentials of absent species.
    fn update_potentials(&mut self) {
        for p in 0..self.phases.len() {
            let vp = &self.phases[p];
            vp.push_to_model(self.mix.phase_mut(p), self.temperature, self.pressure);
            let mut buf = vec![0.0; vp.n_species];
            vp.chem_potentials_into(self.mix.phase(p), &mut buf);
            for (local, &value) in buf.iter().enumerate() {
                let k = vp.start + local;
                self.mu[k] = value / self.rt;
                if self.species.is_mole_number(k) {
                    let x = vp.mole_fractions[local].max(MIN_MOLE_FRACTION);
                    self.ln_act_coeff[k] =
                        self.mu[k] - self.mu0[k] - x.ln() - self.species.ln_mnaught[k];
                }
            }
        }
        self.counters.potential_evaluations += 1;
    }

    fn classify_species(&mut self) {
        for k in 0..self.species.n_species() {
            if !self.species.is_mole_number(k) {
                self.status[k] = SpeciesStatus::Major;
                continue;
            }
            let vp = &self.phases[self.species.phase_index[k]];
            self.status[k] = if !vp.exists() || self.w[k] <= 0.0 {
                SpeciesStatus::Zeroed
            } else if !self.basis.is_component(k)
                && self.w[k] < self.params.minor_mole_fraction * vp.total_moles
            {
                SpeciesStatus::Minor
            } else {
                SpeciesStatus::Major
            };
        }
    }

    /// Estimated potential of a species that currently has no moles, at the
    /// mole fraction a rebirth would give it.
    fn rebirth_potential(&self, k: usize) -> f64 {
        self.mu0[k]
            + self.ln_act_coeff[k]
            + self.params.rebirth_mole_fraction.ln()
            + self.species.ln_mnaught[k]
    }

    /// Dimensionless reaction Gibbs energies. Zeroed species use the rebirth
    /// estimate in place of the floored model potential, so a species with
    /// no moles is judged at the composition it would re-enter with.
    fn compute_driving_forces(&mut self) {
        for irxn in 0..self.basis.n_rxns() {
            let k = self.basis.species_for_rxn(irxn);
            let mu_k = if self.species.is_mole_number(k)
                && self.status[k] == SpeciesStatus::Zeroed
            {
                self.rebirth_potential(k)
            } else {
                self.mu[k]
            };
            let mut formed = 0.0;
            for j in 0..self.basis.n_components() {
                let sc = self.basis.stoich(irxn, j);
                if sc != 0.0 {
                    formed += sc * self.mu[self.basis.component(j)];
                }
            }
            self.dg[irxn] = mu_k - formed;
        }
    }

    /// Convergence test, run before any step is taken. Species in absent
    /// phases are judged by the phase stability scan, not individually.
    fn is_converged(&self, element_residual: f64, birth_pending: bool) -> bool {
        if birth_pending || element_residual > self.params.tol_element_major {
            return false;
        }
        for irxn in 0..self.basis.n_rxns() {
            let k = self.basis.species_for_rxn(irxn);
            if !self.species.is_mole_number(k) {
                continue;
            }
            let vp = &self.phases[self.species.phase_index[k]];
            if !vp.exists() {
                continue;
            }
            let dg = self.dg[irxn];
            let ok = match self.status[k] {
                SpeciesStatus::Major => dg.abs() <= self.params.tol_major,
                SpeciesStatus::Minor => dg.abs() <= self.params.tol_minor,
                SpeciesStatus::Zeroed => dg >= -self.params.tol_major,
            };
            if !ok {
                return false;
            }
        }
        true
    }

    fn max_driving_force(&self) -> f64 {
        let mut worst = 0.0_f64;
        for irxn in 0..self.basis.n_rxns() {
            let k = self.basis.species_for_rxn(irxn);
            if !self.species.is_mole_number(k) {
                continue;
            }
            if self.phases[self.species.phase_index[k]].exists() {
                worst = worst.max(self.dg[irxn].abs());
            }
        }
        worst
    }

    fn element_residual(&self, abundance: &[f64], total_abs: f64, e: usize) -> f64 {
        let goal = self.elements.goals[e];
        let denom = if goal != 0.0 {
            goal.abs()
        } else {
            total_abs.max(1.0)
        };
        (abundance[e] - goal).abs() / denom
    }

    /// Worst relative abundance residual over the elements the basis can
    /// actually enforce. On a full-rank basis that is every element; on a
    /// rank-deficient one only the chosen columns count, and the truncation
    /// is reported through the range-space status instead.
    fn enforced_element_residual(&self) -> f64 {
        let abundance = compute_abundances(&self.formula, &self.species, &self.w);
        let total_abs: f64 = self.elements.goals.iter().map(|g| g.abs()).sum();
        let mut worst = 0.0_f64;
        if self.basis.full_rank() {
            for e in 0..self.elements.n_elements() {
                worst = worst.max(self.element_residual(&abundance, total_abs, e));
            }
        } else {
            for j in 0..self.basis.n_components() {
                let e = self.basis.chosen_element(j);
                worst = worst.max(self.element_residual(&abundance, total_abs, e));
            }
        }
        worst
    }

    /// Scan absent phases for one that lowers the total Gibbs energy by
    /// forming. A phase wants to form when the sum of its hypothetical
    /// equilibrium mole fractions exceeds one; the most favorable candidate
    /// is returned together with those fractions.
    fn phase_birth_candidate(&self) -> Option<(usize, Vec<f64>)> {
        let mut best: Option<(usize, f64, Vec<f64>)> = None;
        for (p, vp) in self.phases.iter().enumerate() {
            if vp.exists() {
                continue;
            }
            let mut fractions = vec![0.0; vp.n_species];
            let mut sum = 0.0;
            for local in 0..vp.n_species {
                let k = vp.start + local;
                if !self.species.is_mole_number(k) {
                    continue;
                }
                let irxn = match self.basis.rxn_for_species(k) {
                    Some(irxn) => irxn,
                    None => continue,
                };
                let mut formed = 0.0;
                for j in 0..self.basis.n_components() {
                    let sc = self.basis.stoich(irxn, j);
                    if sc != 0.0 {
                        formed += sc * self.mu[self.basis.component(j)];
                    }
                }
                let dg_star =
                    self.mu0[k] + self.ln_act_coeff[k] + self.species.ln_mnaught[k] - formed;
                fractions[local] = (-dg_star).min(STABILITY_EXPONENT_CAP).exp();
                sum += fractions[local];
            }
            if sum <= 1.0 {
                continue;
            }
            debug!("phase {} is unstable absent: fraction sum {:.3e}", vp.name, sum);
            if best.as_ref().map_or(true, |(_, s, _)| sum > *s) {
                fractions.iter_mut().for_each(|x| *x /= sum);
                best = Some((p, sum, fractions));
            }
        }
        best.map(|(p, _, fractions)| (p, fractions))
    }

    /// Seed an absent phase at the hypothetical fractions. The material is
    /// drawn through the formation reactions, so element abundances are
    /// untouched.
    fn apply_phase_birth(&mut self, p: usize, fractions: &[f64]) {
        let total_reacting: f64 = (0..self.species.n_species())
            .filter(|&k| self.species.is_mole_number(k))
            .map(|k| self.w[k])
            .sum();
        let seed = (self.params.rebirth_mole_fraction * total_reacting)
            .max(10.0 * self.params.phase_delete_cutoff);

        let vp = &self.phases[p];
        debug!("reviving phase {} with {:.3e} mol", vp.name, seed);
        let start = vp.start;
        let n = vp.n_species;
        for local in 0..n {
            let k = start + local;
            if !self.species.is_mole_number(k) {
                continue;
            }
            let moles = seed * fractions[local];
            let irxn = match self.basis.rxn_for_species(k) {
                Some(irxn) => irxn,
                None => continue,
            };
            self.w[k] = moles;
            for j in 0..self.basis.n_components() {
                let c = self.basis.component(j);
                self.w[c] = (self.w[c] - self.basis.stoich(irxn, j) * moles).max(0.0);
            }
        }
    }

    /// One extent change per reaction: Newton steps for majors, clamped
    /// exponential updates for minors, a seed for species re-entering an
    /// existing phase. Interfacial-voltage slots never move.
    fn compute_steps(&mut self) -> Vec<f64> {
        let mut dxi = vec![0.0; self.basis.n_rxns()];
        'rxns: for irxn in 0..self.basis.n_rxns() {
            let k = self.basis.species_for_rxn(irxn);
            if !self.species.is_mole_number(k) {
                continue;
            }
            let vp = &self.phases[self.species.phase_index[k]];
            let dg = self.dg[irxn];
            let step = match self.status[k] {
                SpeciesStatus::Zeroed => {
                    if vp.exists() && dg < -self.params.tol_major {
                        self.params.rebirth_mole_fraction * vp.total_moles
                    } else {
                        continue;
                    }
                }
                SpeciesStatus::Minor => {
                    let factor = (-dg).exp().min(MINOR_GROWTH_LIMIT);
                    self.w[k] * (factor - 1.0)
                }
                SpeciesStatus::Major => {
                    let mut denom = 1.0 / self.w[k];
                    for j in 0..self.basis.n_components() {
                        let sc = self.basis.stoich(irxn, j);
                        if sc == 0.0 {
                            continue;
                        }
                        let wc = self.w[self.basis.component(j)];
                        if wc <= 0.0 {
                            // An exhausted component cannot back this
                            // reaction; force a re-selection instead.
                            self.needs_basis_opt = true;
                            continue 'rxns;
                        }
                        denom += sc * sc / wc;
                    }
                    -dg / denom
                }
            };
            dxi[irxn] = step.max(-self.w[k]);
        }
        dxi
    }

    /// Damp the step so no component goes negative, then back off by
    /// halvings while it raises the total Gibbs energy. The last candidate
    /// is committed even when the retries run out; the next iteration works
    /// from whatever progress was made.
    fn take_step(&mut self, dxi: &[f64]) {
        if dxi.iter().all(|&d| d == 0.0) {
            return;
        }

        let mut lambda = 1.0_f64;
        for j in 0..self.basis.n_components() {
            let k = self.basis.component(j);
            let mut delta = 0.0;
            for (irxn, &d) in dxi.iter().enumerate() {
                delta -= self.basis.stoich(irxn, j) * d;
            }
            if self.w[k] + delta < 0.0 {
                lambda = lambda.min(self.w[k] / -delta);
            }
        }
        if lambda < 1.0 {
            debug!("component depletion damps the step to {:.3e}", lambda);
        }

        let g_old = self.current_dimensionless_gibbs();
        let threshold = g_old + GIBBS_SLACK * g_old.abs().max(1.0);
        let mut scale = lambda;
        let mut candidate = self.composition_after(dxi, scale);
        let mut halvings = 0;
        while self.candidate_gibbs(&candidate) > threshold
            && halvings < self.params.line_search_retries
        {
            scale *= 0.5;
            candidate = self.composition_after(dxi, scale);
            halvings += 1;
        }
        if halvings > 0 {
            debug!("line search halved the step {} times", halvings);
        }
        self.w = candidate;
    }

    /// Apply `scale * dxi` to a copy of the unknown vector, clamping mole
    /// numbers at zero.
    fn composition_after(&self, dxi: &[f64], scale: f64) -> Vec<f64> {
        let mut w = self.w.clone();
        for (irxn, &d) in dxi.iter().enumerate() {
            let k = self.basis.species_for_rxn(irxn);
            if !self.species.is_mole_number(k) {
                continue;
            }
            w[k] = (w[k] + scale * d).max(0.0);
        }
        for j in 0..self.basis.n_components() {
            let k = self.basis.component(j);
            let mut delta = 0.0;
            for (irxn, &d) in dxi.iter().enumerate() {
                delta -= self.basis.stoich(irxn, j) * d;
            }
            w[k] = (w[k] + scale * delta).max(0.0);
        }
        w
    }

    /// Total dimensionless Gibbs energy at the current potentials, without a
    /// fresh sweep.
    fn current_dimensionless_gibbs(&self) -> f64 {
        let mut total = 0.0;
        for k in 0..self.species.n_species() {
            if self.species.is_mole_number(k) && self.w[k] > 0.0 {
                total += self.w[k] * self.mu[k];
            }
        }
        total
    }

    /// Total dimensionless Gibbs energy of a candidate composition. Updates
    /// the adapters and models to the candidate state as a side effect.
    pub(super) fn candidate_gibbs(&mut self, w: &[f64]) -> f64 {
        let mut total = 0.0;
        for p in 0..self.phases.len() {
            self.phases[p].set_moles_from_solver(w, &self.species);
            let vp = &self.phases[p];
            vp.push_to_model(self.mix.phase_mut(p), self.temperature, self.pressure);
            let mut buf = vec![0.0; vp.n_species];
            vp.chem_potentials_into(self.mix.phase(p), &mut buf);
            for (local, &mu) in buf.iter().enumerate() {
                let k = vp.start + local;
                if self.species.is_mole_number(k) && w[k] > 0.0 {
                    total += w[k] * mu / self.rt;
                }
            }
        }
        self.counters.potential_evaluations += 1;
        total
    }

    /// Snap mole numbers below the deletion cutoff to exactly zero. Losing a
    /// component this way forces a basis re-selection.
    fn snap_deleted_species(&mut self) {
        for k in 0..self.species.n_species() {
            if !self.species.is_mole_number(k) {
                continue;
            }
            if self.w[k] > 0.0 && self.w[k] < self.params.species_delete_cutoff {
                debug!("deleting {} at {:.3e} mol", self.species.label(k), self.w[k]);
                self.w[k] = 0.0;
            }
            if self.w[k] == 0.0 && self.basis.is_component(k) {
                self.needs_basis_opt = true;
            }
        }
    }

    /// Zero out phases whose total has collapsed and whose member reactions
    /// all point downhill. Requires adapters synced to the current moles.
    fn zero_dying_phases(&mut self) {
        let mut any_died = false;
        for p in 0..self.phases.len() {
            let vp = &self.phases[p];
            if !vp.exists() || vp.total_moles >= self.params.phase_delete_cutoff {
                continue;
            }

            let members = vp.start..vp.start + vp.n_species;
            if members
                .clone()
                .any(|k| self.species.is_mole_number(k) && self.basis.is_component(k))
            {
                // A dying phase still holds a component; re-select first and
                // revisit the phase next iteration.
                self.needs_basis_opt = true;
                continue;
            }
            let favorable = members.clone().any(|k| {
                self.species.is_mole_number(k)
                    && self
                        .basis
                        .rxn_for_species(k)
                        .map_or(false, |irxn| self.dg[irxn] < 0.0)
            });
            if favorable {
                continue;
            }

            debug!("phase {} zeroed at {:.3e} mol", vp.name, vp.total_moles);
            for k in members {
                if self.species.is_mole_number(k) {
                    self.w[k] = 0.0;
                }
            }
            any_died = true;
        }
        if any_died {
            self.sync_adapters();
        }
    }

    /// Solve the component submatrix for the mole corrections that restore
    /// the chosen element abundances, whenever the residual exceeds the
    /// minor tolerance.
    fn correct_element_abundances(&mut self) {
        if self.enforced_element_residual() <= self.params.tol_element_minor {
            return;
        }
        let nc = self.basis.n_components();
        if nc == 0 {
            return;
        }

        let abundance = compute_abundances(&self.formula, &self.species, &self.w);
        let matrix = Array2::from_shape_fn((nc, nc), |(row, col)| {
            self.formula[[self.basis.component(col), self.basis.chosen_element(row)]]
        });
        let rhs: Vec<f64> = (0..nc)
            .map(|row| {
                let e = self.basis.chosen_element(row);
                self.elements.goals[e] - abundance[e]
            })
            .collect();

        match gauss_solve(&matrix, &rhs) {
            Some(delta) => {
                for (j, &d) in delta.iter().enumerate() {
                    let k = self.basis.component(j);
                    self.w[k] = (self.w[k] + d).max(0.0);
                    if self.w[k] == 0.0 {
                        self.needs_basis_opt = true;
                    }
                }
                self.sync_adapters();
                debug!("element abundances corrected through the components");
            }
            None => {
                warn!("element correction skipped: component submatrix is singular");
                self.range_space_trouble = true;
            }
        }
    }
}
