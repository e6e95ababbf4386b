//! Element accounting and formula matrix assembly.
//!
//! Elements from all phases are merged by name into one global list, the
//! species x element formula matrix is filled from each phase's composition
//! data, and per-phase charge-neutrality pseudo-elements are appended for
//! multi-species phases carrying charged species. The target abundance
//! vector (the conservation goals) is either supplied explicitly on the
//! mixture or derived from the initial composition.

use crate::errors::{EquilError, EquilResult};
use crate::multiphase::MultiPhase;
use crate::registry::SpeciesTable;
use log::warn;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Largest magnitude a charge-neutrality goal may have before the problem is
/// rejected; anything at or below it is clamped to exactly zero.
pub const CHARGE_NEUTRALITY_GOAL_MAX: f64 = 1e-9;

/// Lattice-ratio goals below this fraction of the total absolute goals are
/// clamped to zero.
pub const LATTICE_RATIO_GOAL_FLOOR: f64 = 1e-10;

/// Conservation-constraint class of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ElementKind {
    /// Ordinary conserved element.
    #[default]
    Normal,
    /// Per-phase pseudo-element enforcing zero net charge.
    ChargeNeutrality,
    /// Pseudo-element tying sublattice site counts together.
    LatticeRatio,
    /// The electron, tracked as an element by electrochemical phases.
    ElectronCharge,
}

/// The merged global element list with target abundances.
#[derive(Debug, Clone)]
pub struct ElementTable {
    pub names: Vec<String>,
    pub kinds: Vec<ElementKind>,
    /// Target abundance per element (mol); filled by [`compute_goals`].
    pub goals: Vec<f64>,
}

impl ElementTable {
    pub fn n_elements(&self) -> usize {
        self.names.len()
    }

    /// Position of the named element, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Merge all phase element lists and build the global formula matrix.
///
/// Appends one charge-neutrality pseudo-element per multi-species phase that
/// contains charged species; its column holds the species charges of that
/// phase. A lone charged species (interfacial-voltage unknown) adds no
/// pseudo-element.
///
/// # Errors
/// Returns [`EquilError::Configuration`] if two phases declare the same
/// element name with different kinds, or if any species ends up with an
/// all-zero formula row.
pub fn assemble(mix: &MultiPhase, species: &SpeciesTable) -> EquilResult<(ElementTable, Array2<f64>)> {
    let nsp = mix.n_species();

    let mut names: Vec<String> = Vec::new();
    let mut kinds: Vec<ElementKind> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for p in 0..mix.n_phases() {
        let model = mix.phase(p);
        for m in 0..model.n_elements() {
            let name = model.element_name(m);
            let kind = model.element_kind(m);
            match index.get(name) {
                Some(&e) => {
                    if kinds[e] != kind {
                        return Err(EquilError::Configuration(format!(
                            "element {} declared with conflicting kinds {:?} and {:?}",
                            name, kinds[e], kind
                        )));
                    }
                }
                None => {
                    index.insert(name.to_string(), names.len());
                    names.push(name.to_string());
                    kinds.push(kind);
                }
            }
        }
    }

    // Charge-neutrality pseudo-elements come after all real elements.
    let mut cn_element_of_phase: Vec<Option<usize>> = vec![None; mix.n_phases()];
    for p in 0..mix.n_phases() {
        let model = mix.phase(p);
        let start = mix.phase_start(p);
        let n = model.n_species();
        let charged = (0..n).any(|k| species.charges[start + k] != 0.0);
        if charged && n > 1 {
            cn_element_of_phase[p] = Some(names.len());
            names.push(format!("cn_{}", model.name()));
            kinds.push(ElementKind::ChargeNeutrality);
        }
    }

    let nel = names.len();
    let mut formula = Array2::zeros((nsp, nel));
    for p in 0..mix.n_phases() {
        let model = mix.phase(p);
        let start = mix.phase_start(p);
        for k in 0..model.n_species() {
            for m in 0..model.n_elements() {
                let e = index[model.element_name(m)];
                formula[[start + k, e]] = model.n_atoms(k, m);
            }
            if let Some(e) = cn_element_of_phase[p] {
                formula[[start + k, e]] = species.charges[start + k];
            }
        }
    }

    for k in 0..nsp {
        let row_empty = (0..nel).all(|e| formula[[k, e]] == 0.0);
        if row_empty {
            return Err(EquilError::Configuration(format!(
                "species {} has an all-zero formula row; every species must contain at least one element",
                species.label(k)
            )));
        }
    }

    let goals = vec![0.0; nel];
    Ok((ElementTable { names, kinds, goals }, formula))
}

/// Element abundances of a composition: for each element, the sum of
/// formula[k, e] * moles[k] over mole-number species.
pub fn compute_abundances(formula: &Array2<f64>, species: &SpeciesTable, moles: &[f64]) -> Vec<f64> {
    let nel = formula.ncols();
    let mut abundance = vec![0.0; nel];
    for k in 0..formula.nrows() {
        if !species.is_mole_number(k) {
            continue;
        }
        let w = moles[k];
        if w == 0.0 {
            continue;
        }
        for e in 0..nel {
            abundance[e] += formula[[k, e]] * w;
        }
    }
    abundance
}

/// Fill the target abundance vector.
///
/// Explicit targets set on the mixture win; every other element takes the
/// abundance of the initial composition. Charge-neutrality goals are clamped
/// to zero (large residuals are rejected), lattice-ratio goals below the
/// relative floor are clamped to zero.
///
/// # Errors
/// Returns [`EquilError::Configuration`] when no explicit targets exist and
/// the initial composition carries no positive mole numbers, when an
/// explicit target names an unknown element, or when a charge-neutrality
/// goal exceeds [`CHARGE_NEUTRALITY_GOAL_MAX`].
pub fn compute_goals(
    elements: &mut ElementTable,
    formula: &Array2<f64>,
    species: &SpeciesTable,
    initial_moles: &[f64],
    explicit: &HashMap<String, f64>,
) -> EquilResult<()> {
    for name in explicit.keys() {
        if elements.index_of(name).is_none() {
            return Err(EquilError::Configuration(format!(
                "explicit element target names unknown element {}",
                name
            )));
        }
    }

    let any_positive = initial_moles
        .iter()
        .enumerate()
        .any(|(k, &w)| species.is_mole_number(k) && w > 0.0);
    if explicit.is_empty() && !any_positive {
        return Err(EquilError::Configuration(
            "element targets cannot be determined: no explicit targets and no positive initial mole numbers".to_string(),
        ));
    }

    let derived = compute_abundances(formula, species, initial_moles);
    for e in 0..elements.n_elements() {
        elements.goals[e] = match explicit.get(&elements.names[e]) {
            Some(&target) => target,
            None => derived[e],
        };
    }

    let total_abs: f64 = elements.goals.iter().map(|g| g.abs()).sum();
    for e in 0..elements.n_elements() {
        match elements.kinds[e] {
            ElementKind::ChargeNeutrality => {
                let goal = elements.goals[e];
                if goal.abs() > CHARGE_NEUTRALITY_GOAL_MAX {
                    return Err(EquilError::Configuration(format!(
                        "charge-neutrality residual for {} is {:e}; the initial composition carries net charge",
                        elements.names[e], goal
                    )));
                }
                if goal != 0.0 {
                    warn!(
                        "clamping charge-neutrality goal for {} from {:e} to zero",
                        elements.names[e], goal
                    );
                    elements.goals[e] = 0.0;
                }
            }
            ElementKind::LatticeRatio => {
                let goal = elements.goals[e];
                if goal.abs() < LATTICE_RATIO_GOAL_FLOOR * total_abs && goal != 0.0 {
                    warn!(
                        "clamping lattice-ratio goal for {} from {:e} to zero",
                        elements.names[e], goal
                    );
                    elements.goals[e] = 0.0;
                }
            }
            ElementKind::Normal | ElementKind::ElectronCharge => {}
        }
    }

    Ok(())
}
