//! Component basis selection.
//!
//! Picks a linearly independent set of species ("components") spanning the
//! formula matrix so every remaining species can be written as one reaction
//! forming it from components. Selection is a pure function of the formula
//! matrix, a ranking weight per species (mole numbers, or negated
//! standard-state energies before any moles exist) and eligibility flags, so
//! re-optimization after a component is depleted is just another call.
//!
//! Alongside the species choice an equal number of linearly independent
//! element columns is selected; the resulting square component x element
//! submatrix drives both the reaction stoichiometry here and the
//! element-abundance corrections during iteration.

use crate::errors::{EquilError, EquilResult};
use crate::utils::linear_algebra::gauss_solve_multi;
use crate::utils::permutation::Permutation;
use log::{debug, warn};
use ndarray::{Array2, ArrayView1};

/// Rows (columns) whose orthogonalized residual falls below this relative
/// tolerance are treated as linearly dependent.
const INDEPENDENCE_TOL: f64 = 1e-10;

/// The component/reaction partition of one basis optimization.
#[derive(Debug, Clone)]
pub struct Basis {
    /// Solver position -> original species index. Components occupy the
    /// first `n_components` positions.
    perm: Permutation,
    /// Element position -> original element index. The chosen independent
    /// columns occupy the first `n_components` positions.
    elem_perm: Permutation,
    n_components: usize,
    /// One row per reaction: coefficients of the components forming that
    /// reaction's species.
    stoich: Array2<f64>,
    full_rank: bool,
}

impl Basis {
    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn n_rxns(&self) -> usize {
        self.perm.len() - self.n_components
    }

    /// False when the formula matrix could not span all active elements; the
    /// solve continues on the reduced basis and reports a range-space error.
    pub fn full_rank(&self) -> bool {
        self.full_rank
    }

    /// Original species index of component `j`.
    pub fn component(&self, j: usize) -> usize {
        assert!(j < self.n_components, "component index {} out of range", j);
        self.perm.to_original(j)
    }

    /// Original species index of the species formed by reaction `irxn`.
    pub fn species_for_rxn(&self, irxn: usize) -> usize {
        self.perm.to_original(self.n_components + irxn)
    }

    /// Reaction forming species `k`, or None when `k` is a component.
    pub fn rxn_for_species(&self, k: usize) -> Option<usize> {
        let pos = self.perm.from_original(k);
        if pos < self.n_components {
            None
        } else {
            Some(pos - self.n_components)
        }
    }

    pub fn is_component(&self, k: usize) -> bool {
        self.perm.from_original(k) < self.n_components
    }

    /// Original element index of chosen column `j`.
    pub fn chosen_element(&self, j: usize) -> usize {
        assert!(j < self.n_components, "chosen element {} out of range", j);
        self.elem_perm.to_original(j)
    }

    pub fn stoich(&self, irxn: usize, j: usize) -> f64 {
        self.stoich[[irxn, j]]
    }

    pub fn stoich_row(&self, irxn: usize) -> ArrayView1<'_, f64> {
        self.stoich.row(irxn)
    }

    /// The square component x chosen-element submatrix of `formula`.
    pub fn component_matrix(&self, formula: &Array2<f64>) -> Array2<f64> {
        Array2::from_shape_fn((self.n_components, self.n_components), |(j, e)| {
            formula[[self.component(j), self.chosen_element(e)]]
        })
    }
}

/// Select a component basis.
///
/// # Arguments
/// * `formula` - Species x element stoichiometry matrix
/// * `weights` - Ranking weight per species; larger is preferred. Ties go to
///   the lower species index, so selection is deterministic.
/// * `eligible` - Species allowed to be components (interfacial-voltage
///   unknowns never are)
/// * `active_elements` - Elements the basis must span for a full-rank result
///
/// # Errors
/// Returns [`EquilError::LinearSolve`] if the chosen submatrix cannot be
/// factored; this indicates a bug rather than a property of the input, since
/// the selection itself guarantees independence.
pub fn select_basis(
    formula: &Array2<f64>,
    weights: &[f64],
    eligible: &[bool],
    active_elements: &[bool],
) -> EquilResult<Basis> {
    let nsp = formula.nrows();
    let nel = formula.ncols();
    assert_eq!(weights.len(), nsp, "one weight per species");
    assert_eq!(eligible.len(), nsp, "one eligibility flag per species");
    assert_eq!(active_elements.len(), nel, "one activity flag per element");

    let mut order: Vec<usize> = (0..nsp).filter(|&k| eligible[k]).collect();
    order.sort_by(|&a, &b| {
        weights[b]
            .partial_cmp(&weights[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let target = nel.min(order.len());
    let mut components: Vec<usize> = Vec::with_capacity(target);
    let mut ortho: Vec<Vec<f64>> = Vec::with_capacity(target);

    for &k in &order {
        if components.len() == target {
            break;
        }
        let row: Vec<f64> = (0..nel).map(|e| formula[[k, e]]).collect();
        let norm2: f64 = row.iter().map(|v| v * v).sum();
        let mut residual = row;
        for q in &ortho {
            let dot: f64 = residual.iter().zip(q).map(|(r, q)| r * q).sum();
            for (r, q) in residual.iter_mut().zip(q) {
                *r -= dot * q;
            }
        }
        let res2: f64 = residual.iter().map(|v| v * v).sum();
        if res2 > INDEPENDENCE_TOL * INDEPENDENCE_TOL * norm2 {
            let inv_norm = res2.sqrt().recip();
            residual.iter_mut().for_each(|v| *v *= inv_norm);
            ortho.push(residual);
            components.push(k);
        }
    }

    let nc = components.len();
    let n_active = active_elements.iter().filter(|&&a| a).count();
    let mut full_rank = nc >= n_active.min(order.len());
    if !full_rank {
        warn!(
            "basis spans {} of {} active elements; continuing on a reduced basis",
            nc, n_active
        );
    }

    // Species permutation: components first, everything else in original
    // order.
    let mut species_order = components.clone();
    species_order.extend((0..nsp).filter(|k| !components.contains(k)));
    let perm = Permutation::from_order(species_order);

    // Element columns: accept independent columns of the component submatrix
    // until there is one per component.
    let mut chosen: Vec<usize> = Vec::with_capacity(nc);
    let mut col_ortho: Vec<Vec<f64>> = Vec::with_capacity(nc);
    for e in 0..nel {
        if chosen.len() == nc {
            break;
        }
        let col: Vec<f64> = components.iter().map(|&k| formula[[k, e]]).collect();
        let norm2: f64 = col.iter().map(|v| v * v).sum();
        if norm2 == 0.0 {
            continue;
        }
        let mut residual = col;
        for q in &col_ortho {
            let dot: f64 = residual.iter().zip(q).map(|(r, q)| r * q).sum();
            for (r, q) in residual.iter_mut().zip(q) {
                *r -= dot * q;
            }
        }
        let res2: f64 = residual.iter().map(|v| v * v).sum();
        if res2 > INDEPENDENCE_TOL * INDEPENDENCE_TOL * norm2 {
            let inv_norm = res2.sqrt().recip();
            residual.iter_mut().for_each(|v| *v *= inv_norm);
            col_ortho.push(residual);
            chosen.push(e);
        }
    }
    if chosen.len() != nc {
        return Err(EquilError::LinearSolve(format!(
            "found only {} independent element columns for {} components",
            chosen.len(),
            nc
        )));
    }
    let mut element_order = chosen.clone();
    element_order.extend((0..nel).filter(|e| !chosen.contains(e)));
    let elem_perm = Permutation::from_order(element_order);

    // Reaction stoichiometry: solve the square system per noncomponent.
    let n_rxns = nsp - nc;
    let stoich = if n_rxns == 0 || nc == 0 {
        Array2::zeros((n_rxns, nc))
    } else {
        let c_sq_t = Array2::from_shape_fn((nc, nc), |(row, col)| {
            formula[[components[col], chosen[row]]]
        });
        let rhs = Array2::from_shape_fn((nc, n_rxns), |(row, irxn)| {
            formula[[perm.to_original(nc + irxn), chosen[row]]]
        });
        let solution = gauss_solve_multi(&c_sq_t, &rhs).ok_or_else(|| {
            EquilError::LinearSolve(
                "component submatrix is singular despite independent selection".to_string(),
            )
        })?;
        Array2::from_shape_fn((n_rxns, nc), |(irxn, j)| solution[[j, irxn]])
    };

    // A species whose row is outside the component span shows up as a
    // residual on the unchosen element columns.
    for irxn in 0..n_rxns {
        let k = perm.to_original(nc + irxn);
        let scale = (0..nel).fold(1.0_f64, |acc, e| acc.max(formula[[k, e]].abs()));
        for e in nc..nel {
            let orig_e = elem_perm.to_original(e);
            let mut formed = 0.0;
            for j in 0..nc {
                formed += stoich[[irxn, j]] * formula[[components[j], orig_e]];
            }
            if (formed - formula[[k, orig_e]]).abs() > 1e-8 * scale {
                full_rank = false;
                warn!(
                    "species at index {} is outside the component span (element column {})",
                    k, orig_e
                );
            }
        }
    }

    debug!(
        "basis selected: {} components from {} species, full rank: {}",
        nc, nsp, full_rank
    );

    Ok(Basis {
        perm,
        elem_perm,
        n_components: nc,
        stoich,
        full_rank,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use ndarray::array;

    fn all_true(n: usize) -> Vec<bool> {
        vec![true; n]
    }

    #[test]
    fn test_prefers_larger_mole_numbers() {
        // Two species of one element; the more abundant one becomes the
        // component.
        let formula = array![[1.0], [1.0]];

        let basis = select_basis(&formula, &[3.0, 1.0], &all_true(2), &[true]).unwrap();
        assert_eq!(basis.n_components(), 1);
        assert_eq!(basis.component(0), 0);
        assert_eq!(basis.species_for_rxn(0), 1);
        assert!(is_close!(basis.stoich(0, 0), 1.0));

        let basis = select_basis(&formula, &[1.0, 3.0], &all_true(2), &[true]).unwrap();
        assert_eq!(basis.component(0), 1);
    }

    #[test]
    fn test_tie_breaks_to_lower_index() {
        let formula = array![[1.0], [1.0], [1.0]];
        let basis = select_basis(&formula, &[2.0, 2.0, 2.0], &all_true(3), &[true]).unwrap();
        assert_eq!(basis.component(0), 0);
    }

    #[test]
    fn test_reaction_coefficients() {
        // Species: AB = [1,1], A = [1,0], B = [0,1]. With AB and A as
        // components, B = AB - A.
        let formula = array![[1.0, 1.0], [1.0, 0.0], [0.0, 1.0]];
        let basis = select_basis(
            &formula,
            &[10.0, 5.0, 1.0],
            &all_true(3),
            &[true, true],
        )
        .unwrap();

        assert_eq!(basis.n_components(), 2);
        assert_eq!(basis.component(0), 0);
        assert_eq!(basis.component(1), 1);
        assert_eq!(basis.species_for_rxn(0), 2);
        assert!(is_close!(basis.stoich(0, 0), 1.0), "B needs one AB");
        assert!(is_close!(basis.stoich(0, 1), -1.0), "B releases one A");
        assert!(basis.full_rank());
    }

    #[test]
    fn test_skips_dependent_candidate() {
        // B2 = 2*B is dependent on B; despite its high weight it cannot be
        // the second component.
        let formula = array![[0.0, 1.0], [0.0, 2.0], [1.0, 0.0]];
        let basis = select_basis(
            &formula,
            &[10.0, 8.0, 1.0],
            &all_true(3),
            &[true, true],
        )
        .unwrap();

        assert_eq!(basis.n_components(), 2);
        assert_eq!(basis.component(0), 0);
        assert_eq!(basis.component(1), 2, "dependent species passed over");
        assert!(basis.full_rank());
    }

    #[test]
    fn test_rank_deficiency_flagged() {
        // Elements X and Y always appear 1:1, so only one independent
        // direction exists for two active elements.
        let formula = array![[1.0, 1.0], [2.0, 2.0]];
        let basis = select_basis(&formula, &[3.0, 1.0], &all_true(2), &[true, true]).unwrap();

        assert_eq!(basis.n_components(), 1);
        assert!(!basis.full_rank());
        // The dependent species is still expressible: B2X2Y2 = 2 * BXY.
        assert!(is_close!(basis.stoich(0, 0), 2.0));
    }

    #[test]
    fn test_ineligible_species_never_selected() {
        let formula = array![[1.0], [1.0]];
        let basis =
            select_basis(&formula, &[10.0, 1.0], &[false, true], &[true]).unwrap();
        assert_eq!(basis.component(0), 1);
        assert!(!basis.is_component(0));
        assert_eq!(basis.rxn_for_species(0), Some(0));
    }

    #[test]
    fn test_component_matrix_is_nonsingular() {
        // Mirrors the basis-validity property: the chosen square submatrix
        // must always be solvable.
        let formula = array![
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 2.0, 1.0],
            [2.0, 0.0, 1.0],
            [1.0, 1.0, 1.0]
        ];
        let basis = select_basis(
            &formula,
            &[1.0, 2.0, 8.0, 4.0, 0.5],
            &all_true(5),
            &[true, true, true],
        )
        .unwrap();

        assert_eq!(basis.n_components(), 3);
        assert!(basis.full_rank());

        let c_sq = basis.component_matrix(&formula);
        let probe = Array2::from_shape_fn((3, 1), |_| 1.0);
        assert!(
            gauss_solve_multi(&c_sq, &probe).is_some(),
            "component submatrix must be nonsingular"
        );
    }

    #[test]
    fn test_reselection_after_depletion() {
        // First the abundant species is the component; once depleted, a
        // fresh call promotes the noncomponent.
        let formula = array![[1.0], [1.0]];
        let before = select_basis(&formula, &[5.0, 0.1], &all_true(2), &[true]).unwrap();
        assert_eq!(before.component(0), 0);

        let after = select_basis(&formula, &[0.0, 0.1], &all_true(2), &[true]).unwrap();
        assert_eq!(after.component(0), 1);
    }
}
