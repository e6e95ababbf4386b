//! Conservation and equilibrium tests driving full solves through the
//! reference phase models.
//!
//! These verify that the solved states satisfy physical laws:
//! - Element conservation within and across phases
//! - Known analytic equilibrium compositions
//! - Nonnegative mole numbers and sensible report bookkeeping

use approx::assert_relative_eq;
use mpequil_core::phase_model::GAS_CONSTANT;
use mpequil_core::{equilibrate, MultiPhase, SolveStatus, SolverParameters};
use mpequil_phases::{
    ConstantCpThermo, IdealGasPhase, IdealSolutionPhase, SpeciesDef, StoichSubstance,
};

/// Temperature-independent standard-state Gibbs energy (J/mol).
fn fixed_g0(g0: f64) -> ConstantCpThermo {
    ConstantCpThermo::new(298.15, g0, 0.0, 0.0)
}

fn species(name: &str, weight: f64, composition: &[(&str, f64)], g0: f64) -> SpeciesDef {
    SpeciesDef::new(name, weight, composition, fixed_g0(g0))
}

/// CO + H2O <=> CO2 + H2 with all standard potentials equal, so K = 1.
/// Species order: CO, H2O, CO2, H2.
fn shift_mixture(feed: &[f64; 4]) -> MultiPhase {
    let mut mix = MultiPhase::new(1100.0, 101_325.0);
    let gas = IdealGasPhase::new(
        "gas",
        &[
            species("CO", 28.010, &[("C", 1.0), ("O", 1.0)], 0.0),
            species("H2O", 18.015, &[("H", 2.0), ("O", 1.0)], 0.0),
            species("CO2", 44.009, &[("C", 1.0), ("O", 2.0)], 0.0),
            species("H2", 2.016, &[("H", 2.0)], 0.0),
        ],
    )
    .unwrap();
    mix.add_phase_with_moles(Box::new(gas), feed).unwrap();
    mix
}

/// Condensed iodine under a nitrogen atmosphere. The condensed standard
/// state sits RT ln 4 below the vapor, which fixes the equilibrium vapor
/// mole fraction at 1/4. Species order: N2, I2, I2(s).
fn sublimation_mixture() -> MultiPhase {
    let temperature = 350.0;
    let rt = GAS_CONSTANT * temperature;
    let mut mix = MultiPhase::new(temperature, 101_325.0);
    let gas = IdealGasPhase::new(
        "gas",
        &[
            species("N2", 28.014, &[("N", 2.0)], 0.0),
            species("I2", 253.81, &[("I", 2.0)], 0.0),
        ],
    )
    .unwrap();
    let solid = StoichSubstance::new(
        "iodine",
        species("I2(s)", 253.81, &[("I", 2.0)], -rt * 4.0_f64.ln()),
    )
    .unwrap();
    mix.add_phase_with_moles(Box::new(gas), &[1.0, 0.0]).unwrap();
    mix.add_phase_with_moles(Box::new(solid), &[1.0]).unwrap();
    mix
}

/// Silver and gold with identical standard potentials in the pure and the
/// mixed phase: ideal mixing makes the alloy strictly favorable and both
/// pure phases dissolve completely. Species order: Ag(s), Au(s), Ag, Au.
fn alloy_mixture() -> MultiPhase {
    let mut mix = MultiPhase::new(900.0, 101_325.0);
    let silver = StoichSubstance::new(
        "silver",
        species("Ag(s)", 107.87, &[("Ag", 1.0)], -5000.0),
    )
    .unwrap();
    let gold = StoichSubstance::new(
        "gold",
        species("Au(s)", 196.97, &[("Au", 1.0)], -8000.0),
    )
    .unwrap();
    let alloy = IdealSolutionPhase::new(
        "alloy",
        &[
            species("Ag", 107.87, &[("Ag", 1.0)], -5000.0),
            species("Au", 196.97, &[("Au", 1.0)], -8000.0),
        ],
    )
    .unwrap();
    mix.add_phase_with_moles(Box::new(silver), &[1.0]).unwrap();
    mix.add_phase_with_moles(Box::new(gold), &[3.0]).unwrap();
    mix.add_phase(Box::new(alloy));
    mix
}

mod element_conservation {
    use super::*;

    /// Carbon, hydrogen and oxygen totals survive the shift reaction.
    #[test]
    fn test_gas_reaction_conserves_elements() {
        let mut mix = shift_mixture(&[1.0, 1.0, 0.0, 0.0]);
        let report = equilibrate(&mut mix, SolverParameters::default()).unwrap();
        assert_eq!(report.status, SolveStatus::Converged);

        let m = mix.species_moles();
        assert_relative_eq!(m[0] + m[2], 1.0, max_relative = 1e-9); // C
        assert_relative_eq!(2.0 * m[1] + 2.0 * m[3], 2.0, max_relative = 1e-9); // H
        assert_relative_eq!(m[0] + m[1] + 2.0 * m[2], 2.0, max_relative = 1e-9); // O
    }

    /// Iodine moved between the vapor and the condensed phase is not
    /// created or destroyed.
    #[test]
    fn test_cross_phase_transfer_conserves_elements() {
        let mut mix = sublimation_mixture();
        let report = equilibrate(&mut mix, SolverParameters::default()).unwrap();
        assert_eq!(report.status, SolveStatus::Converged);

        let m = mix.species_moles();
        assert_relative_eq!(2.0 * (m[1] + m[2]), 2.0, max_relative = 1e-9); // I
        assert_relative_eq!(2.0 * m[0], 2.0, max_relative = 1e-9); // N
    }

    /// Dissolving two pure phases into a solution keeps the metal totals.
    #[test]
    fn test_dissolution_conserves_elements() {
        let mut mix = alloy_mixture();
        let report = equilibrate(&mut mix, SolverParameters::default()).unwrap();
        assert_eq!(report.status, SolveStatus::Converged);

        let m = mix.species_moles();
        assert_relative_eq!(m[0] + m[2], 1.0, max_relative = 1e-9); // Ag
        assert_relative_eq!(m[1] + m[3], 3.0, max_relative = 1e-9); // Au
    }
}

mod equilibrium_compositions {
    use super::*;

    /// With K = 1 the symmetric feed must settle at an even split.
    #[test]
    fn test_symmetric_shift_reaches_even_split() {
        let mut mix = shift_mixture(&[1.0, 1.0, 0.0, 0.0]);
        equilibrate(&mut mix, SolverParameters::default()).unwrap();

        for (k, &n) in mix.species_moles().iter().enumerate() {
            assert_relative_eq!(n, 0.5, max_relative = 1e-6);
            assert!(n > 0.0, "species {} should be present at equilibrium", k);
        }
    }

    /// A standard-state offset of RT ln 2 between two isomers fixes their
    /// equilibrium ratio at 2.
    #[test]
    fn test_isomerization_reaches_analytic_ratio() {
        let temperature = 500.0;
        let rt = GAS_CONSTANT * temperature;
        let mut mix = MultiPhase::new(temperature, 101_325.0);
        let gas = IdealGasPhase::new(
            "gas",
            &[
                species("butane", 58.12, &[("C", 4.0), ("H", 10.0)], 0.0),
                species("isobutane", 58.12, &[("C", 4.0), ("H", 10.0)], -rt * 2.0_f64.ln()),
            ],
        )
        .unwrap();
        mix.add_phase_with_moles(Box::new(gas), &[3.0, 0.0]).unwrap();

        let report = equilibrate(&mut mix, SolverParameters::default()).unwrap();
        assert_eq!(report.status, SolveStatus::Converged);

        let m = mix.species_moles();
        assert_relative_eq!(m[0], 1.0, max_relative = 1e-6);
        assert_relative_eq!(m[1], 2.0, max_relative = 1e-6);
    }

    /// The vapor grows until its mole fraction matches the standard-state
    /// offset of the condensed phase: x = 1/4, so a third of a mole joins
    /// the one mole of carrier gas.
    #[test]
    fn test_vapor_above_condensed_phase() {
        let mut mix = sublimation_mixture();
        equilibrate(&mut mix, SolverParameters::default()).unwrap();

        let m = mix.species_moles();
        assert_relative_eq!(m[1], 1.0 / 3.0, max_relative = 1e-6);
        assert_relative_eq!(m[2], 2.0 / 3.0, max_relative = 1e-6);
        assert!(m[2] > 0.0, "the condensed phase must survive at coexistence");
    }

    /// Ideal mixing always lowers the Gibbs energy, so the pure phases
    /// disappear entirely and the alloy carries the full inventory.
    #[test]
    fn test_ideal_mixing_dissolves_pure_phases() {
        let mut mix = alloy_mixture();
        equilibrate(&mut mix, SolverParameters::default()).unwrap();

        let m = mix.species_moles();
        assert_eq!(m[0], 0.0, "pure silver should be deleted outright");
        assert_eq!(m[1], 0.0, "pure gold should be deleted outright");
        assert_relative_eq!(m[2], 1.0, max_relative = 1e-6);
        assert_relative_eq!(m[3], 3.0, max_relative = 1e-6);
    }
}

mod solver_behavior {
    use super::*;

    /// Feeding an equilibrated composition back in converges on the first
    /// iteration without touching the mole numbers.
    #[test]
    fn test_equilibrated_feed_converges_immediately() {
        let mut mix = shift_mixture(&[0.5, 0.5, 0.5, 0.5]);
        let report = equilibrate(&mut mix, SolverParameters::default()).unwrap();

        assert_eq!(report.status, SolveStatus::Converged);
        assert_eq!(report.iterations, 1);
        for &n in mix.species_moles() {
            assert_relative_eq!(n, 0.5, max_relative = 1e-9);
        }
    }

    /// Even the scenario with phase birth, component exhaustion and phase
    /// death never produces a negative mole number.
    #[test]
    fn test_mole_numbers_stay_nonnegative() {
        let mut mix = alloy_mixture();
        equilibrate(&mut mix, SolverParameters::default()).unwrap();

        for (k, &n) in mix.species_moles().iter().enumerate() {
            assert!(n >= 0.0, "species {} went negative: {}", k, n);
        }
    }

    /// The report's Gibbs energy and volume match the analytic values for
    /// the equilibrated ideal-gas mixture.
    #[test]
    fn test_report_tracks_gibbs_and_volume() {
        let mut mix = shift_mixture(&[1.0, 1.0, 0.0, 0.0]);
        let report = equilibrate(&mut mix, SolverParameters::default()).unwrap();

        // Four species at 0.5 mol and x = 1/4 each, standard potentials all
        // zero: G = RT * sum n ln x = 2 RT ln(1/4).
        let rt = GAS_CONSTANT * 1100.0;
        assert_relative_eq!(
            report.gibbs_energy,
            2.0 * rt * 0.25_f64.ln(),
            max_relative = 1e-6
        );
        // Two total moles of ideal gas.
        assert_relative_eq!(
            report.total_volume,
            2.0 * rt / 101_325.0,
            max_relative = 1e-6
        );
    }
}
