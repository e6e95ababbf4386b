//! Reference phase models for multiphase equilibrium calculations
//!
//! Ready-made implementations of the [`PhaseModel`] capability consumed by
//! the `mpequil-core` solver: an ideal-gas mixture, a condensed ideal
//! solution, and a pure stoichiometric substance, all driven by
//! constant-heat-capacity standard-state data.
//!
//! # Module Organisation
//!
//! - `thermo`: Standard-state data and species definitions
//! - `ideal_gas`: Ideal-gas mixture phase
//! - `ideal_solution`: Condensed phase mixing ideally
//! - `stoich_substance`: Pure condensed phase with unit activity

pub mod ideal_gas;
pub mod ideal_solution;
pub mod stoich_substance;
pub mod thermo;

pub use mpequil_core::phase_model::PhaseModel;

// Re-export the main entry points for convenience
pub use ideal_gas::IdealGasPhase;
pub use ideal_solution::IdealSolutionPhase;
pub use stoich_substance::StoichSubstance;
pub use thermo::{ConstantCpThermo, SpeciesDef, FARADAY, STANDARD_PRESSURE};
