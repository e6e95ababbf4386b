//! Multiphase chemical equilibrium by Gibbs minimization
//!
//! This crate finds the equilibrium composition of a mixture of phases at
//! fixed temperature and pressure using the VCS (Villars-Cruise-Smith)
//! algorithm: a linearly independent set of component species is chosen from
//! the formula matrix, every remaining species is assigned one formation
//! reaction, and the reaction extents are stepped downhill in total Gibbs
//! energy until the driving forces and element-abundance residuals meet
//! tolerance.
//!
//! # Module Organisation
//!
//! - `multiphase`: The caller-facing mixture container
//! - `phase_model`: The thermodynamic trait a phase must implement
//! - `solver`: The equilibrium solver and its iteration loop
//! - `basis`: Component selection and reaction stoichiometry
//! - `elements`: Formula matrix assembly and conservation targets
//! - `registry` / `volume_phase`: Per-species and per-phase solver state
//! - `parameters`: Tolerances and cutoffs with validated defaults
//!
//! Reference phase models (ideal gas, ideal solution, stoichiometric
//! substance) live in the companion `mpequil-phases` crate.

pub mod basis;
pub mod counters;
pub mod elements;
mod example_models;
pub mod multiphase;
pub mod parameters;
pub mod phase_model;
pub mod registry;
pub mod solver;
pub mod utils;
pub mod volume_phase;

pub mod errors;

// Re-export the main entry points for convenience
pub use errors::{EquilError, EquilResult, SolveStatus};
pub use multiphase::MultiPhase;
pub use parameters::SolverParameters;
pub use phase_model::{ActivityConvention, EosKind, PhaseModel, GAS_CONSTANT};
pub use solver::{equilibrate, EquilSolver, SolveReport};
