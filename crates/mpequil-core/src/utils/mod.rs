//! Small numerical and bookkeeping utilities.

pub mod linear_algebra;
pub mod permutation;
