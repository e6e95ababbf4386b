use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EquilError {
    /// The problem description handed to the solver is malformed or
    /// inconsistent. The solver must not be used after this is raised.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A dense linear solve hit a singular or numerically unusable matrix.
    #[error("linear solve failed: {0}")]
    LinearSolve(String),
    /// A post-solve cross-check between the solver's state and the phase
    /// adapters disagreed. Indicates a logic bug, never corrected silently.
    #[error("internal consistency check failed: {0}")]
    Inconsistency(String),
}

pub type EquilResult<T> = Result<T, EquilError>;

/// Terminal state of a solve.
///
/// Recoverable outcomes are carried here rather than in [`EquilError`], so a
/// batch caller can distinguish "retry with a different estimate" from
/// "reject the input" without unwinding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    /// All driving-force and element-abundance tolerances met.
    Converged,
    /// The formula matrix could not be reduced to a full-rank component
    /// basis; the reported composition is a best effort.
    RangeSpaceError,
    /// The iteration budget was exhausted before the tolerances were met.
    NotConverged,
}

impl SolveStatus {
    /// Classic integer status code: 0 converged, 1 range-space error
    /// (best-effort result), negative not converged.
    pub fn code(&self) -> i32 {
        match self {
            SolveStatus::Converged => 0,
            SolveStatus::RangeSpaceError => 1,
            SolveStatus::NotConverged => -1,
        }
    }

    /// True when the reported composition satisfies the convergence
    /// tolerances, possibly on a rank-reduced basis.
    pub fn is_converged(&self) -> bool {
        matches!(self, SolveStatus::Converged | SolveStatus::RangeSpaceError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(SolveStatus::Converged.code(), 0);
        assert_eq!(SolveStatus::RangeSpaceError.code(), 1);
        assert!(SolveStatus::NotConverged.code() < 0);
    }

    #[test]
    fn test_status_serialization() {
        let serialised = serde_json::to_string(&SolveStatus::RangeSpaceError).unwrap();
        let roundtrip: SolveStatus = serde_json::from_str(&serialised).unwrap();
        assert_eq!(roundtrip, SolveStatus::RangeSpaceError);
    }

    #[test]
    fn test_error_display() {
        let err = EquilError::Configuration("phase 2 declares 3 species, delivered 2".to_string());
        assert!(err.to_string().contains("configuration error"));
    }
}
