//! Bookkeeping for equilibrium solves.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Work performed by one [`solve`](crate::solver::EquilSolver::solve) call,
/// or, folded together with [`absorb`](SolveCounters::absorb), by several.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolveCounters {
    /// Outer iterations taken
    pub iterations: usize,
    /// Basis re-optimizations, including the initial selection
    pub basis_optimizations: usize,
    /// Full chemical-potential sweeps over all phases
    pub potential_evaluations: usize,
    /// Wall-clock time, present only when timing was enabled
    pub elapsed: Option<Duration>,
}

impl SolveCounters {
    /// Fold another solve's counters into this one. Elapsed times add when
    /// both are present.
    pub fn absorb(&mut self, other: &SolveCounters) {
        self.iterations += other.iterations;
        self.basis_optimizations += other.basis_optimizations;
        self.potential_evaluations += other.potential_evaluations;
        self.elapsed = match (self.elapsed, other.elapsed) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
    }
}

/// Wall-clock timer that is a no-op unless enabled.
#[derive(Debug)]
pub struct Stopwatch {
    started: Option<Instant>,
}

impl Stopwatch {
    pub fn start(enabled: bool) -> Self {
        Self {
            started: enabled.then(Instant::now),
        }
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.started.map(|t| t.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_sums_counts() {
        let mut total = SolveCounters {
            iterations: 3,
            basis_optimizations: 1,
            potential_evaluations: 4,
            elapsed: Some(Duration::from_millis(5)),
        };
        total.absorb(&SolveCounters {
            iterations: 2,
            basis_optimizations: 2,
            potential_evaluations: 3,
            elapsed: Some(Duration::from_millis(7)),
        });

        assert_eq!(total.iterations, 5);
        assert_eq!(total.basis_optimizations, 3);
        assert_eq!(total.potential_evaluations, 7);
        assert_eq!(total.elapsed, Some(Duration::from_millis(12)));
    }

    #[test]
    fn test_absorb_keeps_known_elapsed() {
        let mut total = SolveCounters::default();
        total.absorb(&SolveCounters {
            elapsed: Some(Duration::from_millis(2)),
            ..Default::default()
        });
        assert_eq!(total.elapsed, Some(Duration::from_millis(2)));
    }

    #[test]
    fn test_disabled_stopwatch_reports_nothing() {
        let sw = Stopwatch::start(false);
        assert!(sw.elapsed().is_none());

        let sw = Stopwatch::start(true);
        assert!(sw.elapsed().is_some());
    }
}
