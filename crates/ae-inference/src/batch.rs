//! Independent problems solved in parallel with Rayon.
//!
//! Results come back in input order; a failure in one problem does not affect
//! the others.

use crate::combine::{prod_uncorrelated, sum_uncorrelated};
use crate::minos::{MinosResult, MinosSolver};
use ae_core::{Measurement, NllFunction, Result};
use rayon::prelude::*;

/// One problem of a [`solve_batch`] call.
#[derive(Clone, Copy)]
pub struct MinosProblem<'a> {
    /// Likelihood to scan.
    pub nll: &'a dyn NllFunction,
    /// Starting point of the minimum search.
    pub guess: f64,
    /// Search bracket.
    pub bracket: (f64, f64),
}

/// Minos intervals at `cl` for every problem.
pub fn solve_batch(
    solver: &MinosSolver,
    problems: &[MinosProblem<'_>],
    cl: f64,
) -> Vec<Result<MinosResult>> {
    problems.par_iter().map(|p| solver.solve(p.nll, p.guess, p.bracket, cl)).collect()
}

/// [`sum_uncorrelated`] for every group.
pub fn sum_uncorrelated_batch(groups: &[Vec<Measurement>], cl: f64) -> Vec<Result<Measurement>> {
    groups.par_iter().map(|g| sum_uncorrelated(g, cl)).collect()
}

/// [`prod_uncorrelated`] for every group.
pub fn prod_uncorrelated_batch(groups: &[Vec<Measurement>], cl: f64) -> Vec<Result<Measurement>> {
    groups.par_iter().map(|g| prod_uncorrelated(g, cl)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_core::Error;
    use ae_prob::{GaussianNll, ONE_SIGMA_LEVEL, PoissonNll};

    #[test]
    fn test_batch_matches_serial_in_order() {
        let nlls: Vec<PoissonNll> = (1..=20).map(|n| PoissonNll::new(n as f64).unwrap()).collect();
        let problems: Vec<MinosProblem<'_>> = nlls
            .iter()
            .zip(1..=20)
            .map(|(nll, n)| MinosProblem { nll, guess: n as f64, bracket: (0.0, 100.0) })
            .collect();
        let solver = MinosSolver::new();
        let batch = solve_batch(&solver, &problems, ONE_SIGMA_LEVEL);
        assert_eq!(batch.len(), problems.len());
        for (p, r) in problems.iter().zip(&batch) {
            let serial = solver.solve(p.nll, p.guess, p.bracket, ONE_SIGMA_LEVEL).unwrap();
            assert_eq!(r.as_ref().unwrap(), &serial);
        }
    }

    #[test]
    fn test_failures_stay_local() {
        let good = GaussianNll::new(0.0, 1.0).unwrap();
        let problems = [
            MinosProblem { nll: &good, guess: 0.0, bracket: (-5.0, 5.0) },
            MinosProblem { nll: &good, guess: 0.0, bracket: (5.0, -5.0) },
            MinosProblem { nll: &good, guess: 0.0, bracket: (-0.1, 5.0) },
        ];
        let r = solve_batch(&MinosSolver::new(), &problems, ONE_SIGMA_LEVEL);
        assert!(r[0].is_ok());
        assert!(matches!(r[1], Err(Error::InvalidInput(_))));
        assert!(matches!(r[2], Err(Error::RootNotBracketed { .. })));
    }

    #[test]
    fn test_combination_batches() {
        let groups = vec![
            vec![Measurement::symmetric(10.0, 1.0).unwrap(); 2],
            vec![],
            vec![Measurement::new(4.0, 1.5, 0.5).unwrap()],
        ];
        let sums = sum_uncorrelated_batch(&groups, ONE_SIGMA_LEVEL);
        for (g, r) in groups.iter().zip(&sums) {
            assert_eq!(r, &sum_uncorrelated(g, ONE_SIGMA_LEVEL));
        }
        assert!(sums[1].is_err());

        let prods = prod_uncorrelated_batch(&groups, ONE_SIGMA_LEVEL);
        assert_eq!(prods.len(), 3);
        assert!(prods[0].is_ok() && prods[1].is_err());
    }
}
