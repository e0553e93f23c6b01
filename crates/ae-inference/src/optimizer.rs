//! Box-constrained minimisation of multi-parameter NLLs.
//!
//! argmin's L-BFGS knows nothing about bounds. Every trial point is projected
//! onto the box before the objective sees it, and gradient components that
//! point out of an active face are dropped, so the iteration slides along the
//! face instead of leaving it.

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use ae_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Settings of one L-BFGS fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Iteration budget.
    pub max_iter: u64,
    /// Gradient-norm threshold; the cost-change threshold is a tenth of it.
    pub tol: f64,
    /// Number of correction pairs kept by L-BFGS.
    pub m: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { max_iter: 1000, tol: 1e-6, m: 10 }
    }
}

/// Outcome of [`LbfgsbOptimizer::minimize`].
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    /// Best point found, inside the bounds.
    pub parameters: Vec<f64>,
    /// Objective at `parameters`.
    pub fval: f64,
    /// Iterations spent.
    pub n_iter: u64,
    /// Objective evaluations.
    pub n_fev: usize,
    /// Gradient evaluations.
    pub n_gev: usize,
    /// False when the budget ran out or argmin gave up.
    pub converged: bool,
    /// Termination status, or the reason argmin gave up.
    pub message: String,
}

/// Multi-parameter NLL `F(θ)`.
pub trait ObjectiveFunction: Send + Sync {
    /// `F(params)`
    fn eval(&self, params: &[f64]) -> Result<f64>;

    /// Open interval of valid values of parameter `index`.
    fn parameter_domain(&self, _index: usize) -> (f64, f64) {
        (f64::NEG_INFINITY, f64::INFINITY)
    }

    /// `∇F`; central differences unless overridden.
    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        let mut point = params.to_vec();
        (0..params.len())
            .map(|i| {
                let x = params[i];
                let h = 1e-8 * x.abs().max(1.0);
                point[i] = x + h;
                let above = self.eval(&point)?;
                point[i] = x - h;
                let below = self.eval(&point)?;
                point[i] = x;
                Ok((above - below) / (2.0 * h))
            })
            .collect()
    }
}

fn project(params: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    params.iter().zip(bounds).map(|(&x, &(lo, hi))| x.clamp(lo, hi)).collect()
}

fn to_argmin(e: Error) -> argmin::core::Error {
    argmin::core::Error::msg(e.to_string())
}

/// `objective` seen through the box `bounds`.
struct Boxed<'a> {
    objective: &'a dyn ObjectiveFunction,
    bounds: &'a [(f64, f64)],
    evals: &'a AtomicUsize,
    grads: &'a AtomicUsize,
}

impl CostFunction for Boxed<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Vec<f64>) -> std::result::Result<f64, argmin::core::Error> {
        self.evals.fetch_add(1, Ordering::Relaxed);
        self.objective.eval(&project(params, self.bounds)).map_err(to_argmin)
    }
}

impl Gradient for Boxed<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, params: &Vec<f64>) -> std::result::Result<Vec<f64>, argmin::core::Error> {
        self.grads.fetch_add(1, Ordering::Relaxed);
        let x = project(params, self.bounds);
        let mut g = self.objective.gradient(&x).map_err(to_argmin)?;
        for ((gi, &xi), &(lo, hi)) in g.iter_mut().zip(&x).zip(self.bounds) {
            // descent goes along -g
            if (xi <= lo && *gi > 0.0) || (xi >= hi && *gi < 0.0) {
                *gi = 0.0;
            }
        }
        Ok(g)
    }
}

/// L-BFGS with box constraints.
#[derive(Debug, Clone, Default)]
pub struct LbfgsbOptimizer {
    config: OptimizerConfig,
}

impl LbfgsbOptimizer {
    /// Create an optimizer with the given configuration.
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Get configuration.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Minimise `objective` from `init` inside `bounds` (one closed `(lo, hi)` per parameter).
    ///
    /// Running out of iterations is not an error: the result comes back with
    /// `converged == false`. So does a run argmin abandons (a failed line search
    /// or an objective error); its result is the projected starting point.
    pub fn minimize(
        &self,
        objective: &dyn ObjectiveFunction,
        init: &[f64],
        bounds: &[(f64, f64)],
    ) -> Result<OptimizationResult> {
        if init.len() != bounds.len() {
            return Err(Error::InvalidInput(format!(
                "{} starting values for {} bounds",
                init.len(),
                bounds.len()
            )));
        }
        if let Some((i, (lo, hi))) = bounds.iter().enumerate().find(|(_, (lo, hi))| !(lo <= hi)) {
            return Err(Error::InvalidInput(format!("empty bounds [{lo}, {hi}] for parameter {i}")));
        }

        let start = project(init, bounds);
        let evals = AtomicUsize::new(0);
        let grads = AtomicUsize::new(0);
        let problem = Boxed { objective, bounds, evals: &evals, grads: &grads };

        let tol = self.config.tol;
        let tol_cost = if tol == 0.0 { 0.0 } else { (0.1 * tol).max(1e-12) };
        let solver = LBFGS::new(MoreThuenteLineSearch::new(), self.config.m)
            .with_tolerance_grad(tol)
            .and_then(|s| s.with_tolerance_cost(tol_cost))
            .map_err(|e| Error::InvalidInput(format!("optimizer tolerance {tol}: {e}")))?;

        let max_iter = self.config.max_iter;
        let run = Executor::new(problem, solver)
            .configure(|state| state.param(start.clone()).max_iters(max_iter))
            .run();

        let result = match run {
            Ok(res) => {
                let state = res.state();
                match state.get_best_param() {
                    Some(best) => {
                        let status = state.get_termination_status();
                        OptimizationResult {
                            parameters: project(best, bounds),
                            fval: state.get_best_cost(),
                            n_iter: state.get_iter(),
                            n_fev: evals.load(Ordering::Relaxed),
                            n_gev: grads.load(Ordering::Relaxed),
                            converged: matches!(
                                status,
                                TerminationStatus::Terminated(
                                    TerminationReason::SolverConverged
                                        | TerminationReason::TargetCostReached
                                )
                            ),
                            message: status.to_string(),
                        }
                    }
                    None => self.abandoned(objective, start, "no iterate recorded".into(), &evals)?,
                }
            }
            Err(e) => {
                log::debug!("L-BFGS gave up: {e}");
                self.abandoned(objective, start, e.to_string(), &evals)?
            }
        };
        log::debug!(
            "L-BFGS: fval={} after {} iterations, {} evaluations, {}",
            result.fval,
            result.n_iter,
            result.n_fev,
            result.message
        );
        Ok(result)
    }

    fn abandoned(
        &self,
        objective: &dyn ObjectiveFunction,
        start: Vec<f64>,
        reason: String,
        evals: &AtomicUsize,
    ) -> Result<OptimizationResult> {
        let fval = objective.eval(&start)?;
        Ok(OptimizationResult {
            parameters: start,
            fval,
            n_iter: 0,
            n_fev: evals.load(Ordering::Relaxed) + 1,
            n_gev: 0,
            converged: false,
            message: reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // Gaussian terms for (2 ± 1) and (3 ± 0.5).
    struct GaussianPair;

    impl ObjectiveFunction for GaussianPair {
        fn eval(&self, params: &[f64]) -> Result<f64> {
            Ok(0.5 * (params[0] - 2.0).powi(2) + 2.0 * (params[1] - 3.0).powi(2))
        }

        fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
            Ok(vec![params[0] - 2.0, 4.0 * (params[1] - 3.0)])
        }
    }

    // Poisson term for 4 observed events, gradient by differences.
    struct FourEvents;

    impl ObjectiveFunction for FourEvents {
        fn eval(&self, params: &[f64]) -> Result<f64> {
            let mu = params[0];
            if mu <= 0.0 {
                return Err(Error::Domain(format!("Poisson mean must be > 0, got {mu}")));
            }
            Ok(mu - 4.0 * mu.ln())
        }

        fn parameter_domain(&self, _index: usize) -> (f64, f64) {
            (0.0, f64::INFINITY)
        }
    }

    // Valid only at the single point 3.
    struct Pinhole;

    impl ObjectiveFunction for Pinhole {
        fn eval(&self, params: &[f64]) -> Result<f64> {
            if params[0] == 3.0 {
                Ok(1.0)
            } else {
                Err(Error::Domain(format!("{} is off the pinhole", params[0])))
            }
        }
    }

    #[test]
    fn test_gaussian_pair_minimum() {
        let cfg = OptimizerConfig { max_iter: 100, ..Default::default() };
        let fit = LbfgsbOptimizer::new(cfg)
            .minimize(&GaussianPair, &[0.0, 0.0], &[(-10.0, 10.0), (-10.0, 10.0)])
            .unwrap();
        assert!(fit.converged, "{}", fit.message);
        assert_relative_eq!(fit.parameters[0], 2.0, epsilon = 1e-4);
        assert_relative_eq!(fit.parameters[1], 3.0, epsilon = 1e-4);
        assert_relative_eq!(fit.fval, 0.0, epsilon = 1e-6);
        assert!(fit.n_fev > 0 && fit.n_gev > 0);
    }

    #[test]
    fn test_fit_stops_on_active_faces() {
        let fit = LbfgsbOptimizer::default()
            .minimize(&GaussianPair, &[4.0, 1.5], &[(3.0, 5.0), (1.0, 2.0)])
            .unwrap();
        assert!(fit.converged, "{}", fit.message);
        assert_relative_eq!(fit.parameters[0], 3.0, epsilon = 1e-4);
        assert_relative_eq!(fit.parameters[1], 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_poisson_term_by_differences() {
        let g = FourEvents.gradient(&[2.0]).unwrap();
        assert_relative_eq!(g[0], 1.0 - 4.0 / 2.0, epsilon = 1e-6);
        assert_eq!(FourEvents.parameter_domain(0), (0.0, f64::INFINITY));
        assert_eq!(GaussianPair.parameter_domain(1), (f64::NEG_INFINITY, f64::INFINITY));

        let fit =
            LbfgsbOptimizer::default().minimize(&FourEvents, &[1.0], &[(1e-6, 100.0)]).unwrap();
        assert_relative_eq!(fit.parameters[0], 4.0, epsilon = 1e-3);
    }

    #[test]
    fn test_budget_exhaustion_is_not_an_error() {
        let cfg = OptimizerConfig { max_iter: 1, ..Default::default() };
        let fit = LbfgsbOptimizer::new(cfg)
            .minimize(&GaussianPair, &[0.0, 0.0], &[(-10.0, 10.0), (-10.0, 10.0)])
            .unwrap();
        assert!(!fit.converged);
        assert_eq!(fit.n_iter, 1);
    }

    #[test]
    fn test_abandoned_run_returns_start() {
        let fit = LbfgsbOptimizer::default().minimize(&Pinhole, &[3.0], &[(0.0, 10.0)]).unwrap();
        assert!(!fit.converged);
        assert_eq!(fit.parameters, vec![3.0]);
        assert_eq!(fit.fval, 1.0);
        assert!(fit.message.contains("pinhole"), "{}", fit.message);
    }

    #[test]
    fn test_shape_errors() {
        let opt = LbfgsbOptimizer::default();
        let r = opt.minimize(&GaussianPair, &[0.0], &[(0.0, 1.0), (0.0, 1.0)]);
        assert!(matches!(r, Err(Error::InvalidInput(_))));
        let r = opt.minimize(&GaussianPair, &[0.0, 0.0], &[(1.0, 0.0), (0.0, 1.0)]);
        assert!(matches!(r, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let cfg: OptimizerConfig = serde_json::from_str(r#"{"tol": 1e-8}"#).unwrap();
        assert_eq!(cfg, OptimizerConfig { tol: 1e-8, ..OptimizerConfig::default() });
        assert_eq!(LbfgsbOptimizer::new(cfg.clone()).config(), &cfg);
    }
}
