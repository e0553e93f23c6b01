//! Minos intervals on a derived quantity of several parameters (profile likelihood).
//!
//! For a multi-dimensional NLL `F(θ)` and a scalar variable of interest
//! `v = V(θ)`, the profile NLL is `P(v) = min { F(θ) : V(θ) = v }`. The
//! constraint is solved for one *pivot* parameter and the remaining parameters
//! are minimised by [`LbfgsbOptimizer`]. The interval edges are the roots of
//! `P(v) - F(θ̂) - Δ` on either side of `v̂ = V(θ̂)`, bracketed by doubling steps
//! and refined by Brent's method. Each inner fit is warm-started from the
//! optimum of the previous trial value.
//!
//! Parameters are kept inside the open domains reported by
//! [`ObjectiveFunction::parameter_domain`]. A trial value no admissible
//! parameter vector reaches profiles to `+∞`, which the edge search reads as
//! lying outside the interval.

use crate::brent;
use crate::minos::{MinosConfig, MinosResult};
use crate::optimizer::{LbfgsbOptimizer, ObjectiveFunction, OptimizationResult, OptimizerConfig};
use ae_core::{Error, Interval, NllFunction, Result};
use ae_prob::confidence::confidence_to_delta_nll;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Scalar quantity derived from a parameter vector.
pub trait ProfileVariable: Send + Sync {
    /// `V(params)`
    fn value(&self, params: &[f64]) -> f64;

    /// Value of `params[pivot]` for which `V(params) == target`, all other entries fixed.
    fn solve_pivot(&self, params: &[f64], pivot: usize, target: f64) -> Result<f64>;

    /// Smallest interval holding `V` over the box `ranges`; unbounded unless overridden.
    fn image(&self, _ranges: &[(f64, f64)]) -> (f64, f64) {
        (f64::NEG_INFINITY, f64::INFINITY)
    }
}

/// `V(θ) = Σ θᵢ`
#[derive(Debug, Clone, Copy, Default)]
pub struct SumVariable;

impl ProfileVariable for SumVariable {
    fn value(&self, params: &[f64]) -> f64 {
        params.iter().sum()
    }

    fn solve_pivot(&self, params: &[f64], pivot: usize, target: f64) -> Result<f64> {
        let rest: f64 =
            params.iter().enumerate().filter(|&(i, _)| i != pivot).map(|(_, v)| v).sum();
        Ok(target - rest)
    }

    fn image(&self, ranges: &[(f64, f64)]) -> (f64, f64) {
        ranges.iter().fold((0.0, 0.0), |(a, b), &(lo, hi)| (a + lo, b + hi))
    }
}

/// `V(θ) = Π θᵢ`
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductVariable;

impl ProfileVariable for ProductVariable {
    fn value(&self, params: &[f64]) -> f64 {
        params.iter().product()
    }

    fn solve_pivot(&self, params: &[f64], pivot: usize, target: f64) -> Result<f64> {
        let rest: f64 =
            params.iter().enumerate().filter(|&(i, _)| i != pivot).map(|(_, v)| v).product();
        if rest == 0.0 {
            return Err(Error::DivisionByZero(format!(
                "cannot solve product for parameter {pivot}: other factors multiply to zero"
            )));
        }
        let v = target / rest;
        if !v.is_finite() {
            return Err(Error::InvalidInput(format!("pivot value {target}/{rest} overflowed")));
        }
        Ok(v)
    }

    fn image(&self, ranges: &[(f64, f64)]) -> (f64, f64) {
        ranges.iter().fold((1.0, 1.0), |(a, b), &(lo, hi)| {
            // 0·∞ contributes nothing
            let corners =
                [a * lo, a * hi, b * lo, b * hi].map(|c| if c.is_nan() { 0.0 } else { c });
            (
                corners.iter().copied().fold(f64::INFINITY, f64::min),
                corners.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            )
        })
    }
}

/// Joint NLL of independent parameters: `F(θ) = Σ nllᵢ(θᵢ)`.
#[derive(Debug, Clone)]
pub struct UncorrelatedNll<N> {
    terms: Vec<N>,
}

impl<N: NllFunction> UncorrelatedNll<N> {
    /// One term per parameter.
    pub fn new(terms: Vec<N>) -> Self {
        Self { terms }
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// True when there are no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// The per-parameter NLLs.
    pub fn terms(&self) -> &[N] {
        &self.terms
    }
}

impl<N: NllFunction> ObjectiveFunction for UncorrelatedNll<N> {
    fn eval(&self, params: &[f64]) -> Result<f64> {
        if params.len() != self.terms.len() {
            return Err(Error::InvalidInput(format!(
                "expected {} parameters, got {}",
                self.terms.len(),
                params.len()
            )));
        }
        let mut total = 0.0;
        for (term, &x) in self.terms.iter().zip(params) {
            total += term.evaluate(x)?;
        }
        Ok(total)
    }

    fn parameter_domain(&self, index: usize) -> (f64, f64) {
        self.terms.get(index).map_or((f64::NEG_INFINITY, f64::INFINITY), |t| t.domain())
    }

    /// Per-term derivatives; steps stay inside each term's open domain.
    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        self.terms
            .iter()
            .zip(params)
            .map(|(term, &x)| {
                let h = 1e-8 * x.abs().max(1.0);
                let (lo, hi) = term.domain();
                let (a, b) = if x - h <= lo {
                    (x, x + h)
                } else if x + h >= hi {
                    (x - h, x)
                } else {
                    (x - h, x + h)
                };
                Ok((term.evaluate(b)? - term.evaluate(a)?) / (b - a))
            })
            .collect()
    }
}

/// Tolerances and budgets for [`ProfileMinos`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Outer root-search tolerances.
    pub minos: MinosConfig,
    /// Inner optimizer configuration.
    pub inner: OptimizerConfig,
    /// Parameter eliminated through the constraint (`None`: parameter 0).
    pub pivot: Option<usize>,
    /// Maximum number of step doublings while bracketing an edge.
    pub max_expansions: usize,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            minos: MinosConfig::default(),
            inner: OptimizerConfig::default(),
            pivot: None,
            max_expansions: 50,
        }
    }
}

/// Optional starting points for the edge searches, in units of the variable of interest.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EdgeGuess {
    /// Expected upper edge.
    pub upper: Option<f64>,
    /// Expected lower edge.
    pub lower: Option<f64>,
}

/// One point of a profile scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilePoint {
    /// Value of the variable of interest.
    pub value: f64,
    /// Profiled NLL at `value`; `+∞` when no admissible parameters reach `value`.
    pub nll: f64,
    /// Full parameter vector at the conditional minimum (the warm start when `nll` is `+∞`).
    pub parameters: Vec<f64>,
}

/// Open-domain bounds moved inward by `eps` relative, like [`crate::MinosSolver`] does.
pub(crate) fn clip_to_domain(bounds: (f64, f64), domain: (f64, f64), eps: f64) -> (f64, f64) {
    let (dom_lo, dom_hi) = domain;
    let (mut lo, mut hi) = bounds;
    if dom_lo.is_finite() {
        lo = lo.max(dom_lo + eps * dom_lo.abs().max(1.0));
    }
    if dom_hi.is_finite() {
        hi = hi.min(dom_hi - eps * dom_hi.abs().max(1.0));
    }
    (lo, hi)
}

/// `bounds` intersected with the objective's parameter domains.
fn admissible_ranges(
    objective: &dyn ObjectiveFunction,
    bounds: &[(f64, f64)],
    eps: f64,
) -> Result<Vec<(f64, f64)>> {
    bounds
        .iter()
        .enumerate()
        .map(|(i, &b)| {
            let (lo, hi) = clip_to_domain(b, objective.parameter_domain(i), eps);
            if !(lo <= hi) {
                return Err(Error::InvalidInput(format!(
                    "bounds [{}, {}] of parameter {i} lie outside its domain",
                    b.0, b.1
                )));
            }
            Ok((lo, hi))
        })
        .collect()
}

/// Width of the quadratic wall past a parameter's range, relative to the edge.
const WALL_WIDTH: f64 = 1e-3;

/// `objective` continued past `ranges`.
///
/// Each parameter beyond its range is held at the edge and a quadratic wall in
/// the overshoot is added, so trial steps and difference quotients there see a
/// finite, rising cost instead of a domain error.
#[derive(Clone, Copy)]
struct Walled<'a> {
    objective: &'a dyn ObjectiveFunction,
    ranges: &'a [(f64, f64)],
}

impl Walled<'_> {
    fn eval_full(&self, mut full: Vec<f64>) -> Result<f64> {
        let mut wall = 0.0;
        for (x, &(lo, hi)) in full.iter_mut().zip(self.ranges) {
            let edge = x.clamp(lo, hi);
            let overshoot = (*x - edge) / (WALL_WIDTH * edge.abs().max(1.0));
            wall += 0.5 * overshoot * overshoot;
            *x = edge;
        }
        Ok(self.objective.eval(&full)? + wall)
    }
}

impl ObjectiveFunction for Walled<'_> {
    fn eval(&self, params: &[f64]) -> Result<f64> {
        self.eval_full(params.to_vec())
    }
}

/// Objective over all parameters but the pivot, which is fixed by the constraint.
struct PinnedObjective<'a> {
    walled: Walled<'a>,
    variable: &'a dyn ProfileVariable,
    pivot: usize,
    target: f64,
}

impl PinnedObjective<'_> {
    fn expand(&self, reduced: &[f64]) -> Result<Vec<f64>> {
        let mut full = Vec::with_capacity(reduced.len() + 1);
        full.extend_from_slice(&reduced[..self.pivot]);
        full.push(0.0);
        full.extend_from_slice(&reduced[self.pivot..]);
        full[self.pivot] = self.variable.solve_pivot(&full, self.pivot, self.target)?;
        Ok(full)
    }
}

impl ObjectiveFunction for PinnedObjective<'_> {
    fn eval(&self, reduced: &[f64]) -> Result<f64> {
        self.walled.eval_full(self.expand(reduced)?)
    }
}

fn without(values: &[f64], skip: usize) -> Vec<f64> {
    values.iter().enumerate().filter(|&(i, _)| i != skip).map(|(_, &v)| v).collect()
}

/// Conditional minimiser of an NLL at fixed values of a [`ProfileVariable`].
///
/// Holds no state between calls: the starting point of each fit is the
/// warm-start vector passed in.
pub struct ProfileMinimizer<'a> {
    objective: &'a dyn ObjectiveFunction,
    variable: &'a dyn ProfileVariable,
    ranges: Vec<(f64, f64)>,
    pivot: usize,
    optimizer: LbfgsbOptimizer,
    fallback: Vec<f64>,
}

impl<'a> ProfileMinimizer<'a> {
    /// Create a minimiser; `fallback` is the restart point used when a warm-started fit fails.
    ///
    /// `bounds` are narrowed to the objective's parameter domains using
    /// `config.minos.domain_epsilon`; the fits use `config.inner`.
    pub fn new(
        objective: &'a dyn ObjectiveFunction,
        variable: &'a dyn ProfileVariable,
        bounds: &[(f64, f64)],
        pivot: usize,
        config: &ProfileConfig,
        fallback: Vec<f64>,
    ) -> Result<Self> {
        if bounds.is_empty() || pivot >= bounds.len() || fallback.len() != bounds.len() {
            return Err(Error::InvalidInput(format!(
                "pivot {pivot} / start of length {} invalid for {} parameters",
                fallback.len(),
                bounds.len()
            )));
        }
        let ranges = admissible_ranges(objective, bounds, config.minos.domain_epsilon)?;
        let optimizer = LbfgsbOptimizer::new(config.inner.clone());
        Ok(Self { objective, variable, ranges, pivot, optimizer, fallback })
    }

    /// Minimise the NLL subject to `V(θ) = value`, starting from `warm_start`.
    pub fn minimize_at(&self, value: f64, warm_start: &[f64]) -> Result<ProfilePoint> {
        if warm_start.len() != self.ranges.len() {
            return Err(Error::InvalidInput(format!(
                "warm start has {} entries, expected {}",
                warm_start.len(),
                self.ranges.len()
            )));
        }
        let (reach_lo, reach_hi) = self.variable.image(&self.ranges);
        if !(reach_lo <= value && value <= reach_hi) {
            log::debug!("profile: {value} is out of reach [{reach_lo}, {reach_hi}]");
            return Ok(ProfilePoint { value, nll: f64::INFINITY, parameters: warm_start.to_vec() });
        }
        let pinned = PinnedObjective {
            walled: Walled { objective: self.objective, ranges: &self.ranges },
            variable: self.variable,
            pivot: self.pivot,
            target: value,
        };

        if self.ranges.len() == 1 {
            let parameters = pinned.expand(&[])?;
            let (lo, hi) = self.ranges[0];
            let nll = if (lo..=hi).contains(&parameters[0]) {
                finite_or_inf(self.objective.eval(&parameters))?
            } else {
                f64::INFINITY
            };
            return Ok(ProfilePoint { value, nll, parameters });
        }

        let bounds = self.reduced_bounds();
        let fit = match self.fit(&pinned, &without(warm_start, self.pivot), &bounds) {
            Ok(fit) => fit,
            Err(first) => {
                log::warn!(
                    "profile fit at {value} failed from warm start ({first}); restarting from the global minimum"
                );
                self.fit(&pinned, &without(&self.fallback, self.pivot), &bounds).map_err(|e| {
                    match e {
                        Error::Convergence { iterations, .. } => Error::Convergence {
                            context: format!("profile inner minimisation at {value}"),
                            iterations,
                            lower: value,
                            upper: value,
                        },
                        other => other,
                    }
                })?
            }
        };
        let parameters = pinned.expand(&fit.parameters)?;
        Ok(ProfilePoint { value, nll: fit.fval, parameters })
    }

    fn reduced_bounds(&self) -> Vec<(f64, f64)> {
        self.ranges.iter().enumerate().filter(|&(i, _)| i != self.pivot).map(|(_, &b)| b).collect()
    }

    fn fit(
        &self,
        pinned: &PinnedObjective<'_>,
        start: &[f64],
        bounds: &[(f64, f64)],
    ) -> Result<OptimizationResult> {
        let fit = self.optimizer.minimize(pinned, start, bounds)?;
        if !fit.converged {
            return Err(Error::Convergence {
                context: format!("profile inner minimisation ({})", fit.message),
                iterations: fit.n_iter as usize,
                lower: pinned.target,
                upper: pinned.target,
            });
        }
        Ok(fit)
    }
}

fn finite_or_inf(v: Result<f64>) -> Result<f64> {
    match v {
        Ok(x) if !x.is_nan() => Ok(x),
        Ok(_) | Err(Error::Domain(_)) => Ok(f64::INFINITY),
        Err(e) => Err(e),
    }
}

/// Objective wrapper counting evaluations.
struct CountingObjective<'a> {
    inner: &'a dyn ObjectiveFunction,
    calls: AtomicUsize,
}

impl ObjectiveFunction for CountingObjective<'_> {
    fn eval(&self, params: &[f64]) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.eval(params)
    }

    fn parameter_domain(&self, index: usize) -> (f64, f64) {
        self.inner.parameter_domain(index)
    }

    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        self.inner.gradient(params)
    }
}

/// Profile-likelihood Minos solver.
#[derive(Debug, Clone, Default)]
pub struct ProfileMinos {
    config: ProfileConfig,
}

impl ProfileMinos {
    /// Create a solver with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a solver with custom configuration.
    pub fn with_config(config: ProfileConfig) -> Self {
        Self { config }
    }

    /// Get configuration.
    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }

    /// Interval on `variable` at confidence level `cl` (one degree of freedom).
    pub fn solve(
        &self,
        objective: &dyn ObjectiveFunction,
        variable: &dyn ProfileVariable,
        init: &[f64],
        bounds: &[(f64, f64)],
        cl: f64,
        guess: EdgeGuess,
    ) -> Result<MinosResult> {
        let delta = confidence_to_delta_nll(cl, 1)?;
        self.solve_delta(objective, variable, init, bounds, delta, guess)
    }

    /// Interval on `variable` where the profiled NLL rises by `delta`.
    pub fn solve_delta(
        &self,
        objective: &dyn ObjectiveFunction,
        variable: &dyn ProfileVariable,
        init: &[f64],
        bounds: &[(f64, f64)],
        delta: f64,
        guess: EdgeGuess,
    ) -> Result<MinosResult> {
        if !delta.is_finite() || delta < 0.0 {
            return Err(Error::InvalidInput(format!("ΔNLL must be finite and >= 0, got {delta}")));
        }
        if init.is_empty() || init.len() != bounds.len() {
            return Err(Error::InvalidInput(format!(
                "{} initial values for {} bounds",
                init.len(),
                bounds.len()
            )));
        }
        let counted = CountingObjective { inner: objective, calls: AtomicUsize::new(0) };

        let ranges = admissible_ranges(&counted, bounds, self.config.minos.domain_epsilon)?;
        let optimizer = LbfgsbOptimizer::new(self.config.inner.clone());
        let walled = Walled { objective: &counted, ranges: &ranges };
        let global = optimizer.minimize(&walled, init, &ranges)?;
        if !global.converged {
            let reached = variable.value(&global.parameters);
            return Err(Error::Convergence {
                context: format!("profile global minimisation ({})", global.message),
                iterations: global.n_iter as usize,
                lower: reached,
                upper: reached,
            });
        }
        let best = global.parameters;
        let nll_min = global.fval;
        let central = variable.value(&best);
        log::debug!("profile: global minimum nll={nll_min} at v={central}");

        if delta == 0.0 {
            return Ok(MinosResult {
                central,
                nll_min,
                delta_nll: 0.0,
                interval: Interval::point(central),
                n_fev: counted.calls.load(Ordering::Relaxed),
            });
        }

        let pivot = self.config.pivot.unwrap_or(0);
        let minimizer =
            ProfileMinimizer::new(&counted, variable, &ranges, pivot, &self.config, best.clone())?;
        let tol = (self.config.minos.tolerance * central.abs()).max(self.config.minos.abs_tolerance);
        let default_step = 1e-2 * central.abs().max(1.0);

        let upper_step =
            guess.upper.map(|g| g - central).filter(|s| *s > 0.0).unwrap_or(default_step);
        let lower_step =
            guess.lower.map(|g| central - g).filter(|s| *s > 0.0).unwrap_or(default_step);
        let upper =
            self.edge(&minimizer, &best, central, nll_min, delta, upper_step, tol, 1.0)?;
        let lower =
            self.edge(&minimizer, &best, central, nll_min, delta, lower_step, tol, -1.0)?;

        Ok(MinosResult {
            central,
            nll_min,
            delta_nll: delta,
            interval: Interval { lower, upper },
            n_fev: counted.calls.load(Ordering::Relaxed),
        })
    }

    /// Edge on the side `direction` (`+1` upper, `-1` lower) of `central`.
    #[allow(clippy::too_many_arguments)]
    fn edge(
        &self,
        minimizer: &ProfileMinimizer<'_>,
        best: &[f64],
        central: f64,
        nll_min: f64,
        delta: f64,
        first_step: f64,
        tol: f64,
        direction: f64,
    ) -> Result<f64> {
        let side = if direction > 0.0 { "upper" } else { "lower" };
        let target = nll_min + delta;
        let mut warm = best.to_vec();
        let excess = |v: f64, warm: &mut Vec<f64>| -> Result<f64> {
            let point = minimizer.minimize_at(v, warm)?;
            if point.nll.is_finite() {
                *warm = point.parameters;
            }
            Ok(point.nll - target)
        };

        let mut inner = central;
        let mut f_inner = -delta;
        let mut step = first_step;
        let mut outer = central + direction * step;
        let mut f_outer = excess(outer, &mut warm)?;
        let mut expansions = 0;
        while f_outer < 0.0 {
            if expansions >= self.config.max_expansions {
                let (lower, upper, f_lower, f_upper) = if direction > 0.0 {
                    (central, outer, f_inner, f_outer)
                } else {
                    (outer, central, f_outer, f_inner)
                };
                return Err(Error::RootNotBracketed { lower, upper, f_lower, f_upper });
            }
            inner = outer;
            f_inner = f_outer;
            step *= 2.0;
            outer = central + direction * step;
            f_outer = excess(outer, &mut warm)?;
            expansions += 1;
        }
        log::debug!("profile: {side} edge bracketed in [{inner}, {outer}] after {expansions} expansions");

        let root = brent::find_root(
            |v| excess(v, &mut warm),
            inner,
            outer,
            f_inner,
            f_outer,
            tol,
            self.config.minos.max_iter,
        )
        .map_err(|e| match e {
            Error::Convergence { iterations, lower, upper, .. } => Error::Convergence {
                context: format!("profile {side} edge"),
                iterations,
                lower,
                upper,
            },
            other => other,
        })?;
        Ok(root.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_core::Measurement;
    use ae_prob::{GaussianNll, LinearVarianceNll, ONE_SIGMA_LEVEL, PoissonNll};
    use approx::assert_relative_eq;

    fn two_gaussians() -> UncorrelatedNll<GaussianNll> {
        UncorrelatedNll::new(vec![
            GaussianNll::new(1.0, 1.0).unwrap(),
            GaussianNll::new(2.0, 2.0).unwrap(),
        ])
    }

    const WIDE: [(f64, f64); 2] = [(-50.0, 50.0), (-50.0, 50.0)];

    // Counts of 1 and 2 events; their sum profiles like a single count of 3.
    fn two_counts() -> UncorrelatedNll<PoissonNll> {
        UncorrelatedNll::new(vec![PoissonNll::new(1.0).unwrap(), PoissonNll::new(2.0).unwrap()])
    }

    const COUNT_BOUNDS: [(f64, f64); 2] = [(0.0, 11.0), (0.0, 16.0)];

    #[test]
    fn test_variables() {
        assert_eq!(SumVariable.value(&[1.0, 2.0, 3.5]), 6.5);
        assert_eq!(SumVariable.solve_pivot(&[1.0, 0.0, 3.5], 1, 10.0).unwrap(), 5.5);
        assert_eq!(ProductVariable.value(&[2.0, 3.0]), 6.0);
        assert_eq!(ProductVariable.solve_pivot(&[2.0, 0.0, 4.0], 1, 16.0).unwrap(), 2.0);
        assert!(matches!(
            ProductVariable.solve_pivot(&[0.0, 1.0], 1, 1.0),
            Err(Error::DivisionByZero(_))
        ));
    }

    #[test]
    fn test_uncorrelated_gradient_matches_closed_form() {
        let nll = two_gaussians();
        let g = nll.gradient(&[2.0, 0.0]).unwrap();
        assert_relative_eq!(g[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(g[1], -0.5, epsilon = 1e-6);
        assert!(matches!(nll.eval(&[1.0]), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_minimizer_constrained_optimum() {
        let nll = two_gaussians();
        let cfg = ProfileConfig::default();
        let m = ProfileMinimizer::new(&nll, &SumVariable, &WIDE, 1, &cfg, vec![1.0, 2.0]).unwrap();
        // x + y = 8: x = 1 + (8 - 3)/5, y = 8 - x
        let p = m.minimize_at(8.0, &[1.0, 2.0]).unwrap();
        assert_relative_eq!(p.parameters[0], 2.0, epsilon = 1e-4);
        assert_relative_eq!(p.parameters[1], 6.0, epsilon = 1e-4);
        assert_relative_eq!(p.nll, 2.5, epsilon = 1e-6);
        assert_relative_eq!(p.parameters.iter().sum::<f64>(), 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_minimizer_rejects_bad_shapes() {
        let nll = two_gaussians();
        let cfg = ProfileConfig::default();
        let bad_pivot = ProfileMinimizer::new(&nll, &SumVariable, &WIDE, 2, &cfg, vec![0.0; 2]);
        assert!(bad_pivot.is_err());
        let short_start = ProfileMinimizer::new(&nll, &SumVariable, &WIDE, 0, &cfg, vec![0.0]);
        assert!(short_start.is_err());
        let m = ProfileMinimizer::new(&nll, &SumVariable, &WIDE, 0, &cfg, vec![0.0; 2]).unwrap();
        assert!(matches!(m.minimize_at(1.0, &[0.0]), Err(Error::InvalidInput(_))));

        let counts = two_counts();
        let below_domain = [(-5.0, -1.0), (0.0, 16.0)];
        let r = ProfileMinimizer::new(&counts, &SumVariable, &below_domain, 1, &cfg, vec![1.0; 2]);
        assert!(matches!(r, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_variable_images() {
        assert_eq!(SumVariable.image(&[(0.0, 1.0), (-2.0, 3.0)]), (-2.0, 4.0));
        assert_eq!(ProductVariable.image(&[(0.5, 2.0), (-1.0, 3.0)]), (-2.0, 6.0));
        let unbounded = [(0.0, f64::INFINITY), (1.0, 2.0)];
        assert_eq!(ProductVariable.image(&unbounded), (0.0, f64::INFINITY));
    }

    #[test]
    fn test_pivot_stays_inside_count_domain() {
        // Warm start (1, 2) puts the pivot at 0.28; full steps on the other
        // count would push it below zero.
        let nll = two_counts();
        let cfg = ProfileConfig::default();
        let m = ProfileMinimizer::new(&nll, &SumVariable, &COUNT_BOUNDS, 1, &cfg, vec![1.0, 2.0])
            .unwrap();
        let p = m.minimize_at(1.28, &[1.0, 2.0]).unwrap();
        // Optimum splits the total in proportion to the counts.
        assert_relative_eq!(p.parameters[0], 1.28 / 3.0, epsilon = 1e-4);
        assert_relative_eq!(p.parameters[1], 2.56 / 3.0, epsilon = 1e-4);
        let expected = nll.eval(&[1.28 / 3.0, 2.56 / 3.0]).unwrap();
        assert_relative_eq!(p.nll, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_unreachable_value_profiles_to_infinity() {
        let nll = two_counts();
        let cfg = ProfileConfig::default();
        let m = ProfileMinimizer::new(&nll, &SumVariable, &COUNT_BOUNDS, 1, &cfg, vec![1.0, 2.0])
            .unwrap();
        let p = m.minimize_at(-0.25, &[1.0, 2.0]).unwrap();
        assert_eq!(p.nll, f64::INFINITY);
        assert_eq!(p.parameters, vec![1.0, 2.0]);
        assert_eq!(m.minimize_at(28.0, &[1.0, 2.0]).unwrap().nll, f64::INFINITY);
    }

    #[test]
    fn test_sum_of_counts_profiles_like_total_count() {
        let nll = two_counts();
        let cfg = ProfileConfig { pivot: Some(1), ..Default::default() };
        let r = ProfileMinos::with_config(cfg)
            .solve(
                &nll,
                &SumVariable,
                &[1.0, 2.0],
                &COUNT_BOUNDS,
                ONE_SIGMA_LEVEL,
                EdgeGuess { upper: Some(4.72), lower: Some(1.28) },
            )
            .unwrap();
        // Roots of x - 3 ln x = 3 - 3 ln 3 + 1/2
        assert_relative_eq!(r.central, 3.0, epsilon = 1e-5);
        assert_relative_eq!(r.interval.lower, 1.583_974_256, epsilon = 1e-4);
        assert_relative_eq!(r.interval.upper, 5.080_236_697, epsilon = 1e-4);
    }

    #[test]
    fn test_inner_budget_exhaustion_is_convergence_error() {
        let nll = UncorrelatedNll::new(vec![
            GaussianNll::new(1.0, 1.0).unwrap(),
            GaussianNll::new(2.0, 2.0).unwrap(),
            GaussianNll::new(3.0, 0.5).unwrap(),
        ]);
        // Starting at the optimum, the global fit converges before its first iteration.
        let cfg = ProfileConfig {
            inner: OptimizerConfig { max_iter: 1, ..Default::default() },
            ..Default::default()
        };
        let bounds = [(-50.0, 50.0); 3];
        let r = ProfileMinos::with_config(cfg).solve(
            &nll,
            &SumVariable,
            &[1.0, 2.0, 3.0],
            &bounds,
            ONE_SIGMA_LEVEL,
            EdgeGuess::default(),
        );
        match r {
            Err(Error::Convergence { context, lower, upper, .. }) => {
                assert!(context.starts_with("profile inner minimisation"), "{context}");
                assert_relative_eq!(lower, 6.06, epsilon = 1e-9);
                assert_eq!(lower, upper);
            }
            other => panic!("expected Convergence, got {other:?}"),
        }
    }

    #[test]
    fn test_global_budget_exhaustion_reports_reached_value() {
        let nll = two_gaussians();
        let cfg = ProfileConfig {
            inner: OptimizerConfig { max_iter: 1, ..Default::default() },
            ..Default::default()
        };
        let r = ProfileMinos::with_config(cfg).solve(
            &nll,
            &SumVariable,
            &[-4.0, 9.0],
            &WIDE,
            ONE_SIGMA_LEVEL,
            EdgeGuess::default(),
        );
        match r {
            Err(Error::Convergence { context, lower, upper, .. }) => {
                assert!(context.starts_with("profile global minimisation"), "{context}");
                assert!(lower.is_finite());
                assert_eq!(lower, upper);
            }
            other => panic!("expected Convergence, got {other:?}"),
        }
    }

    #[test]
    fn test_sum_of_gaussians_adds_in_quadrature() {
        let nll = two_gaussians();
        let r = ProfileMinos::new()
            .solve(&nll, &SumVariable, &[0.0, 0.0], &WIDE, ONE_SIGMA_LEVEL, EdgeGuess::default())
            .unwrap();
        assert_relative_eq!(r.central, 3.0, epsilon = 1e-4);
        assert_relative_eq!(r.error_up(), 5f64.sqrt(), epsilon = 1e-4);
        assert_relative_eq!(r.error_down(), 5f64.sqrt(), epsilon = 1e-4);
        assert!(r.n_fev > 0);
    }

    #[test]
    fn test_single_parameter_profile_is_plain_minos() {
        let m = Measurement::new(4.0, 1.5, 0.5).unwrap();
        let nll = UncorrelatedNll::new(vec![LinearVarianceNll::new(&m)]);
        let r = ProfileMinos::new()
            .solve(
                &nll,
                &SumVariable,
                &[3.5],
                &[(-20.0, 30.0)],
                ONE_SIGMA_LEVEL,
                EdgeGuess { upper: Some(5.5), lower: Some(3.5) },
            )
            .unwrap();
        assert_relative_eq!(r.error_up(), 1.5, epsilon = 1e-4);
        assert_relative_eq!(r.error_down(), 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_product_of_relative_errors() {
        let unit = Measurement::symmetric(1.0, 0.1).unwrap();
        let nll = UncorrelatedNll::new(vec![LinearVarianceNll::new(&unit); 2]);
        let r = ProfileMinos::new()
            .solve(
                &nll,
                &ProductVariable,
                &[0.9, 1.2],
                &[(1e-6, 2.0), (1e-6, 2.0)],
                ONE_SIGMA_LEVEL,
                EdgeGuess { upper: Some(1.14), lower: Some(0.86) },
            )
            .unwrap();
        // Symmetric optimum x = y = sqrt(v): (sqrt(v) - 1)² / 0.01 = 1/2
        let s = 0.5f64.sqrt() * 0.1;
        assert_relative_eq!(r.central, 1.0, epsilon = 1e-5);
        assert_relative_eq!(r.interval.upper, (1.0 + s).powi(2), epsilon = 1e-4);
        assert_relative_eq!(r.interval.lower, (1.0 - s).powi(2), epsilon = 1e-4);
    }

    #[test]
    fn test_zero_delta_is_degenerate() {
        let nll = two_gaussians();
        let r = ProfileMinos::new()
            .solve_delta(&nll, &SumVariable, &[0.0, 0.0], &WIDE, 0.0, EdgeGuess::default())
            .unwrap();
        assert!(r.interval.is_degenerate());
        assert_relative_eq!(r.central, 3.0, epsilon = 1e-4);
    }

    #[test]
    fn test_not_bracketed_without_expansions() {
        let nll = two_gaussians();
        let solver = ProfileMinos::with_config(ProfileConfig { max_expansions: 0, ..Default::default() });
        let r = solver.solve(
            &nll,
            &SumVariable,
            &[0.0, 0.0],
            &WIDE,
            ONE_SIGMA_LEVEL,
            EdgeGuess { upper: Some(3.1), lower: None },
        );
        match r {
            Err(Error::RootNotBracketed { lower, upper, f_upper, .. }) => {
                assert_relative_eq!(lower, 3.0, epsilon = 1e-6);
                assert_relative_eq!(upper, 3.1, epsilon = 1e-6);
                assert!(f_upper < 0.0);
            }
            other => panic!("expected RootNotBracketed, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_inputs() {
        let nll = two_gaussians();
        let solver = ProfileMinos::new();
        let r = solver.solve(&nll, &SumVariable, &[0.0], &WIDE, 0.5, EdgeGuess::default());
        assert!(matches!(r, Err(Error::InvalidInput(_))));
        let r = solver.solve_delta(&nll, &SumVariable, &[0.0, 0.0], &WIDE, -1.0, EdgeGuess::default());
        assert!(matches!(r, Err(Error::InvalidInput(_))));
        let r = solver.solve(&nll, &SumVariable, &[0.0, 0.0], &WIDE, 1.5, EdgeGuess::default());
        assert!(matches!(r, Err(Error::InvalidInput(_))));
    }
}
