//! Minos intervals for one-dimensional likelihoods.
//!
//! The interval at confidence level `CL` is the set of `x` with
//! `nll(x) - nll(x̂) <= Δ(CL)`, found by minimising the NLL within a bracket
//! and then solving `nll(x) - nll(x̂) - Δ = 0` on either side of the minimum.

use crate::brent;
use ae_core::{Error, Interval, Measurement, NllFunction, Result};
use ae_prob::confidence::confidence_to_delta_nll;
use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// Tolerances and budgets for [`MinosSolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinosConfig {
    /// Relative tolerance on the interval edges (relative to `|x̂|`).
    pub tolerance: f64,
    /// Absolute tolerance floor, used when `x̂` is near zero.
    pub abs_tolerance: f64,
    /// Iteration budget of each Brent search (minimum, upper root, lower root).
    pub max_iter: usize,
    /// Relative step by which open domain bounds are moved inward.
    pub domain_epsilon: f64,
}

impl Default for MinosConfig {
    fn default() -> Self {
        Self { tolerance: 1e-6, abs_tolerance: 1e-10, max_iter: 100, domain_epsilon: f64::EPSILON }
    }
}

/// A Minos interval together with the minimum it was built around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinosResult {
    /// Position of the NLL minimum.
    pub central: f64,
    /// NLL value at the minimum.
    pub nll_min: f64,
    /// NLL rise defining the interval edges.
    pub delta_nll: f64,
    /// Absolute interval edges.
    pub interval: Interval,
    /// Number of NLL evaluations.
    pub n_fev: usize,
}

impl MinosResult {
    /// `upper - central`
    pub fn error_up(&self) -> f64 {
        self.interval.upper - self.central
    }

    /// `central - lower`
    pub fn error_down(&self) -> f64 {
        self.central - self.interval.lower
    }

    /// The interval as a measurement around its central value.
    pub fn to_measurement(&self) -> Result<Measurement> {
        Measurement::new(self.central, self.error_up(), self.error_down())
    }
}

/// Minos interval solver (Brent minimisation followed by two Brent root searches).
#[derive(Debug, Clone, Default)]
pub struct MinosSolver {
    config: MinosConfig,
}

impl MinosSolver {
    /// Create a solver with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a solver with custom configuration.
    pub fn with_config(config: MinosConfig) -> Self {
        Self { config }
    }

    /// Get configuration.
    pub fn config(&self) -> &MinosConfig {
        &self.config
    }

    /// Interval at confidence level `cl` (one degree of freedom).
    ///
    /// `bracket` is clipped to the NLL's domain first; the minimum is searched
    /// from `guess`.
    pub fn solve(
        &self,
        nll: &dyn NllFunction,
        guess: f64,
        bracket: (f64, f64),
        cl: f64,
    ) -> Result<MinosResult> {
        let delta = confidence_to_delta_nll(cl, 1)?;
        self.solve_delta(nll, guess, bracket, delta)
    }

    /// Interval where the NLL rises by `delta` above its minimum.
    ///
    /// `delta == 0` yields the degenerate interval `[x̂, x̂]`.
    pub fn solve_delta(
        &self,
        nll: &dyn NllFunction,
        guess: f64,
        bracket: (f64, f64),
        delta: f64,
    ) -> Result<MinosResult> {
        if !delta.is_finite() || delta < 0.0 {
            return Err(Error::InvalidInput(format!("ΔNLL must be finite and >= 0, got {delta}")));
        }
        let (lo, hi) = self.clip_bracket(nll, bracket)?;
        let eval = CountingNll::new(nll);

        let (central, nll_min) = self.locate_minimum(&eval, lo, hi, guess)?;
        if delta == 0.0 {
            return Ok(MinosResult {
                central,
                nll_min,
                delta_nll: 0.0,
                interval: Interval::point(central),
                n_fev: eval.count(),
            });
        }

        let target = nll_min + delta;
        let tol = (self.config.tolerance * central.abs()).max(self.config.abs_tolerance);
        let upper = self.edge(&eval, central, hi, target, tol, "upper")?;
        let lower = self.edge(&eval, central, lo, target, tol, "lower")?;
        log::debug!(
            "Minos: x̂={central} nll={nll_min} Δ={delta} -> [{lower}, {upper}] ({} evaluations)",
            eval.count()
        );

        Ok(MinosResult {
            central,
            nll_min,
            delta_nll: delta,
            interval: Interval { lower, upper },
            n_fev: eval.count(),
        })
    }

    /// Minimum of the NLL within `bracket` (clipped to the domain): `(x̂, nll(x̂))`.
    pub fn minimize(
        &self,
        nll: &dyn NllFunction,
        guess: f64,
        bracket: (f64, f64),
    ) -> Result<(f64, f64)> {
        let (lo, hi) = self.clip_bracket(nll, bracket)?;
        self.locate_minimum(&CountingNll::new(nll), lo, hi, guess)
    }

    /// Intersect `bracket` with the open domain of `nll`.
    fn clip_bracket(&self, nll: &dyn NllFunction, bracket: (f64, f64)) -> Result<(f64, f64)> {
        let (min, max) = bracket;
        if min.is_nan() || max.is_nan() || min >= max {
            return Err(Error::InvalidInput(format!("invalid bracket [{min}, {max}]")));
        }
        let eps = self.config.domain_epsilon;
        let (dom_lo, dom_hi) = nll.domain();
        let lo = if dom_lo.is_finite() { min.max(dom_lo + eps * dom_lo.abs().max(1.0)) } else { min };
        let hi = if dom_hi.is_finite() { max.min(dom_hi - eps * dom_hi.abs().max(1.0)) } else { max };
        if !(lo.is_finite() && hi.is_finite()) || lo >= hi {
            return Err(Error::InvalidInput(format!(
                "bracket [{min}, {max}] does not overlap domain ({dom_lo}, {dom_hi}) in a finite range"
            )));
        }
        Ok((lo, hi))
    }

    fn locate_minimum(
        &self,
        eval: &CountingNll<'_>,
        lo: f64,
        hi: f64,
        guess: f64,
    ) -> Result<(f64, f64)> {
        let found = brent::minimize(
            |x| eval.value(x),
            lo,
            hi,
            guess,
            self.config.tolerance,
            self.config.abs_tolerance,
            self.config.max_iter,
        )?;
        let (mut x, mut fx) = (found.x, found.fx);

        // A monotone NLL drives the search against an edge without sampling it.
        for edge in [lo, hi] {
            if edge != x {
                let f_edge = eval.value(edge)?;
                if f_edge < fx {
                    log::warn!("Minos: NLL minimum pinned at bracket edge {edge}");
                    (x, fx) = (edge, f_edge);
                }
            }
        }

        if !fx.is_finite() {
            return Err(Error::Domain(format!("NLL is not finite at its minimum x={x}")));
        }
        Ok((x, fx))
    }

    /// Interval edge between `central` and `limit` where the NLL reaches `target`.
    fn edge(
        &self,
        eval: &CountingNll<'_>,
        central: f64,
        limit: f64,
        target: f64,
        tol: f64,
        side: &str,
    ) -> Result<f64> {
        if limit == central {
            log::debug!("Minos: {side} edge pinned at bracket limit {limit}");
            return Ok(limit);
        }
        let f_central = eval.value(central)? - target;
        let f_limit = eval.value(limit)? - target;
        if f_limit < 0.0 {
            let (lower, upper, f_lower, f_upper) = if limit > central {
                (central, limit, f_central, f_limit)
            } else {
                (limit, central, f_limit, f_central)
            };
            return Err(Error::RootNotBracketed { lower, upper, f_lower, f_upper });
        }
        let root = brent::find_root(
            |x| Ok(eval.value(x)? - target),
            central,
            limit,
            f_central,
            f_limit,
            tol,
            self.config.max_iter,
        )
        .map_err(|e| match e {
            Error::Convergence { iterations, lower, upper, .. } => Error::Convergence {
                context: format!("Minos {side} edge"),
                iterations,
                lower,
                upper,
            },
            other => other,
        })?;
        Ok(root.x)
    }
}

/// NLL evaluation with a call counter; domain failures and NaN read as `+∞`.
struct CountingNll<'a> {
    nll: &'a dyn NllFunction,
    calls: Cell<usize>,
}

impl<'a> CountingNll<'a> {
    fn new(nll: &'a dyn NllFunction) -> Self {
        Self { nll, calls: Cell::new(0) }
    }

    fn value(&self, x: f64) -> Result<f64> {
        self.calls.set(self.calls.get() + 1);
        match self.nll.evaluate(x) {
            Ok(v) if !v.is_nan() => Ok(v),
            Ok(_) | Err(Error::Domain(_)) => Ok(f64::INFINITY),
            Err(e) => Err(e),
        }
    }

    fn count(&self) -> usize {
        self.calls.get()
    }
}

/// Minos interval at confidence level `cl` with default configuration.
pub fn minos(
    nll: &dyn NllFunction,
    guess: f64,
    bracket: (f64, f64),
    cl: f64,
) -> Result<MinosResult> {
    MinosSolver::new().solve(nll, guess, bracket, cl)
}
