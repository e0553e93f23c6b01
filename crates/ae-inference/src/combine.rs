//! Combination of measurements with asymmetric errors.
//!
//! ## Methods
//!
//! - **Same quantity** ([`sum_uncorrelated`]): independent measurements of one
//!   quantity share a parameter `x`; the combined NLL is `Σᵢ nllᵢ(x)` and the
//!   result is its Minos interval. With Gaussian terms this is the
//!   inverse-variance weighted mean.
//!
//! - **Sum of quantities** ([`add_uncorrelated`]): one parameter per
//!   measurement, joint NLL `Σᵢ nllᵢ(θᵢ)`, interval on `Σ θᵢ` by profile Minos.
//!
//! - **Product of quantities** ([`prod_uncorrelated`]): as for the sum, on the
//!   normalised measurements and `Π θᵢ`, rescaled by the product of centrals.
//!
//! - **Correlated sum** ([`sum_correlated`]): the covariance is factorised by
//!   [`decompose_covariance`](crate::covariance::decompose_covariance) into
//!   independent unit components that are then added.
//!
//! Per-measurement NLLs default to [`LinearVarianceNll`]; the `_with` variants
//! take any constructor.

use crate::covariance::decompose_covariance;
use crate::minos::MinosSolver;
use crate::profile::{
    EdgeGuess, ProductVariable, ProfileConfig, ProfileMinos, ProfileVariable, SumVariable,
    UncorrelatedNll, clip_to_domain,
};
use ae_core::{Error, Measurement, NllFunction, Result};
use ae_prob::LinearVarianceNll;
use ae_prob::confidence::confidence_to_sigma;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Lower bound on normalised factors in a product fit.
const MIN_FACTOR: f64 = 1e-6;

/// Configuration shared by the combiners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineConfig {
    /// Solver settings; `profile.minos` is also used by [`sum_uncorrelated_with`].
    pub profile: ProfileConfig,
    /// Search range per measurement, in units of its errors at the requested level.
    pub bracket_scale: f64,
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self { profile: ProfileConfig::default(), bracket_scale: 10.0 }
    }
}

/// Sum of per-measurement NLLs over one shared parameter.
#[derive(Debug, Clone)]
pub struct CombinedNll<N> {
    terms: Vec<N>,
}

impl<N: NllFunction> CombinedNll<N> {
    /// Combine `terms`.
    pub fn new(terms: Vec<N>) -> Self {
        Self { terms }
    }

    /// The individual terms.
    pub fn terms(&self) -> &[N] {
        &self.terms
    }
}

impl<N: NllFunction> NllFunction for CombinedNll<N> {
    fn evaluate(&self, x: f64) -> Result<f64> {
        let mut total = 0.0;
        for term in &self.terms {
            total += term.evaluate(x)?;
        }
        Ok(total)
    }

    fn domain(&self) -> (f64, f64) {
        self.terms.iter().map(NllFunction::domain).fold(
            (f64::NEG_INFINITY, f64::INFINITY),
            |(lo, hi), (a, b)| (lo.max(a), hi.min(b)),
        )
    }
}

fn default_nll(m: &Measurement) -> Result<LinearVarianceNll> {
    Ok(LinearVarianceNll::new(m))
}

fn check_not_empty(measurements: &[Measurement]) -> Result<()> {
    if measurements.is_empty() {
        return Err(Error::InvalidInput("no measurements to combine".into()));
    }
    Ok(())
}

/// Half-widths `(below, above)` of the search range around a measurement.
fn reach(m: &Measurement, k: f64) -> (f64, f64) {
    let avg = m.avg_error();
    (k * m.error_down().max(avg), k * m.error_up().max(avg))
}

fn scale_factor(cl: f64, config: &CombineConfig) -> Result<f64> {
    if !(config.bracket_scale > 0.0 && config.bracket_scale.is_finite()) {
        return Err(Error::InvalidInput(format!(
            "bracket scale must be finite and > 0, got {}",
            config.bracket_scale
        )));
    }
    Ok(config.bracket_scale * confidence_to_sigma(cl)?.max(1.0))
}

/// Combine independent measurements of the same quantity with default settings.
pub fn sum_uncorrelated(measurements: &[Measurement], cl: f64) -> Result<Measurement> {
    sum_uncorrelated_with(measurements, cl, default_nll, &CombineConfig::default())
}

/// Combine independent measurements of the same quantity.
///
/// `ctor` builds the NLL of each measurement. Exact measurements pin the
/// result: they must agree with each other, and the uncertain ones are then
/// ignored.
pub fn sum_uncorrelated_with<N, F>(
    measurements: &[Measurement],
    cl: f64,
    ctor: F,
    config: &CombineConfig,
) -> Result<Measurement>
where
    N: NllFunction,
    F: Fn(&Measurement) -> Result<N>,
{
    check_not_empty(measurements)?;
    let k = scale_factor(cl, config)?;

    let mut exact = measurements.iter().filter(|m| m.is_exact()).map(|m| m.central());
    if let Some(first) = exact.next() {
        if let Some(other) = exact.find(|&c| c != first) {
            return Err(Error::InvalidInput(format!(
                "exact measurements disagree: {first} vs {other}"
            )));
        }
        return Ok(Measurement::exact(first));
    }

    let (mut w_sum, mut wx_sum) = (0.0, 0.0);
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for m in measurements {
        let w = m.avg_error().powi(-2);
        w_sum += w;
        wx_sum += w * m.central();
        let (below, above) = reach(m, k);
        lo = lo.min(m.central() - below);
        hi = hi.max(m.central() + above);
    }
    let guess = wx_sum / w_sum;

    let terms = measurements.iter().map(&ctor).collect::<Result<Vec<_>>>()?;
    let nll = CombinedNll::new(terms);
    let result = MinosSolver::with_config(config.profile.minos.clone())
        .solve(&nll, guess, (lo, hi), cl)?;
    log::debug!(
        "sum_uncorrelated: {} measurements -> {} [{}, {}]",
        measurements.len(),
        result.central,
        result.interval.lower,
        result.interval.upper
    );
    result.to_measurement()
}

/// Sum of independent quantities with default settings.
pub fn add_uncorrelated(measurements: &[Measurement], cl: f64) -> Result<Measurement> {
    add_uncorrelated_with(measurements, cl, default_nll, &CombineConfig::default())
}

/// Sum of independent quantities by profile likelihood.
///
/// Exact terms are added as an offset. Unless configured otherwise, the
/// parameter with the largest error is eliminated through the constraint.
pub fn add_uncorrelated_with<N, F>(
    measurements: &[Measurement],
    cl: f64,
    ctor: F,
    config: &CombineConfig,
) -> Result<Measurement>
where
    N: NllFunction,
    F: Fn(&Measurement) -> Result<N>,
{
    check_not_empty(measurements)?;
    let k = scale_factor(cl, config)?;

    let offset: f64 = measurements.iter().filter(|m| m.is_exact()).map(|m| m.central()).sum();
    let uncertain: Vec<Measurement> =
        measurements.iter().filter(|m| !m.is_exact()).copied().collect();
    if uncertain.is_empty() {
        return Ok(Measurement::exact(offset));
    }

    let terms = uncertain.iter().map(&ctor).collect::<Result<Vec<_>>>()?;
    let eps = config.profile.minos.domain_epsilon;
    let bounds: Vec<(f64, f64)> = uncertain
        .iter()
        .zip(&terms)
        .map(|(m, term)| {
            let (below, above) = reach(m, k);
            clip_to_domain((m.central() - below, m.central() + above), term.domain(), eps)
        })
        .collect();
    let init: Vec<f64> = uncertain.iter().map(Measurement::central).collect();

    let total: f64 = init.iter().sum();
    let up = uncertain.iter().map(|m| m.error_up().powi(2)).sum::<f64>().sqrt();
    let down = uncertain.iter().map(|m| m.error_down().powi(2)).sum::<f64>().sqrt();
    let guess = EdgeGuess { upper: Some(total + up), lower: Some(total - down) };

    let result = profile_combination(
        UncorrelatedNll::new(terms),
        &SumVariable,
        &uncertain,
        &init,
        &bounds,
        cl,
        guess,
        config,
    )?;
    result.checked_shift(offset)
}

/// Product of independent quantities with default settings.
pub fn prod_uncorrelated(measurements: &[Measurement], cl: f64) -> Result<Measurement> {
    prod_uncorrelated_with(measurements, cl, default_nll, &CombineConfig::default())
}

/// Product of independent quantities by profile likelihood.
///
/// `ctor` receives the normalised measurements (unit central, relative
/// errors). Exact factors scale the result; an exact zero makes it exactly zero.
pub fn prod_uncorrelated_with<N, F>(
    measurements: &[Measurement],
    cl: f64,
    ctor: F,
    config: &CombineConfig,
) -> Result<Measurement>
where
    N: NllFunction,
    F: Fn(&Measurement) -> Result<N>,
{
    check_not_empty(measurements)?;
    let k = scale_factor(cl, config)?;

    let scale: f64 = measurements.iter().filter(|m| m.is_exact()).map(|m| m.central()).product();
    if scale == 0.0 {
        return Ok(Measurement::exact(0.0));
    }
    let uncertain: Vec<&Measurement> = measurements.iter().filter(|m| !m.is_exact()).collect();
    if uncertain.is_empty() {
        return Ok(Measurement::exact(scale));
    }

    let prefactor = scale * uncertain.iter().map(|m| m.central()).product::<f64>();
    let normalized = uncertain.iter().map(|m| m.normalized()).collect::<Result<Vec<_>>>()?;

    let terms = normalized.iter().map(&ctor).collect::<Result<Vec<_>>>()?;
    let eps = config.profile.minos.domain_epsilon;
    let bounds: Vec<(f64, f64)> = normalized
        .iter()
        .zip(&terms)
        .map(|(m, term)| {
            let (below, above) = reach(m, k);
            let (lo, hi) = clip_to_domain((1.0 - below, 1.0 + above), term.domain(), eps);
            (lo.max(MIN_FACTOR), hi)
        })
        .collect();
    let init = vec![1.0; normalized.len()];

    let up = normalized.iter().map(|m| m.error_up().powi(2)).sum::<f64>().sqrt();
    let down = normalized.iter().map(|m| m.error_down().powi(2)).sum::<f64>().sqrt();
    let guess = EdgeGuess { upper: Some(1.0 + up), lower: Some(1.0 - down) };

    let result = profile_combination(
        UncorrelatedNll::new(terms),
        &ProductVariable,
        &normalized,
        &init,
        &bounds,
        cl,
        guess,
        config,
    )?;
    result.checked_scale(prefactor)
}

#[allow(clippy::too_many_arguments)]
fn profile_combination<N: NllFunction>(
    nll: UncorrelatedNll<N>,
    variable: &dyn ProfileVariable,
    measurements: &[Measurement],
    init: &[f64],
    bounds: &[(f64, f64)],
    cl: f64,
    guess: EdgeGuess,
    config: &CombineConfig,
) -> Result<Measurement> {
    let mut profile = config.profile.clone();
    if profile.pivot.is_none() {
        profile.pivot = measurements
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.avg_error().total_cmp(&b.avg_error()))
            .map(|(i, _)| i);
    }
    let result =
        ProfileMinos::with_config(profile).solve(&nll, variable, init, bounds, cl, guess)?;
    log::debug!(
        "profile combination of {} terms: {} [{}, {}] ({} evaluations)",
        measurements.len(),
        result.central,
        result.interval.lower,
        result.interval.upper,
        result.n_fev
    );
    result.to_measurement()
}

/// Sum of correlated Gaussian quantities with central values `centrals` and covariance `cov`.
pub fn sum_correlated(centrals: &[f64], cov: &DMatrix<f64>, cl: f64) -> Result<Measurement> {
    if cov.nrows() != centrals.len() {
        return Err(Error::InvalidInput(format!(
            "{} central values for a {}x{} covariance",
            centrals.len(),
            cov.nrows(),
            cov.ncols()
        )));
    }
    let l = decompose_covariance(cov)?;

    // Σ xᵢ = Σ cᵢ + Σⱼ (Σᵢ Lᵢⱼ) zⱼ with independent unit zⱼ
    let mut components = vec![Measurement::exact(centrals.iter().sum())];
    for column in l.column_iter() {
        let s: f64 = column.iter().sum();
        if s != 0.0 {
            components.push(Measurement::symmetric(0.0, s.abs())?);
        }
    }
    add_uncorrelated(&components, cl)
}
