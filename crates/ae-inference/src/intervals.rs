//! Ready-made intervals for event counts and efficiencies.
//!
//! Each family comes in three flavours: a likelihood interval (Minos on the
//! exact NLL), a "lazy" Gaussian approximation, and a classical construction
//! from gamma/beta quantiles.

use crate::minos::MinosSolver;
use ae_core::{Error, Measurement, Result};
use ae_prob::confidence::{confidence_to_sigma, refine_quantile};
use ae_prob::{BinomialNll, PoissonNll};
use statrs::distribution::{Beta, ContinuousCDF, Gamma};

fn check_counts(passed: u64, total: u64) -> Result<()> {
    if total == 0 || passed > total {
        return Err(Error::InvalidInput(format!(
            "need 0 <= passed <= total and total > 0, got {passed}/{total}"
        )));
    }
    Ok(())
}

fn check_level(cl: f64) -> Result<f64> {
    if !(cl > 0.0 && cl < 1.0) {
        return Err(Error::InvalidInput(format!("confidence level must be in (0, 1), got {cl}")));
    }
    Ok(0.5 * (1.0 - cl))
}

fn gamma_quantile(shape: f64, p: f64) -> Result<f64> {
    let g = Gamma::new(shape, 1.0)
        .map_err(|e| Error::InvalidInput(format!("gamma({shape}, 1): {e}")))?;
    Ok(refine_quantile(&g, p, g.inverse_cdf(p), (0.0, f64::INFINITY)))
}

fn beta_quantile(a: f64, b: f64, p: f64) -> Result<f64> {
    let d = Beta::new(a, b).map_err(|e| Error::InvalidInput(format!("beta({a}, {b}): {e}")))?;
    Ok(refine_quantile(&d, p, d.inverse_cdf(p), (0.0, 1.0)))
}

fn around(central: f64, lower: f64, upper: f64) -> Result<Measurement> {
    Measurement::new(central, upper - central, central - lower)
}

/// Likelihood interval on a Poisson mean given `observed` events.
///
/// For `observed == 0` the minimum sits at the lower edge of the domain and the
/// interval is one-sided.
pub fn poisson_minos(observed: f64, cl: f64) -> Result<Measurement> {
    let nll = PoissonNll::new(observed)?;
    let sigma = confidence_to_sigma(cl)?;
    let n1 = observed + 1.0;
    let hi = n1 + 10.0 * sigma.max(1.0) * n1.sqrt();
    MinosSolver::new().solve(&nll, observed, (0.0, hi), cl)?.to_measurement()
}

/// `n ± σ(cl)·√n`
pub fn poisson_lazy(observed: f64, cl: f64) -> Result<Measurement> {
    if !(observed >= 0.0 && observed.is_finite()) {
        return Err(Error::InvalidInput(format!(
            "observed count must be finite and >= 0, got {observed}"
        )));
    }
    Measurement::symmetric(observed, confidence_to_sigma(cl)? * observed.sqrt())
}

/// Central Garwood interval from gamma quantiles.
pub fn poisson_gamma_interval(observed: u64, cl: f64) -> Result<Measurement> {
    let tail = check_level(cl)?;
    let n = observed as f64;
    let lower = if observed == 0 { 0.0 } else { gamma_quantile(n, tail)? };
    let upper = gamma_quantile(n + 1.0, 1.0 - tail)?;
    around(n, lower, upper)
}

/// Likelihood interval on an efficiency `passed / total`.
pub fn efficiency_minos(passed: u64, total: u64, cl: f64) -> Result<Measurement> {
    let nll = BinomialNll::new(passed, total)?;
    let guess = passed as f64 / total as f64;
    MinosSolver::new().solve(&nll, guess, (0.0, 1.0), cl)?.to_measurement()
}

/// `ε ± σ(cl)·√(ε(1-ε)/N)`
pub fn efficiency_lazy(passed: u64, total: u64, cl: f64) -> Result<Measurement> {
    check_counts(passed, total)?;
    let n = total as f64;
    let eff = passed as f64 / n;
    Measurement::symmetric(eff, confidence_to_sigma(cl)? * (eff * (1.0 - eff) / n).sqrt())
}

/// Clopper-Pearson interval from beta quantiles.
pub fn efficiency_clopper_pearson(passed: u64, total: u64, cl: f64) -> Result<Measurement> {
    check_counts(passed, total)?;
    let tail = check_level(cl)?;
    let (k, n) = (passed as f64, total as f64);
    let lower = if passed == 0 { 0.0 } else { beta_quantile(k, n - k + 1.0, tail)? };
    let upper = if passed == total { 1.0 } else { beta_quantile(k + 1.0, n - k, 1.0 - tail)? };
    around(k / n, lower, upper)
}

/// Central interval of the `Beta(passed + alpha, total - passed + beta)` posterior.
///
/// The central value is the posterior mode, moved into the interval when the
/// prior puts the mode outside it. `alpha = beta = 1` is the uniform prior.
pub fn efficiency_bayesian(
    passed: u64,
    total: u64,
    cl: f64,
    alpha: f64,
    beta: f64,
) -> Result<Measurement> {
    check_counts(passed, total)?;
    let tail = check_level(cl)?;
    if !(alpha > 0.0 && alpha.is_finite() && beta > 0.0 && beta.is_finite()) {
        return Err(Error::InvalidInput(format!(
            "prior parameters must be finite and > 0, got alpha={alpha}, beta={beta}"
        )));
    }
    let a = passed as f64 + alpha;
    let b = (total - passed) as f64 + beta;
    let lower = beta_quantile(a, b, tail)?;
    let upper = beta_quantile(a, b, 1.0 - tail)?;
    let mode = if a <= 1.0 {
        0.0
    } else if b <= 1.0 {
        1.0
    } else {
        (a - 1.0) / (a + b - 2.0)
    };
    around(mode.clamp(lower, upper), lower, upper)
}
